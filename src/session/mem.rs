//! In-memory [`SessionStore`] for isolated service tests.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::session::{NewSession, RefreshTokenRecord, SessionStore};

/// Fake store. `rotate` checks and flips the active flag under one lock,
/// mirroring the conditional UPDATE the Postgres store relies on.
#[derive(Default)]
pub struct MemSessionStore {
    inner: Mutex<State>,
}

#[derive(Default)]
struct State {
    next_id: i64,
    records: Vec<RefreshTokenRecord>,
}

impl MemSessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count of active records for the account.
    pub fn active_count(&self, account_id: i64) -> usize {
        let state = self.inner.lock().unwrap();
        state
            .records
            .iter()
            .filter(|r| r.account_id == account_id && r.is_active)
            .count()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().records.len()
    }
}

impl State {
    fn insert(&mut self, session: NewSession) {
        self.next_id += 1;
        self.records.push(RefreshTokenRecord {
            id: self.next_id,
            account_id: session.account_id,
            token_hash: session.token_hash,
            expires_at: session.expires_at,
            is_active: true,
            ip: session.ip,
            user_agent: session.user_agent,
            created_at: Utc::now(),
        });
    }
}

#[async_trait]
impl SessionStore for MemSessionStore {
    async fn replace_for_account(&self, session: NewSession) -> Result<()> {
        let mut state = self.inner.lock().unwrap();
        for record in &mut state.records {
            if record.account_id == session.account_id {
                record.is_active = false;
            }
        }
        state.insert(session);

        Ok(())
    }

    async fn find_active_by_hash(
        &self,
        hash: &str,
    ) -> Result<Option<RefreshTokenRecord>> {
        let now = Utc::now();
        let state = self.inner.lock().unwrap();
        Ok(state
            .records
            .iter()
            .find(|r| {
                r.token_hash == hash && r.is_active && r.expires_at > now
            })
            .cloned())
    }

    async fn rotate(
        &self,
        presented_hash: &str,
        successor: NewSession,
    ) -> Result<bool> {
        let mut state = self.inner.lock().unwrap();
        let Some(record) = state
            .records
            .iter_mut()
            .find(|r| r.token_hash == presented_hash && r.is_active)
        else {
            return Ok(false);
        };

        record.is_active = false;
        state.insert(successor);

        Ok(true)
    }

    async fn deactivate_by_hash(&self, hash: &str) -> Result<bool> {
        let mut state = self.inner.lock().unwrap();
        let mut retired = false;
        for record in &mut state.records {
            if record.token_hash == hash && record.is_active {
                record.is_active = false;
                retired = true;
            }
        }

        Ok(retired)
    }

    async fn deactivate_all_for_account(
        &self,
        account_id: i64,
    ) -> Result<u64> {
        let mut state = self.inner.lock().unwrap();
        let mut retired = 0;
        for record in &mut state.records {
            if record.account_id == account_id && record.is_active {
                record.is_active = false;
                retired += 1;
            }
        }

        Ok(retired)
    }

    async fn delete_expired_or_inactive(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<u64> {
        let now = Utc::now();
        let mut state = self.inner.lock().unwrap();
        let before = state.records.len();
        state.records.retain(|r| {
            !((!r.is_active || r.expires_at < now)
                && r.created_at < older_than)
        });

        Ok((before - state.records.len()) as u64)
    }
}
