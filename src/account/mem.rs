//! In-memory [`AccountStore`] for isolated service tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::account::{
    Account, AccountStatus, AccountStore, NewAccount, Role,
};
use crate::error::{Result, ServerError};

/// Fake store. Every operation takes one lock, so the counter and lock
/// transitions are exactly as linearizable as the SQL they stand in for.
#[derive(Default)]
pub struct MemAccountStore {
    inner: Mutex<State>,
}

#[derive(Default)]
struct State {
    next_id: i64,
    accounts: HashMap<i64, Account>,
}

impl MemAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Force a status, bypassing the lifecycle. Test setup only.
    pub fn set_status(&self, id: i64, status: AccountStatus) {
        let mut state = self.inner.lock().unwrap();
        if let Some(account) = state.accounts.get_mut(&id) {
            account.status = status;
        }
    }

    pub fn get(&self, id: i64) -> Option<Account> {
        self.inner.lock().unwrap().accounts.get(&id).cloned()
    }
}

#[async_trait]
impl AccountStore for MemAccountStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        let state = self.inner.lock().unwrap();
        Ok(state
            .accounts
            .values()
            .find(|account| account.email == email)
            .cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Account>> {
        Ok(self.inner.lock().unwrap().accounts.get(&id).cloned())
    }

    async fn create(&self, account: NewAccount) -> Result<Account> {
        let mut state = self.inner.lock().unwrap();
        if state.accounts.values().any(|a| a.email == account.email) {
            return Err(ServerError::EmailExists);
        }

        state.next_id += 1;
        let created = Account {
            id: state.next_id,
            email: account.email,
            password_hash: account.password_hash,
            role: account.role,
            status: AccountStatus::Active,
            failed_login_attempts: 0,
            locked_until: None,
            last_login_at: None,
            created_at: Utc::now(),
        };
        state.accounts.insert(created.id, created.clone());

        Ok(created)
    }

    async fn record_login_success(&self, id: i64) -> Result<()> {
        let mut state = self.inner.lock().unwrap();
        if let Some(account) = state.accounts.get_mut(&id) {
            account.failed_login_attempts = 0;
            account.locked_until = None;
            if account.status == AccountStatus::Locked {
                account.status = AccountStatus::Active;
            }
            account.last_login_at = Some(Utc::now());
        }

        Ok(())
    }

    async fn record_login_failure(&self, id: i64) -> Result<i32> {
        let mut state = self.inner.lock().unwrap();
        let account = state
            .accounts
            .get_mut(&id)
            .ok_or(ServerError::InvalidCredentials)?;
        account.failed_login_attempts += 1;

        Ok(account.failed_login_attempts)
    }

    async fn lock(&self, id: i64, until: DateTime<Utc>) -> Result<()> {
        let mut state = self.inner.lock().unwrap();
        if let Some(account) = state.accounts.get_mut(&id) {
            account.status = AccountStatus::Locked;
            account.locked_until = Some(until);
        }

        Ok(())
    }
}

impl MemAccountStore {
    /// Insert an account directly, skipping hashing. Test setup only.
    pub fn seed(&self, email: &str, password_hash: &str, role: Role) -> i64 {
        let mut state = self.inner.lock().unwrap();
        state.next_id += 1;
        let id = state.next_id;
        state.accounts.insert(
            id,
            Account {
                id,
                email: email.into(),
                password_hash: password_hash.into(),
                role,
                status: AccountStatus::Active,
                failed_login_attempts: 0,
                locked_until: None,
                last_login_at: None,
                created_at: Utc::now(),
            },
        );
        id
    }
}
