mod repository;

pub use repository::*;

#[cfg(test)]
pub mod mem;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Refresh-token record as saved on database.
///
/// Only the digest of the token secret is ever persisted. Per account, at
/// most one row carries `is_active = true`; the rotation protocol keeps it
/// that way.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RefreshTokenRecord {
    pub id: i64,
    pub account_id: i64,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Session awaiting insertion.
#[derive(Clone, Debug)]
pub struct NewSession {
    pub account_id: i64,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

/// Persistence contract for [`RefreshTokenRecord`] rows.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Retire every active session of the new record's owner, then insert
    /// it, atomically. Login path.
    async fn replace_for_account(&self, session: NewSession) -> Result<()>;

    /// Return the record only if it is active and unexpired. Sole read path
    /// for validating a presented refresh token.
    async fn find_active_by_hash(
        &self,
        hash: &str,
    ) -> Result<Option<RefreshTokenRecord>>;

    /// Retire the presented record and insert its successor, atomically.
    /// Returns `false` when the presented record was no longer active; the
    /// conditional flip of the active flag is the serialization point that
    /// lets at most one concurrent caller win.
    async fn rotate(
        &self,
        presented_hash: &str,
        successor: NewSession,
    ) -> Result<bool>;

    /// Retire the record matching the hash, if any. Logout path.
    async fn deactivate_by_hash(&self, hash: &str) -> Result<bool>;

    /// Retire every active session for the account.
    async fn deactivate_all_for_account(&self, account_id: i64)
    -> Result<u64>;

    /// Physically remove expired or retired rows older than the cutoff,
    /// returning the count. Idempotent.
    async fn delete_expired_or_inactive(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<u64>;
}
