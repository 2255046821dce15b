mod repository;

pub use repository::*;

#[cfg(test)]
pub mod mem;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Account role.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    sqlx::Type,
)]
#[sqlx(type_name = "account_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Superadmin,
}

/// Account lifecycle status.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    sqlx::Type,
)]
#[sqlx(type_name = "account_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    #[default]
    Active,
    Inactive,
    Locked,
}

/// Account as saved on database.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Account {
    pub id: i64,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub role: Role,
    pub status: AccountStatus,
    #[serde(skip)]
    pub failed_login_attempts: i32,
    #[serde(skip)]
    pub locked_until: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Whether the lock still applies at `now`.
    ///
    /// A `locked` status with an elapsed expiry counts as unlocked even
    /// before the row is cleared.
    pub fn lock_active(&self, now: DateTime<Utc>) -> bool {
        self.status == AccountStatus::Locked
            && self.locked_until.is_some_and(|until| now < until)
    }
}

/// Account awaiting insertion.
#[derive(Clone, Debug)]
pub struct NewAccount {
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Persistence contract for [`Account`] rows.
///
/// The counter operations must be atomic at the storage layer: concurrent
/// failures for one account may never undercount.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Find an account by email.
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>>;

    /// Find an account by ID.
    async fn find_by_id(&self, id: i64) -> Result<Option<Account>>;

    /// Insert a new account. Fails with `EmailExists` on a duplicate email.
    async fn create(&self, account: NewAccount) -> Result<Account>;

    /// Clear the failure counter and lock in a single update, stamping the
    /// login time. Reactivates a `locked` status but never an `inactive` one.
    async fn record_login_success(&self, id: i64) -> Result<()>;

    /// Atomically increment the failure counter, returning the new value.
    async fn record_login_failure(&self, id: i64) -> Result<i32>;

    /// Lock the account until the given instant.
    async fn lock(&self, id: i64, until: DateTime<Utc>) -> Result<()>;
}
