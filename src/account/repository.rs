//! Handle database requests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::account::{Account, AccountStore, NewAccount};
use crate::error::{Result, ServerError};

const ACCOUNT_COLUMNS: &str = "id, email, password_hash, role, status, \
     failed_login_attempts, locked_until, last_login_at, created_at";

/// PostgreSQL-backed [`AccountStore`].
#[derive(Clone)]
pub struct PgAccountStore {
    pool: Pool<Postgres>,
}

impl PgAccountStore {
    /// Create a new [`PgAccountStore`].
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    async fn create(&self, account: NewAccount) -> Result<Account> {
        let created = sqlx::query_as::<_, Account>(&format!(
            r#"INSERT INTO accounts (email, password_hash, role)
                VALUES ($1, $2, $3)
                RETURNING {ACCOUNT_COLUMNS}"#
        ))
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(account.role)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                ServerError::EmailExists
            },
            _ => err.into(),
        })?;

        Ok(created)
    }

    async fn record_login_success(&self, id: i64) -> Result<()> {
        // One statement so a concurrent failure increment cannot interleave
        // with the reset. Only a threshold lock is reverted to active.
        sqlx::query(
            r#"UPDATE accounts
                SET failed_login_attempts = 0,
                    locked_until = NULL,
                    status = CASE
                        WHEN status = 'locked' THEN 'active'::account_status
                        ELSE status
                    END,
                    last_login_at = NOW(),
                    updated_at = NOW()
                WHERE id = $1"#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn record_login_failure(&self, id: i64) -> Result<i32> {
        // Atomic increment; a fetch-then-update here would undercount under
        // a credential-stuffing burst.
        let (attempts,) = sqlx::query_as::<_, (i32,)>(
            r#"UPDATE accounts
                SET failed_login_attempts = failed_login_attempts + 1,
                    updated_at = NOW()
                WHERE id = $1
                RETURNING failed_login_attempts"#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(attempts)
    }

    async fn lock(&self, id: i64, until: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"UPDATE accounts
                SET status = 'locked', locked_until = $2, updated_at = NOW()
                WHERE id = $1"#,
        )
        .bind(id)
        .bind(until)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{AccountStatus, Role};

    async fn seed(store: &PgAccountStore) -> Account {
        store
            .create(NewAccount {
                email: "seed@bid.example".into(),
                password_hash: "$argon2id$stub".into(),
                role: Role::User,
            })
            .await
            .unwrap()
    }

    #[sqlx::test]
    async fn test_create_duplicate_email(pool: Pool<Postgres>) {
        let store = PgAccountStore::new(pool);
        let account = seed(&store).await;

        let err = store
            .create(NewAccount {
                email: account.email,
                password_hash: "$argon2id$other".into(),
                role: Role::User,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ServerError::EmailExists));
    }

    #[sqlx::test]
    async fn test_failure_counter_is_atomic(pool: Pool<Postgres>) {
        let store = PgAccountStore::new(pool);
        let account = seed(&store).await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            let id = account.id;
            handles.push(tokio::spawn(async move {
                store.record_login_failure(id).await.unwrap()
            }));
        }

        let mut counts = Vec::new();
        for handle in handles {
            counts.push(handle.await.unwrap());
        }

        // Every increment is observed exactly once.
        counts.sort_unstable();
        assert_eq!(counts, (1..=8).collect::<Vec<_>>());

        let reloaded =
            store.find_by_id(account.id).await.unwrap().unwrap();
        assert_eq!(reloaded.failed_login_attempts, 8);
    }

    #[sqlx::test]
    async fn test_login_success_clears_lock(pool: Pool<Postgres>) {
        let store = PgAccountStore::new(pool);
        let account = seed(&store).await;

        store.record_login_failure(account.id).await.unwrap();
        store
            .lock(account.id, Utc::now() + chrono::Duration::minutes(15))
            .await
            .unwrap();

        store.record_login_success(account.id).await.unwrap();

        let reloaded =
            store.find_by_id(account.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, AccountStatus::Active);
        assert_eq!(reloaded.failed_login_attempts, 0);
        assert!(reloaded.locked_until.is_none());
        assert!(reloaded.last_login_at.is_some());
    }
}
