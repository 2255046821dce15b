//! Handle database requests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Transaction};

use crate::error::Result;
use crate::session::{NewSession, RefreshTokenRecord, SessionStore};

/// PostgreSQL-backed [`SessionStore`].
#[derive(Clone)]
pub struct PgSessionStore {
    pool: Pool<Postgres>,
}

impl PgSessionStore {
    /// Create a new [`PgSessionStore`].
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn insert(
        tx: &mut Transaction<'_, Postgres>,
        session: &NewSession,
    ) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO refresh_tokens
                (account_id, token_hash, expires_at, ip, user_agent)
                VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(session.account_id)
        .bind(&session.token_hash)
        .bind(session.expires_at)
        .bind(&session.ip)
        .bind(&session.user_agent)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn replace_for_account(&self, session: NewSession) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"UPDATE refresh_tokens SET is_active = FALSE
                WHERE account_id = $1 AND is_active = TRUE"#,
        )
        .bind(session.account_id)
        .execute(&mut *tx)
        .await?;

        Self::insert(&mut tx, &session).await?;
        tx.commit().await?;

        Ok(())
    }

    async fn find_active_by_hash(
        &self,
        hash: &str,
    ) -> Result<Option<RefreshTokenRecord>> {
        let record = sqlx::query_as::<_, RefreshTokenRecord>(
            r#"SELECT id, account_id, token_hash, expires_at, is_active,
                    ip, user_agent, created_at
                FROM refresh_tokens
                WHERE token_hash = $1
                  AND is_active = TRUE
                  AND expires_at > NOW()"#,
        )
        .bind(hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn rotate(
        &self,
        presented_hash: &str,
        successor: NewSession,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        // The conditional flip serializes concurrent rotations of the same
        // token: whoever commits it first wins, the other sees zero rows.
        let retired = sqlx::query(
            r#"UPDATE refresh_tokens SET is_active = FALSE
                WHERE token_hash = $1 AND is_active = TRUE"#,
        )
        .bind(presented_hash)
        .execute(&mut *tx)
        .await?;

        if retired.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        Self::insert(&mut tx, &successor).await?;
        tx.commit().await?;

        Ok(true)
    }

    async fn deactivate_by_hash(&self, hash: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"UPDATE refresh_tokens SET is_active = FALSE
                WHERE token_hash = $1 AND is_active = TRUE"#,
        )
        .bind(hash)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn deactivate_all_for_account(
        &self,
        account_id: i64,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"UPDATE refresh_tokens SET is_active = FALSE
                WHERE account_id = $1 AND is_active = TRUE"#,
        )
        .bind(account_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn delete_expired_or_inactive(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"DELETE FROM refresh_tokens
                WHERE (is_active = FALSE OR expires_at < NOW())
                  AND created_at < $1"#,
        )
        .bind(older_than)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
