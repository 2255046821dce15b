//! Credential and session lifecycle orchestration.
//!
//! [`AuthService`] owns no persistent state: it drives the account and
//! session stores plus the token codec through the register, login,
//! refresh, and logout state machines.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};

use crate::account::{Account, AccountStatus, AccountStore, NewAccount, Role};
use crate::config::Auth as AuthConfig;
use crate::crypto::Crypto;
use crate::error::{Result, ServerError};
use crate::session::{NewSession, SessionStore};
use crate::token::{Subject, TokenManager};

/// Lockout and retention knobs.
#[derive(Clone, Debug)]
pub struct Limits {
    /// Failed attempts before the account locks.
    pub max_login_attempts: i32,
    /// How long a threshold lock holds.
    pub lockout: Duration,
    /// How long retired session rows are kept before the sweep removes them.
    pub session_retention: Duration,
}

impl Default for Limits {
    fn default() -> Self {
        Self::from(&AuthConfig::default())
    }
}

impl From<&AuthConfig> for Limits {
    fn from(config: &AuthConfig) -> Self {
        Self {
            max_login_attempts: config.max_login_attempts,
            lockout: Duration::seconds(config.lockout_seconds),
            session_retention: Duration::days(config.session_retention_days),
        }
    }
}

/// Freshly issued access/refresh pair.
#[derive(Clone, Debug)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub role: Role,
}

/// Orchestrator over the stores, the password hasher, and the token codec.
#[derive(Clone)]
pub struct AuthService {
    accounts: Arc<dyn AccountStore>,
    sessions: Arc<dyn SessionStore>,
    crypto: Arc<Crypto>,
    token: TokenManager,
    limits: Limits,
}

impl AuthService {
    /// Create a new [`AuthService`].
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        sessions: Arc<dyn SessionStore>,
        crypto: Arc<Crypto>,
        token: TokenManager,
        limits: Limits,
    ) -> Self {
        Self {
            accounts,
            sessions,
            crypto,
            token,
            limits,
        }
    }

    /// Create an account with a hashed credential.
    ///
    /// Uniqueness is enforced by the store insert itself, so two concurrent
    /// registrations of one email cannot both pass a pre-check.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Account> {
        let password_hash = self.crypto.pwd.hash_password(password)?;

        let account = self
            .accounts
            .create(NewAccount {
                email: email.to_owned(),
                password_hash,
                role: Role::User,
            })
            .await?;

        tracing::info!(account_id = account.id, "account registered");

        Ok(account)
    }

    /// Verify credentials and open a session.
    ///
    /// An unknown email and a wrong password both answer
    /// [`ServerError::InvalidCredentials`] to prevent enumeration. The
    /// attempt that crosses the threshold still reports invalid
    /// credentials; the lock only becomes visible on the next attempt.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        ip: Option<String>,
        user_agent: Option<String>,
    ) -> Result<TokenPair> {
        let Some(account) = self.accounts.find_by_email(email).await? else {
            return Err(ServerError::InvalidCredentials);
        };

        let now = Utc::now();
        if account.lock_active(now) {
            return Err(ServerError::AccountLocked);
        }
        if account.status == AccountStatus::Inactive {
            return Err(ServerError::AccountInactive);
        }

        if !self
            .crypto
            .pwd
            .verify_password(password, &account.password_hash)
        {
            let attempts =
                self.accounts.record_login_failure(account.id).await?;
            if attempts >= self.limits.max_login_attempts {
                self.accounts
                    .lock(account.id, now + self.limits.lockout)
                    .await?;
                tracing::warn!(
                    account_id = account.id,
                    attempts,
                    "account locked after repeated failures"
                );
            }

            return Err(ServerError::InvalidCredentials);
        }

        self.accounts.record_login_success(account.id).await?;

        let subject = subject_of(&account);
        let pair = self.issue_pair(&subject)?;
        self.sessions
            .replace_for_account(NewSession {
                account_id: account.id,
                token_hash: self.crypto.hasher.digest(&pair.refresh_token),
                expires_at: Utc::now() + self.token.refresh_ttl(),
                ip,
                user_agent,
            })
            .await?;

        tracing::info!(account_id = account.id, "login succeeded");

        Ok(pair)
    }

    /// Exchange a refresh token for a new pair, retiring the old one.
    ///
    /// A rotated-out token and a token that never existed are deliberately
    /// indistinguishable. When two calls race on one token, the store-side
    /// active-flag transition picks a single winner.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair> {
        self.token.decode_refresh(refresh_token)?;

        let presented_hash = self.crypto.hasher.digest(refresh_token);
        let record = self
            .sessions
            .find_active_by_hash(&presented_hash)
            .await?
            .ok_or(ServerError::InvalidOrExpiredToken)?;

        let account = self
            .accounts
            .find_by_id(record.account_id)
            .await?
            .ok_or(ServerError::InvalidOrExpiredToken)?;
        if account.status != AccountStatus::Active {
            return Err(ServerError::AccountInactive);
        }

        let subject = subject_of(&account);
        let pair = self.issue_pair(&subject)?;
        let rotated = self
            .sessions
            .rotate(
                &presented_hash,
                NewSession {
                    account_id: account.id,
                    token_hash: self.crypto.hasher.digest(&pair.refresh_token),
                    expires_at: Utc::now() + self.token.refresh_ttl(),
                    ip: record.ip,
                    user_agent: record.user_agent,
                },
            )
            .await?;

        if !rotated {
            // Lost the race: someone rotated the presented token first.
            return Err(ServerError::InvalidOrExpiredToken);
        }

        Ok(pair)
    }

    /// Retire the session matching the presented token, if any.
    ///
    /// Always succeeds: an unknown or already-retired token must not be
    /// distinguishable from a live one through this endpoint.
    pub async fn logout(&self, refresh_token: &str) {
        let hash = self.crypto.hasher.digest(refresh_token);
        match self.sessions.deactivate_by_hash(&hash).await {
            Ok(retired) => {
                if retired {
                    tracing::debug!("session retired on logout");
                }
            },
            Err(err) => {
                tracing::debug!(error = %err, "logout token resolution failed");
            },
        }
    }

    /// Look up an account by email.
    pub async fn find_account_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Account>> {
        self.accounts.find_by_email(email).await
    }

    /// Retire every active session for the account.
    pub async fn revoke_all_sessions(&self, account_id: i64) -> Result<u64> {
        let retired =
            self.sessions.deactivate_all_for_account(account_id).await?;
        tracing::info!(account_id, retired, "sessions revoked");

        Ok(retired)
    }

    /// Remove retired and expired session rows past the retention window.
    pub async fn sweep_sessions(&self) -> Result<u64> {
        let cutoff = Utc::now() - self.limits.session_retention;
        let removed =
            self.sessions.delete_expired_or_inactive(cutoff).await?;
        if removed > 0 {
            tracing::info!(removed, "session sweep");
        }

        Ok(removed)
    }

    fn issue_pair(&self, subject: &Subject) -> Result<TokenPair> {
        Ok(TokenPair {
            access_token: self.token.create_access(subject)?,
            refresh_token: self.token.create_refresh(subject)?,
            role: subject.role,
        })
    }
}

fn subject_of(account: &Account) -> Subject {
    Subject {
        account_id: account.id,
        email: account.email.clone(),
        role: account.role,
    }
}

/// Run the session sweep forever, on an interval.
pub fn spawn_session_sweeper(auth: Arc<AuthService>, every: StdDuration) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(every).await;
            if let Err(err) = auth.sweep_sessions().await {
                tracing::warn!(error = %err, "session sweep failed");
            }
        }
    });
}
