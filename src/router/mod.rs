//! Every route handlers.

pub mod login;
pub mod logout;
pub mod me;
pub mod password;
pub mod refresh;
pub mod register;
pub mod revoke;
pub mod status;

use axum::Json;
use axum::extract::{FromRequest, Request};
use axum::http::HeaderMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::ServerError;

/// Generic message answer.
#[derive(Debug, Serialize, Deserialize)]
pub struct Message {
    pub message: String,
}

impl Message {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_owned(),
        }
    }
}

/// JSON extractor that runs the body through its `validator` rules.
pub struct Valid<T>(pub T);

impl<S, T> FromRequest<S> for Valid<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ServerError;

    async fn from_request(
        req: Request,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate()?;

        Ok(Valid(value))
    }
}

/// Client address and agent, as forwarded by the reverse proxy.
///
/// Only the first `X-Forwarded-For` hop is kept; the socket address is not
/// consulted since the service always sits behind a proxy.
pub fn client_meta(headers: &HeaderMap) -> (Option<String>, Option<String>) {
    let ip = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty());
    let user_agent = headers
        .get("user-agent")
        .and_then(|value| value.to_str().ok())
        .map(ToOwned::to_owned);

    (ip, user_agent)
}

#[cfg(test)]
pub(crate) fn state(pool: sqlx::Pool<sqlx::Postgres>) -> crate::AppState {
    use std::sync::Arc;

    use crate::account::PgAccountStore;
    use crate::auth::{AuthService, Limits};
    use crate::config::{Argon2, Configuration};
    use crate::crypto::Crypto;
    use crate::database::Database;
    use crate::session::PgSessionStore;
    use crate::token::TokenManager;

    let crypto = Arc::new(
        Crypto::new(
            Some(Argon2 {
                memory_cost: 1024,
                iterations: 1,
                parallelism: 1,
                hash_length: 32,
            }),
            "test-pepper",
        )
        .unwrap(),
    );
    let token = TokenManager::new("test-access-secret", "test-refresh-secret");
    let auth = AuthService::new(
        Arc::new(PgAccountStore::new(pool.clone())),
        Arc::new(PgSessionStore::new(pool.clone())),
        Arc::clone(&crypto),
        token.clone(),
        Limits::default(),
    );

    crate::AppState {
        config: Arc::new(Configuration::default()),
        db: Database { postgres: pool },
        crypto,
        token,
        auth,
    }
}
