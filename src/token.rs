//! Manage json web tokens.
//!
//! Access and refresh tokens share one claim shape but are signed with
//! distinct secrets and lifetimes. Verification collapses every failure
//! (bad signature, malformed, expired) into a single error kind so callers
//! cannot tell them apart.

use chrono::{Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
};
use serde::{Deserialize, Serialize};

use crate::account::Role;
use crate::error::{Result, ServerError};

/// Access token lifetime, in seconds. 15 minutes.
pub const ACCESS_EXPIRATION: i64 = 15 * 60;
/// Refresh token lifetime, in seconds. 7 days.
pub const REFRESH_EXPIRATION: i64 = 7 * 24 * 60 * 60;

/// Pieces of information asserted on a JWT.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Account ID the token was issued to.
    pub sub: String,
    /// Account email.
    pub email: String,
    /// Account role.
    pub role: Role,
    /// Identifies the time at which the JWT was issued.
    pub iat: i64,
    /// Identifies the expiration time on or after which the JWT must not be
    /// accepted for processing.
    pub exp: i64,
}

/// Identity a token is issued from.
#[derive(Clone, Debug)]
pub struct Subject {
    pub account_id: i64,
    pub email: String,
    pub role: Role,
}

impl axum::extract::FromRef<crate::AppState> for TokenManager {
    fn from_ref(state: &crate::AppState) -> TokenManager {
        state.token.clone()
    }
}

/// Manage JWT tokens.
#[derive(Clone)]
pub struct TokenManager {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenManager {
    /// Create a new [`TokenManager`] from two distinct signing secrets.
    pub fn new(access_secret: &str, refresh_secret: &str) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(
                refresh_secret.as_bytes(),
            ),
            refresh_decoding: DecodingKey::from_secret(
                refresh_secret.as_bytes(),
            ),
            access_ttl: Duration::seconds(ACCESS_EXPIRATION),
            refresh_ttl: Duration::seconds(REFRESH_EXPIRATION),
        }
    }

    /// Override token lifetimes.
    pub fn with_ttls(mut self, access: Duration, refresh: Duration) -> Self {
        self.access_ttl = access;
        self.refresh_ttl = refresh;
        self
    }

    /// Access token lifetime.
    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    /// Refresh token lifetime. Also bounds the stored session record.
    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    fn create(
        &self,
        subject: &Subject,
        key: &EncodingKey,
        ttl: Duration,
    ) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: subject.account_id.to_string(),
            email: subject.email.clone(),
            role: subject.role,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        encode(&Header::default(), &claims, key).map_err(|err| {
            ServerError::Internal {
                details: "token signing failed".to_owned(),
                source: Some(Box::new(err)),
            }
        })
    }

    fn verify(&self, token: &str, key: &DecodingKey) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        decode::<Claims>(token, key, &validation)
            .map(|data| data.claims)
            .map_err(|_| ServerError::InvalidOrExpiredToken)
    }

    /// Sign a new short-lived access token.
    pub fn create_access(&self, subject: &Subject) -> Result<String> {
        self.create(subject, &self.access_encoding, self.access_ttl)
    }

    /// Sign a new refresh token.
    pub fn create_refresh(&self, subject: &Subject) -> Result<String> {
        self.create(subject, &self.refresh_encoding, self.refresh_ttl)
    }

    /// Decode and check an access token.
    pub fn decode_access(&self, token: &str) -> Result<Claims> {
        self.verify(token, &self.access_decoding)
    }

    /// Decode and check a refresh token.
    pub fn decode_refresh(&self, token: &str) -> Result<Claims> {
        self.verify(token, &self.refresh_decoding)
    }
}
