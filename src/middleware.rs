//! Middlewares for routes.

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use serde::Serialize;

use crate::account::Role;
use crate::error::{Result, ServerError};
use crate::token::TokenManager;

/// Caller identity proven by an access token, attached as a request
/// extension by [`auth`].
#[derive(Clone, Debug, Serialize)]
pub struct Identity {
    pub account_id: i64,
    pub email: String,
    pub role: Role,
}

/// Gate requests on a valid `Authorization: Bearer` access token.
///
/// A missing or non-bearer header answers 401 without touching the token
/// codec. Anything decode rejects, expired tokens included, answers 401 as
/// well.
pub async fn auth(
    State(token): State<TokenManager>,
    mut req: Request,
    next: Next,
) -> Result<Response> {
    let header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(ServerError::Unauthorized)?;
    let bearer = header
        .strip_prefix("Bearer ")
        .ok_or(ServerError::Unauthorized)?;

    let claims = token.decode_access(bearer)?;
    let account_id = claims
        .sub
        .parse::<i64>()
        .map_err(|_| ServerError::InvalidOrExpiredToken)?;

    req.extensions_mut().insert(Identity {
        account_id,
        email: claims.email,
        role: claims.role,
    });

    Ok(next.run(req).await)
}

/// Gate requests on the superadmin role. Must run after [`auth`].
pub async fn require_superadmin(req: Request, next: Next) -> Result<Response> {
    match req.extensions().get::<Identity>() {
        Some(identity) if identity.role == Role::Superadmin => {
            Ok(next.run(req).await)
        },
        Some(_) => Err(ServerError::Forbidden),
        None => Err(ServerError::Unauthorized),
    }
}
