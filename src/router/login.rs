use axum::http::HeaderMap;
use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::account::Role;
use crate::auth::TokenPair;
use crate::error::Result;
use crate::router::{Valid, client_meta};

pub const TOKEN_TYPE: &str = "Bearer";

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Body {
    #[validate(email(message = "Email must be formatted."))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required."))]
    pub password: String,
}

/// Token pair answer, shared with the refresh route.
#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    pub token_type: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub role: Role,
}

impl Response {
    pub(super) fn new(pair: TokenPair, expires_in: i64) -> Self {
        Self {
            token_type: TOKEN_TYPE.to_owned(),
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            expires_in,
            role: pair.role,
        }
    }
}

/// Handler to open a session from credentials.
pub async fn handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Valid(body): Valid<Body>,
) -> Result<Json<Response>> {
    let (ip, user_agent) = client_meta(&headers);
    let pair = state
        .auth
        .login(&body.email, &body.password, ip, user_agent)
        .await?;

    Ok(Json(Response::new(
        pair,
        state.token.access_ttl().num_seconds(),
    )))
}

#[cfg(test)]
pub(super) mod tests {
    use super::*;
    use crate::*;
    use http_body_util::BodyExt;
    use serde_json::json;
    use sqlx::{Pool, Postgres};

    pub(in crate::router) async fn register_and_login(
        state: AppState,
        email: &str,
        password: &str,
    ) -> Response {
        let response = make_request(
            app(state.clone()),
            Method::POST,
            "/auth/register",
            json!({ "email": email, "password": password }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = make_request(
            app(state),
            Method::POST,
            "/auth/login",
            json!({ "email": email, "password": password }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[sqlx::test]
    async fn test_login_handler(pool: Pool<Postgres>) {
        let state = router::state(pool);

        let body = register_and_login(
            state.clone(),
            "buyer@bid.example",
            "s3cret-enough",
        )
        .await;

        assert_eq!(body.token_type, TOKEN_TYPE);
        assert_eq!(body.expires_in, crate::token::ACCESS_EXPIRATION);
        assert_eq!(body.role, Role::User);

        let claims = state.token.decode_access(&body.access_token).unwrap();
        assert_eq!(claims.email, "buyer@bid.example");
        assert!(state.token.decode_access(&body.refresh_token).is_err());
    }

    #[sqlx::test]
    async fn test_login_wrong_password(pool: Pool<Postgres>) {
        let state = router::state(pool);
        register_and_login(state.clone(), "buyer@bid.example", "s3cret-enough")
            .await;

        let response = make_request(
            app(state),
            Method::POST,
            "/auth/login",
            json!({ "email": "buyer@bid.example", "password": "wrong-one" })
                .to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["detail"], "Invalid email or password.");
    }

    #[sqlx::test]
    async fn test_login_unknown_email_same_answer(pool: Pool<Postgres>) {
        let response = make_request(
            app(router::state(pool)),
            Method::POST,
            "/auth/login",
            json!({ "email": "ghost@bid.example", "password": "whatever1" })
                .to_string(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["detail"], "Invalid email or password.");
    }

    // Full lockout walk: five failures answer 401 invalid credentials, the
    // sixth reveals the lock even with the correct password.
    #[sqlx::test]
    async fn test_login_lockout_flow(pool: Pool<Postgres>) {
        let state = router::state(pool);
        register_and_login(state.clone(), "buyer@bid.example", "s3cret-enough")
            .await;

        for _ in 0..5 {
            let response = make_request(
                app(state.clone()),
                Method::POST,
                "/auth/login",
                json!({ "email": "buyer@bid.example", "password": "wrong-one" })
                    .to_string(),
            )
            .await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

            let body =
                response.into_body().collect().await.unwrap().to_bytes();
            let body: serde_json::Value =
                serde_json::from_slice(&body).unwrap();
            assert_eq!(body["detail"], "Invalid email or password.");
        }

        let response = make_request(
            app(state),
            Method::POST,
            "/auth/login",
            json!({ "email": "buyer@bid.example", "password": "s3cret-enough" })
                .to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            body["detail"],
            "Account is temporarily locked. Try again later."
        );
    }
}
