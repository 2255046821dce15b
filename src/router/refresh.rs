use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::error::Result;
use crate::router::Valid;
use crate::router::login::Response;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Body {
    #[validate(length(min = 1, message = "Refresh token is required."))]
    pub refresh_token: String,
}

/// Handler to rotate a refresh token into a new pair.
pub async fn handler(
    State(state): State<AppState>,
    Valid(body): Valid<Body>,
) -> Result<Json<Response>> {
    let pair = state.auth.refresh(&body.refresh_token).await?;

    Ok(Json(Response::new(
        pair,
        state.token.access_ttl().num_seconds(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::login::tests::register_and_login;
    use crate::*;
    use http_body_util::BodyExt;
    use serde_json::json;
    use sqlx::{Pool, Postgres};

    #[sqlx::test]
    async fn test_refresh_rotates(pool: Pool<Postgres>) {
        let state = router::state(pool);
        let first = register_and_login(
            state.clone(),
            "buyer@bid.example",
            "s3cret-enough",
        )
        .await;

        let response = make_request(
            app(state.clone()),
            Method::POST,
            "/auth/refresh",
            json!({ "refresh_token": first.refresh_token }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let second: Response = serde_json::from_slice(&body).unwrap();
        assert_ne!(second.refresh_token, first.refresh_token);

        // The rotated-out token answers 401 from now on.
        let response = make_request(
            app(state),
            Method::POST,
            "/auth/refresh",
            json!({ "refresh_token": first.refresh_token }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[sqlx::test]
    async fn test_refresh_rejects_garbage(pool: Pool<Postgres>) {
        let response = make_request(
            app(router::state(pool)),
            Method::POST,
            "/auth/refresh",
            json!({ "refresh_token": "not-a-token" }).to_string(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            body["detail"],
            "The provided token is invalid or has expired."
        );
    }
}
