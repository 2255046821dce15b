use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::router::{Message, Valid};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Body {
    #[validate(length(min = 1, message = "Refresh token is required."))]
    pub refresh_token: String,
}

/// Handler to close a session.
///
/// Always answers 200: the caller learns nothing about whether the token
/// matched a live session.
pub async fn handler(
    State(state): State<AppState>,
    Valid(body): Valid<Body>,
) -> Json<Message> {
    state.auth.logout(&body.refresh_token).await;

    Json(Message::new("Logged out successfully."))
}
