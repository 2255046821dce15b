use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::router::{Message, Valid};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Body {
    #[validate(email(message = "Email must be formatted."))]
    pub email: String,
}

/// Handler to start a password reset.
///
/// Mail delivery is not wired up yet; the answer is the same whether or not
/// the email matches an account, so this route cannot be used to enumerate.
pub async fn forgot(
    State(state): State<AppState>,
    Valid(body): Valid<Body>,
) -> Json<Message> {
    if let Ok(Some(account)) =
        state.auth.find_account_by_email(&body.email).await
    {
        tracing::info!(account_id = account.id, "password reset requested");
    }

    Json(Message::new(
        "If this email is registered, a reset link has been sent.",
    ))
}
