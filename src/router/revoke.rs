use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::error::Result;
use crate::router::{Message, Valid};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Body {
    #[validate(range(min = 1, message = "Account id is required."))]
    pub account_id: i64,
}

/// Handler to force-close every session of an account. Superadmin only.
pub async fn handler(
    State(state): State<AppState>,
    Valid(body): Valid<Body>,
) -> Result<Json<Message>> {
    let retired = state.auth.revoke_all_sessions(body.account_id).await?;

    Ok(Json(Message::new(&format!("{retired} session(s) revoked."))))
}
