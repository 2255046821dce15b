use axum::{Extension, Json};

use crate::middleware::Identity;

/// Handler returning the identity proven by the access token.
pub async fn handler(Extension(identity): Extension<Identity>) -> Json<Identity> {
    Json(identity)
}
