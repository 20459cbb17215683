use axum::{http::StatusCode, response::IntoResponse};

use crate::APP_USER_AGENT;

/// Service banner for `/`. Undocumented on purpose.
pub async fn root() -> impl IntoResponse {
    (StatusCode::OK, APP_USER_AGENT)
}
