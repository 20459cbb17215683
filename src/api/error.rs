//! API error taxonomy and HTTP response mapping.
//!
//! Storage and service layers work with `anyhow`; handlers surface failures
//! through this enum so every endpoint emits the same
//! `{"error": <kind>, "message": <text>}` body.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use utoipa::ToSchema;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    /// Unknown email, wrong password, bad MFA token, disabled account, and
    /// invalid bearer tokens all collapse into this variant so responses do
    /// not leak which part of the credential failed.
    #[error("Invalid credentials")]
    Authentication,
    /// Password was correct but the account requires an MFA token.
    #[error("MFA token required")]
    MfaRequired,
    #[error("Insufficient permissions")]
    Authorization,
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Too many attempts, try again later")]
    RateLimited,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mfa_required: Option<bool>,
}

impl ApiError {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Authentication => "authentication",
            Self::MfaRequired => "mfa_required",
            Self::Authorization => "authorization",
            Self::Conflict(_) => "conflict",
            Self::NotFound(_) => "not_found",
            Self::RateLimited => "rate_limited",
            Self::Internal(_) => "internal",
        }
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Authentication | Self::MfaRequired => StatusCode::UNAUTHORIZED,
            Self::Authorization => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Internal details are logged server-side and never serialized.
        let message = match &self {
            Self::Internal(err) => {
                error!("Internal error: {err:?}");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorBody {
            error: self.kind(),
            message,
            mfa_required: matches!(self, Self::MfaRequired).then_some(true),
        };

        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::ApiError;
    use anyhow::anyhow;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    #[test]
    fn kinds_and_statuses_line_up() {
        let cases = [
            (
                ApiError::Validation("bad".to_string()),
                "validation",
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::Authentication,
                "authentication",
                StatusCode::UNAUTHORIZED,
            ),
            (
                ApiError::MfaRequired,
                "mfa_required",
                StatusCode::UNAUTHORIZED,
            ),
            (
                ApiError::Authorization,
                "authorization",
                StatusCode::FORBIDDEN,
            ),
            (
                ApiError::Conflict("dup".to_string()),
                "conflict",
                StatusCode::CONFLICT,
            ),
            (
                ApiError::NotFound("missing".to_string()),
                "not_found",
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::RateLimited,
                "rate_limited",
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (
                ApiError::Internal(anyhow!("boom")),
                "internal",
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, kind, status) in cases {
            assert_eq!(err.kind(), kind);
            assert_eq!(err.status(), status);
        }
    }

    #[test]
    fn internal_message_is_masked() {
        let response = ApiError::Internal(anyhow!("secret detail")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn mfa_required_response_is_unauthorized() {
        let response = ApiError::MfaRequired.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
