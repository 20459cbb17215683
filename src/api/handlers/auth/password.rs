//! Password hashing, strength policy, and the change-password endpoint.

use anyhow::{Result, anyhow};
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::Extension, http::HeaderMap, http::StatusCode, response::IntoResponse};
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::instrument;

use super::principal::require_user;
use super::state::AuthState;
use super::storage;
use super::types::{MessageResponse, PasswordChangeRequest};
use crate::api::error::{ApiError, ErrorBody};
use crate::api::handlers::activity::{ACTION_PASSWORD_CHANGED, record_activity};

const MIN_PASSWORD_LEN: usize = 8;

/// Argon2id hash with default parameters and a random salt.
///
/// # Errors
/// Returns an error if hashing fails.
pub(crate) fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("password hash error: {e}"))?;
    Ok(hash.to_string())
}

/// Verify a password against a stored Argon2 hash. Malformed hashes count as
/// a mismatch.
pub(crate) fn verify_password(hash: &str, password: &str) -> bool {
    PasswordHash::new(hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

/// Hash the submitted password and discard the result. Called when a login
/// email has no account so both failure paths pay one full Argon2 pass and
/// response timing does not reveal whether the address is registered.
pub(super) fn burn_password_hash(password: &str) {
    let _ = hash_password(password);
}

/// Strength policy: at least 8 characters with one letter and one digit.
pub(crate) fn password_policy_error(password: &str) -> Option<&'static str> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Some("Password must be at least 8 characters long");
    }
    if !password.chars().any(char::is_alphabetic) {
        return Some("Password must contain at least one letter");
    }
    if !password.chars().any(|ch| ch.is_ascii_digit()) {
        return Some("Password must contain at least one digit");
    }
    None
}

#[utoipa::path(
    post,
    path = "/api/auth/password/change",
    request_body = PasswordChangeRequest,
    responses(
        (status = 200, description = "Password changed.", body = MessageResponse),
        (status = 400, description = "Weak password or mismatched confirmation.", body = ErrorBody),
        (status = 401, description = "Missing token or wrong current password.", body = ErrorBody),
    ),
    tag = "auth"
)]
#[instrument(skip(headers, state, pool, payload))]
pub async fn change_password(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
    payload: Option<Json<PasswordChangeRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let user = require_user(&headers, &pool, &state).await?;
    let Some(Json(payload)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };

    if !verify_password(&user.password_hash, &payload.current_password) {
        return Err(ApiError::Authentication);
    }

    if payload.new_password != payload.confirm_password {
        return Err(ApiError::Validation("Passwords do not match".to_string()));
    }

    if let Some(reason) = password_policy_error(&payload.new_password) {
        return Err(ApiError::Validation(reason.to_string()));
    }

    let new_hash = hash_password(&payload.new_password)?;
    storage::update_password(&pool, user.id, &new_hash).await?;

    record_activity(
        &pool,
        user.id,
        ACTION_PASSWORD_CHANGED,
        super::utils::extract_client_ip(&headers).as_deref(),
        super::utils::client_user_agent(&headers).as_deref(),
        json!({}),
    )
    .await;

    Ok((
        StatusCode::OK,
        Json(MessageResponse {
            message: "Password changed successfully".to_string(),
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::{burn_password_hash, hash_password, password_policy_error, verify_password};

    #[test]
    fn hash_and_verify_round_trip() {
        let hash = hash_password("correct horse 1").expect("hash");
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password(&hash, "correct horse 1"));
        assert!(!verify_password(&hash, "wrong horse 1"));
    }

    #[test]
    fn malformed_hash_is_a_mismatch() {
        assert!(!verify_password("not-a-hash", "anything1"));
    }

    #[test]
    fn policy_rejects_short_passwords() {
        assert!(password_policy_error("ab1").is_some());
        assert!(password_policy_error("abcdef1").is_some());
    }

    #[test]
    fn policy_requires_letter_and_digit() {
        assert!(password_policy_error("12345678").is_some());
        assert!(password_policy_error("abcdefgh").is_some());
        assert!(password_policy_error("abcdefg1").is_none());
    }

    #[test]
    fn burn_hash_completes_for_any_input() {
        burn_password_hash("whatever");
        burn_password_hash("");
    }

    #[test]
    fn salts_differ_between_hashes() {
        let first = hash_password("same password 1").expect("hash");
        let second = hash_password("same password 1").expect("hash");
        assert_ne!(first, second);
    }
}
