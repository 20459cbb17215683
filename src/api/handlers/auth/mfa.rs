//! MFA lifecycle endpoints: setup, verify, disable.
//!
//! State machine per user: DISABLED -> SETUP_PENDING (secret and backup-code
//! digests stored, flag still false) -> ENABLED (first successful TOTP verify
//! of the pending secret) -> DISABLED (password-confirmed disable clears
//! everything in one statement). There is no DISABLED -> ENABLED shortcut;
//! re-setup always generates a fresh secret.

use axum::{Json, extract::Extension, http::HeaderMap, http::StatusCode, response::IntoResponse};
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::instrument;

use super::password::verify_password;
use super::principal::require_user;
use super::state::AuthState;
use super::storage;
use super::types::{MessageResponse, MfaDisableRequest, MfaSetupResponse, MfaVerifyRequest};
use super::utils::{client_user_agent, extract_client_ip};
use crate::api::error::{ApiError, ErrorBody};
use crate::api::handlers::activity::{
    ACTION_MFA_DISABLED, ACTION_MFA_ENABLED, ACTION_MFA_SETUP_INITIATED, record_activity,
};
use crate::totp::{BackupCodeBatch, TotpEngine};

#[utoipa::path(
    post,
    path = "/api/auth/mfa/setup",
    responses(
        (status = 200, description = "Pending secret, QR, and one-time backup codes.", body = MfaSetupResponse),
        (status = 401, description = "Missing or invalid token.", body = ErrorBody),
        (status = 409, description = "MFA already enabled.", body = ErrorBody),
    ),
    tag = "mfa"
)]
#[instrument(skip(headers, state, pool))]
pub async fn setup(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
) -> Result<impl IntoResponse, ApiError> {
    let user = require_user(&headers, &pool, &state).await?;
    if user.mfa_enabled {
        return Err(ApiError::Conflict("MFA is already enabled".to_string()));
    }

    let secret = TotpEngine::generate_secret();
    let batch = BackupCodeBatch::generate()?;

    // The guard also covers a concurrent enable between the check above and
    // this write.
    if !storage::set_mfa_pending(&pool, user.id, &secret, &batch.code_hashes).await? {
        return Err(ApiError::Conflict("MFA is already enabled".to_string()));
    }

    let otpauth_url = state.totp().provisioning_uri(&secret, &user.email)?;
    let qr_code = state.totp().qr_code_data_url(&secret, &user.email)?;

    record_activity(
        &pool,
        user.id,
        ACTION_MFA_SETUP_INITIATED,
        extract_client_ip(&headers).as_deref(),
        client_user_agent(&headers).as_deref(),
        json!({}),
    )
    .await;

    Ok((
        StatusCode::OK,
        Json(MfaSetupResponse {
            secret,
            otpauth_url,
            qr_code,
            backup_codes: batch.codes,
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/api/auth/mfa/verify",
    request_body = MfaVerifyRequest,
    responses(
        (status = 200, description = "MFA enabled.", body = MessageResponse),
        (status = 400, description = "Invalid or non-numeric token, or no pending setup.", body = ErrorBody),
        (status = 401, description = "Missing or invalid bearer token.", body = ErrorBody),
    ),
    tag = "mfa"
)]
#[instrument(skip(headers, state, pool, payload))]
pub async fn verify(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
    payload: Option<Json<MfaVerifyRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let user = require_user(&headers, &pool, &state).await?;
    let Some(Json(payload)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };

    let token = payload.token.trim();
    if token.len() != 6 || !token.chars().all(|ch| ch.is_ascii_digit()) {
        return Err(ApiError::Validation(
            "MFA token must be six digits".to_string(),
        ));
    }

    let Some(secret) = user.mfa_secret.as_deref() else {
        return Err(ApiError::Validation("No pending MFA setup".to_string()));
    };
    if user.mfa_enabled {
        return Err(ApiError::Conflict("MFA is already enabled".to_string()));
    }

    if !state.totp().verify(secret, token)? {
        return Err(ApiError::Validation("Invalid MFA token".to_string()));
    }

    if !storage::enable_mfa(&pool, user.id).await? {
        // Lost a race with another verify or a disable; nothing was changed.
        return Err(ApiError::Conflict("MFA state changed".to_string()));
    }

    record_activity(
        &pool,
        user.id,
        ACTION_MFA_ENABLED,
        extract_client_ip(&headers).as_deref(),
        client_user_agent(&headers).as_deref(),
        json!({}),
    )
    .await;

    Ok((
        StatusCode::OK,
        Json(MessageResponse {
            message: "MFA enabled".to_string(),
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/api/auth/mfa/disable",
    request_body = MfaDisableRequest,
    responses(
        (status = 200, description = "MFA disabled; secret and backup codes cleared.", body = MessageResponse),
        (status = 400, description = "MFA is not enabled.", body = ErrorBody),
        (status = 401, description = "Wrong password or missing token.", body = ErrorBody),
    ),
    tag = "mfa"
)]
#[instrument(skip(headers, state, pool, payload))]
pub async fn disable(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
    payload: Option<Json<MfaDisableRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let user = require_user(&headers, &pool, &state).await?;
    let Some(Json(payload)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };

    // Disabling MFA weakens the account, so the password is re-checked even
    // on an authenticated request.
    if !verify_password(&user.password_hash, &payload.password) {
        return Err(ApiError::Authentication);
    }

    if !storage::disable_mfa(&pool, user.id).await? {
        return Err(ApiError::Validation("MFA is not enabled".to_string()));
    }

    record_activity(
        &pool,
        user.id,
        ACTION_MFA_DISABLED,
        extract_client_ip(&headers).as_deref(),
        client_user_agent(&headers).as_deref(),
        json!({}),
    )
    .await;

    Ok((
        StatusCode::OK,
        Json(MessageResponse {
            message: "MFA disabled".to_string(),
        }),
    ))
}
