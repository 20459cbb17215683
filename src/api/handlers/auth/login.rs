//! Login with conditional MFA step.
//!
//! Flow Overview:
//! 1) Rate-limit by source IP before touching credentials.
//! 2) Verify the password; unknown email, wrong password, and deactivated
//!    accounts all produce the same authentication error.
//! 3) If MFA is enabled: no token means `mfa_required`, a six-digit token is
//!    checked as TOTP, anything else is consumed as a backup code.
//! 4) On success: record the login IP, ensure the portfolio profile exists,
//!    append the audit record, and return the token pair.

use axum::{Json, extract::Extension, http::HeaderMap, http::StatusCode, response::IntoResponse};
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{instrument, warn};

use super::password::{burn_password_hash, verify_password};
use super::rate_limit::{RateLimitAction, RateLimitDecision};
use super::role::Role;
use super::state::AuthState;
use super::storage::{self, UserRecord};
use super::token::issue_token_pair;
use super::types::{LoginRequest, LoginResponse, UserSummary};
use super::utils::{client_user_agent, extract_client_ip, normalize_email};
use crate::api::error::{ApiError, ErrorBody};
use crate::api::handlers::activity::{ACTION_USER_LOGIN, record_activity};
use crate::totp::backup::hash_backup_code;

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated; returns user, profile, and token pair.", body = LoginResponse),
        (status = 401, description = "Invalid credentials, or MFA token required.", body = ErrorBody),
        (status = 429, description = "Too many attempts from this IP.", body = ErrorBody),
    ),
    tag = "auth"
)]
#[instrument(skip(headers, state, pool, payload))]
pub async fn login(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
    payload: Option<Json<LoginRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let ip = extract_client_ip(&headers);
    if state
        .rate_limiter()
        .check_ip(ip.as_deref(), RateLimitAction::Login)
        == RateLimitDecision::Limited
    {
        return Err(ApiError::RateLimited);
    }

    let Some(Json(payload)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };

    let email = normalize_email(&payload.email);
    let Some(user) = storage::lookup_user_by_email(&pool, &email).await? else {
        // Pay the hashing cost even without an account so an unknown email
        // and a wrong password answer in the same time.
        burn_password_hash(&payload.password);
        return Err(ApiError::Authentication);
    };

    if !verify_password(&user.password_hash, &payload.password) {
        return Err(ApiError::Authentication);
    }
    if !user.is_active {
        return Err(ApiError::Authentication);
    }

    if user.mfa_enabled {
        let Some(token) = payload
            .mfa_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
        else {
            return Err(ApiError::MfaRequired);
        };
        verify_mfa_token(&state, &pool, &user, token).await?;
    }

    storage::record_login(&pool, user.id, ip.as_deref()).await?;
    let profile = storage::ensure_profile(&pool, &user).await?;

    record_activity(
        &pool,
        user.id,
        ACTION_USER_LOGIN,
        ip.as_deref(),
        client_user_agent(&headers).as_deref(),
        json!({ "mfa": user.mfa_enabled }),
    )
    .await;

    let tokens = issue_token_pair(state.config(), user.id, &user.email, Role::parse(&user.role))?;

    Ok((
        StatusCode::OK,
        Json(LoginResponse {
            user: UserSummary::from(&user),
            profile,
            tokens,
        }),
    ))
}

/// Six-digit numeric tokens are TOTP; anything else is treated as a backup
/// code and consumed exactly once. A failed check consumes nothing.
async fn verify_mfa_token(
    state: &AuthState,
    pool: &PgPool,
    user: &UserRecord,
    token: &str,
) -> Result<(), ApiError> {
    if token.len() == 6 && token.chars().all(|ch| ch.is_ascii_digit()) {
        let secret = user.mfa_secret.as_deref().ok_or(ApiError::Authentication)?;
        if state.totp().verify(secret, token)? {
            return Ok(());
        }
        return Err(ApiError::Authentication);
    }

    let Ok(digest) = hash_backup_code(token) else {
        return Err(ApiError::Authentication);
    };
    if storage::consume_backup_code(pool, user.id, &digest).await? {
        warn!(user_id = %user.id, "Backup code consumed during login");
        return Ok(());
    }
    Err(ApiError::Authentication)
}
