//! Account registration.

use axum::{Json, extract::Extension, http::HeaderMap, http::StatusCode, response::IntoResponse};
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::instrument;

use super::password::{hash_password, password_policy_error};
use super::rate_limit::{RateLimitAction, RateLimitDecision};
use super::role::Role;
use super::state::AuthState;
use super::storage::{self, NewUser, SignupOutcome};
use super::token::issue_token_pair;
use super::types::{AuthResponse, RegisterRequest, UserSummary};
use super::utils::{
    client_user_agent, extract_client_ip, normalize_email, valid_email, valid_phone,
};
use crate::api::error::{ApiError, ErrorBody};
use crate::api::handlers::activity::{ACTION_USER_REGISTERED, record_activity};

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created as viewer.", body = AuthResponse),
        (status = 400, description = "Invalid email, phone, names, or password.", body = ErrorBody),
        (status = 409, description = "Email already registered.", body = ErrorBody),
        (status = 429, description = "Too many registrations from this IP.", body = ErrorBody),
    ),
    tag = "auth"
)]
#[instrument(skip(headers, state, pool, payload))]
pub async fn register(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
    payload: Option<Json<RegisterRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let ip = extract_client_ip(&headers);
    if state
        .rate_limiter()
        .check_ip(ip.as_deref(), RateLimitAction::Register)
        == RateLimitDecision::Limited
    {
        return Err(ApiError::RateLimited);
    }

    let Some(Json(payload)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };

    let email = normalize_email(&payload.email);
    if !valid_email(&email) {
        return Err(ApiError::Validation("Invalid email address".to_string()));
    }

    let first_name = payload.first_name.trim();
    let last_name = payload.last_name.trim();
    if first_name.is_empty() || last_name.is_empty() {
        return Err(ApiError::Validation(
            "First and last name are required".to_string(),
        ));
    }

    let phone = payload
        .phone
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if let Some(phone) = phone
        && !valid_phone(phone)
    {
        return Err(ApiError::Validation("Invalid phone number".to_string()));
    }

    if payload.password != payload.confirm_password {
        return Err(ApiError::Validation("Passwords do not match".to_string()));
    }
    if let Some(reason) = password_policy_error(&payload.password) {
        return Err(ApiError::Validation(reason.to_string()));
    }

    let password_hash = hash_password(&payload.password)?;
    // New accounts always start at the bottom of the role ladder.
    let outcome = storage::insert_user(
        &pool,
        &NewUser {
            email: &email,
            password_hash: &password_hash,
            first_name,
            last_name,
            phone,
            role: Role::Viewer.as_str(),
        },
    )
    .await?;

    let user = match outcome {
        SignupOutcome::Created(user) => user,
        SignupOutcome::DuplicateEmail => {
            return Err(ApiError::Conflict("Email already registered".to_string()));
        }
    };

    record_activity(
        &pool,
        user.id,
        ACTION_USER_REGISTERED,
        ip.as_deref(),
        client_user_agent(&headers).as_deref(),
        json!({ "email": user.email }),
    )
    .await;

    let tokens = issue_token_pair(state.config(), user.id, &user.email, Role::parse(&user.role))?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user: UserSummary::from(user.as_ref()),
            tokens,
        }),
    ))
}
