//! Authenticated self-service profile endpoints.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::instrument;

use super::activity::{ACTION_PROFILE_UPDATED, record_activity};
use super::auth::AuthState;
use super::auth::principal::require_user;
use super::auth::storage::update_profile_fields;
use super::auth::types::{ProfileUpdateRequest, UserSummary};
use super::auth::utils::{client_user_agent, extract_client_ip, valid_phone};
use crate::api::error::{ApiError, ErrorBody};

#[utoipa::path(
    get,
    path = "/api/auth/profile",
    responses(
        (status = 200, description = "The authenticated user's account.", body = UserSummary),
        (status = 401, description = "Missing or invalid token.", body = ErrorBody),
    ),
    tag = "auth"
)]
#[instrument(skip(headers, state, pool))]
pub async fn get_profile(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
) -> Result<impl IntoResponse, ApiError> {
    let user = require_user(&headers, &pool, &state).await?;
    Ok((StatusCode::OK, Json(UserSummary::from(&user))))
}

#[utoipa::path(
    patch,
    path = "/api/auth/profile",
    request_body = ProfileUpdateRequest,
    responses(
        (status = 200, description = "Updated account.", body = UserSummary),
        (status = 400, description = "No updates provided or invalid phone.", body = ErrorBody),
        (status = 401, description = "Missing or invalid token.", body = ErrorBody),
    ),
    tag = "auth"
)]
#[instrument(skip(headers, state, pool, payload))]
pub async fn update_profile(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
    payload: Option<Json<ProfileUpdateRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let user = require_user(&headers, &pool, &state).await?;
    let Some(Json(payload)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };

    let first_name = normalize_optional(payload.first_name);
    let last_name = normalize_optional(payload.last_name);
    let phone = normalize_optional(payload.phone);

    if first_name.is_none() && last_name.is_none() && phone.is_none() {
        return Err(ApiError::Validation("No updates provided".to_string()));
    }
    if let Some(phone) = phone.as_deref()
        && !valid_phone(phone)
    {
        return Err(ApiError::Validation("Invalid phone number".to_string()));
    }

    let updated = update_profile_fields(
        &pool,
        user.id,
        first_name.as_deref(),
        last_name.as_deref(),
        phone.as_deref(),
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let fields = [
        first_name.as_ref().map(|_| "first_name"),
        last_name.as_ref().map(|_| "last_name"),
        phone.as_ref().map(|_| "phone"),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>();

    record_activity(
        &pool,
        user.id,
        ACTION_PROFILE_UPDATED,
        extract_client_ip(&headers).as_deref(),
        client_user_agent(&headers).as_deref(),
        json!({ "fields": fields }),
    )
    .await;

    Ok((StatusCode::OK, Json(UserSummary::from(&updated))))
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::normalize_optional;

    #[test]
    fn normalize_optional_drops_blank_values() {
        assert_eq!(normalize_optional(None), None);
        assert_eq!(normalize_optional(Some("  ".to_string())), None);
        assert_eq!(
            normalize_optional(Some(" Ada ".to_string())),
            Some("Ada".to_string())
        );
    }
}
