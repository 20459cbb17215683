//! Super-admin user management endpoints.
//!
//! Flow Overview:
//! 1) Authenticate the bearer token and require super admin.
//! 2) Perform the read or the single-statement state change.
//! 3) Append the matching audit record.

use anyhow::{Context, Result};
use axum::{
    Json,
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tracing::{Instrument, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use super::activity::{
    ACTION_USER_ACTIVATED, ACTION_USER_DEACTIVATED, ACTION_USER_DELETED, ACTION_USER_ROLE_UPDATED,
    record_activity,
};
use super::auth::principal::{Principal, require_auth};
use super::auth::storage::lookup_user_by_id;
use super::auth::types::{MessageResponse, UserSummary};
use super::auth::utils::{client_user_agent, extract_client_ip};
use super::auth::{AuthState, Role};
use crate::api::error::{ApiError, ErrorBody};

#[derive(Debug, Deserialize, ToSchema)]
pub struct UserListQuery {
    pub role: Option<String>,
    pub is_active: Option<bool>,
    /// Substring match on email, first name, or last name.
    pub search: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UserRoleRequest {
    pub role: String,
}

async fn require_super_admin(
    headers: &HeaderMap,
    pool: &PgPool,
    state: &AuthState,
) -> Result<Principal, ApiError> {
    let principal = require_auth(headers, pool, state).await?;
    if !principal.is_super_admin() {
        return Err(ApiError::Authorization);
    }
    Ok(principal)
}

fn parse_user_id(id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(id.trim()).map_err(|_| ApiError::Validation("Invalid user id".to_string()))
}

#[utoipa::path(
    get,
    path = "/api/auth/users",
    params(
        ("role" = Option<String>, Query, description = "Filter by role"),
        ("is_active" = Option<bool>, Query, description = "Filter by active flag"),
        ("search" = Option<String>, Query, description = "Email/name substring"),
    ),
    responses(
        (status = 200, description = "All users, newest first.", body = [UserSummary]),
        (status = 401, description = "Missing or invalid token.", body = ErrorBody),
        (status = 403, description = "Super admin only.", body = ErrorBody),
    ),
    tag = "users"
)]
#[instrument(skip(headers, state, pool))]
pub async fn list_users(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
    Query(params): Query<UserListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    require_super_admin(&headers, &pool, &state).await?;
    let users = fetch_user_list(&pool, &params).await?;
    Ok((StatusCode::OK, Json(users)))
}

#[utoipa::path(
    get,
    path = "/api/auth/users/{id}",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "User detail.", body = UserSummary),
        (status = 401, description = "Missing or invalid token.", body = ErrorBody),
        (status = 403, description = "Super admin only.", body = ErrorBody),
        (status = 404, description = "User not found.", body = ErrorBody),
    ),
    tag = "users"
)]
#[instrument(skip(headers, state, pool))]
pub async fn get_user(
    Path(id): Path<String>,
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
) -> Result<impl IntoResponse, ApiError> {
    require_super_admin(&headers, &pool, &state).await?;
    let user_id = parse_user_id(&id)?;
    let user = lookup_user_by_id(&pool, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    Ok((StatusCode::OK, Json(UserSummary::from(&user))))
}

#[utoipa::path(
    patch,
    path = "/api/auth/users/{id}/role",
    params(("id" = String, Path, description = "User id")),
    request_body = UserRoleRequest,
    responses(
        (status = 200, description = "Role updated.", body = UserSummary),
        (status = 400, description = "Unknown role.", body = ErrorBody),
        (status = 403, description = "Super admin only.", body = ErrorBody),
        (status = 404, description = "User not found.", body = ErrorBody),
    ),
    tag = "users"
)]
#[instrument(skip(headers, state, pool, payload))]
pub async fn set_user_role(
    Path(id): Path<String>,
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
    payload: Option<Json<UserRoleRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_super_admin(&headers, &pool, &state).await?;
    let user_id = parse_user_id(&id)?;
    let Some(Json(payload)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };
    let Some(role) = Role::parse(&payload.role) else {
        return Err(ApiError::Validation("Unknown role".to_string()));
    };

    let target = lookup_user_by_id(&pool, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    let old_role = target.role.clone();

    let updated = update_role(&pool, user_id, role.as_str()).await?;

    if old_role != role.as_str() {
        record_activity(
            &pool,
            principal.user_id,
            ACTION_USER_ROLE_UPDATED,
            extract_client_ip(&headers).as_deref(),
            client_user_agent(&headers).as_deref(),
            json!({
                "target_id": user_id,
                "old_role": old_role,
                "new_role": role.as_str(),
            }),
        )
        .await;
    }

    Ok((StatusCode::OK, Json(updated)))
}

#[utoipa::path(
    post,
    path = "/api/auth/users/{id}/activate",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "User activated.", body = MessageResponse),
        (status = 403, description = "Super admin only.", body = ErrorBody),
        (status = 404, description = "User not found.", body = ErrorBody),
    ),
    tag = "users"
)]
#[instrument(skip(headers, state, pool))]
pub async fn activate_user(
    Path(id): Path<String>,
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_super_admin(&headers, &pool, &state).await?;
    let user_id = parse_user_id(&id)?;

    if !set_active(&pool, user_id, true).await? {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    record_activity(
        &pool,
        principal.user_id,
        ACTION_USER_ACTIVATED,
        extract_client_ip(&headers).as_deref(),
        client_user_agent(&headers).as_deref(),
        json!({ "target_id": user_id }),
    )
    .await;

    Ok((
        StatusCode::OK,
        Json(MessageResponse {
            message: "User activated".to_string(),
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/api/auth/users/{id}/deactivate",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "User deactivated.", body = MessageResponse),
        (status = 400, description = "Cannot deactivate own account.", body = ErrorBody),
        (status = 403, description = "Super admin only.", body = ErrorBody),
        (status = 404, description = "User not found.", body = ErrorBody),
    ),
    tag = "users"
)]
#[instrument(skip(headers, state, pool))]
pub async fn deactivate_user(
    Path(id): Path<String>,
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_super_admin(&headers, &pool, &state).await?;
    let user_id = parse_user_id(&id)?;
    if user_id == principal.user_id {
        return Err(ApiError::Validation(
            "Cannot deactivate your own account".to_string(),
        ));
    }

    if !set_active(&pool, user_id, false).await? {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    record_activity(
        &pool,
        principal.user_id,
        ACTION_USER_DEACTIVATED,
        extract_client_ip(&headers).as_deref(),
        client_user_agent(&headers).as_deref(),
        json!({ "target_id": user_id }),
    )
    .await;

    Ok((
        StatusCode::OK,
        Json(MessageResponse {
            message: "User deactivated".to_string(),
        }),
    ))
}

#[utoipa::path(
    delete,
    path = "/api/auth/users/{id}",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 204, description = "User deleted."),
        (status = 400, description = "Cannot delete own account.", body = ErrorBody),
        (status = 403, description = "Super admin only.", body = ErrorBody),
        (status = 404, description = "User not found.", body = ErrorBody),
    ),
    tag = "users"
)]
#[instrument(skip(headers, state, pool))]
pub async fn delete_user(
    Path(id): Path<String>,
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_super_admin(&headers, &pool, &state).await?;
    let user_id = parse_user_id(&id)?;
    if user_id == principal.user_id {
        return Err(ApiError::Validation(
            "Cannot delete your own account".to_string(),
        ));
    }

    let Some(target) = lookup_user_by_id(&pool, user_id).await? else {
        return Err(ApiError::NotFound("User not found".to_string()));
    };
    delete_user_record(&pool, user_id).await?;

    // Attributed to the actor; the target row (and its FK) is gone.
    record_activity(
        &pool,
        principal.user_id,
        ACTION_USER_DELETED,
        extract_client_ip(&headers).as_deref(),
        client_user_agent(&headers).as_deref(),
        json!({ "target_id": user_id, "email": target.email }),
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_user_list(pool: &PgPool, params: &UserListQuery) -> Result<Vec<UserSummary>> {
    let query = r#"
        SELECT
            id::text AS id, email, first_name, last_name, phone, role,
            is_verified, is_active, mfa_enabled,
            to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
        FROM users
        WHERE ($1::text IS NULL OR role = $1)
          AND ($2::bool IS NULL OR is_active = $2)
          AND ($3::text IS NULL
               OR email ILIKE '%' || $3 || '%'
               OR first_name ILIKE '%' || $3 || '%'
               OR last_name ILIKE '%' || $3 || '%')
        ORDER BY created_at DESC
    "#;
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(params.role.as_deref())
        .bind(params.is_active)
        .bind(params.search.as_deref())
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list users")?;

    Ok(rows
        .into_iter()
        .map(|row| UserSummary {
            id: row.get("id"),
            email: row.get("email"),
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
            phone: row.get("phone"),
            role: row.get("role"),
            is_verified: row.get("is_verified"),
            is_active: row.get("is_active"),
            mfa_enabled: row.get("mfa_enabled"),
            created_at: row.get("created_at"),
        })
        .collect())
}

async fn update_role(pool: &PgPool, user_id: Uuid, role: &str) -> Result<UserSummary> {
    let query = r#"
        UPDATE users
        SET role = $2, updated_at = NOW()
        WHERE id = $1
        RETURNING
            id::text AS id, email, first_name, last_name, phone, role,
            is_verified, is_active, mfa_enabled,
            to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
    "#;
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .bind(role)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to update role")?;

    Ok(UserSummary {
        id: row.get("id"),
        email: row.get("email"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        phone: row.get("phone"),
        role: row.get("role"),
        is_verified: row.get("is_verified"),
        is_active: row.get("is_active"),
        mfa_enabled: row.get("mfa_enabled"),
        created_at: row.get("created_at"),
    })
}

async fn set_active(pool: &PgPool, user_id: Uuid, active: bool) -> Result<bool> {
    let query = "UPDATE users SET is_active = $2, updated_at = NOW() WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(user_id)
        .bind(active)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to update active flag")?;
    Ok(result.rows_affected() > 0)
}

async fn delete_user_record(pool: &PgPool, user_id: Uuid) -> Result<()> {
    let query = "DELETE FROM users WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete user")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::parse_user_id;
    use uuid::Uuid;

    #[test]
    fn parse_user_id_accepts_uuid_with_whitespace() {
        let id = Uuid::new_v4();
        assert_eq!(parse_user_id(&format!(" {id} ")).ok(), Some(id));
    }

    #[test]
    fn parse_user_id_rejects_garbage() {
        assert!(parse_user_id("not-a-uuid").is_err());
    }
}
