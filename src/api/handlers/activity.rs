//! Append-only user activity audit trail.
//!
//! Every security-relevant operation appends one row. The log is read-only
//! through the API for all callers, including super admins.

use anyhow::{Context, Result};
use axum::{
    Json,
    extract::{Extension, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tracing::{Instrument, error, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use super::auth::AuthState;
use super::auth::principal::require_auth;
use crate::api::error::{ApiError, ErrorBody};

pub const ACTION_USER_REGISTERED: &str = "USER_REGISTERED";
pub const ACTION_USER_LOGIN: &str = "USER_LOGIN";
pub const ACTION_PROFILE_UPDATED: &str = "PROFILE_UPDATED";
pub const ACTION_PASSWORD_CHANGED: &str = "PASSWORD_CHANGED";
pub const ACTION_MFA_SETUP_INITIATED: &str = "MFA_SETUP_INITIATED";
pub const ACTION_MFA_ENABLED: &str = "MFA_ENABLED";
pub const ACTION_MFA_DISABLED: &str = "MFA_DISABLED";
pub const ACTION_USER_ROLE_UPDATED: &str = "USER_ROLE_UPDATED";
pub const ACTION_USER_ACTIVATED: &str = "USER_ACTIVATED";
pub const ACTION_USER_DEACTIVATED: &str = "USER_DEACTIVATED";
pub const ACTION_USER_DELETED: &str = "USER_DELETED";

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

#[derive(Debug, Serialize, ToSchema)]
pub struct ActivityEntry {
    pub id: String,
    pub user_id: String,
    pub action: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub details: serde_json::Value,
    pub created_at: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ActivityQuery {
    /// Super-admin only: scope to a specific user.
    pub user_id: Option<Uuid>,
    /// Super-admin only: substring match on the action name.
    pub action: Option<String>,
    pub limit: Option<i64>,
}

/// Append an activity record. Audit failures are logged and never fail the
/// caller's operation.
pub async fn record_activity(
    pool: &PgPool,
    user_id: Uuid,
    action: &str,
    ip: Option<&str>,
    user_agent: Option<&str>,
    details: serde_json::Value,
) {
    if let Err(err) = insert_activity(pool, user_id, action, ip, user_agent, details).await {
        error!(action, %user_id, "Failed to record activity: {err:?}");
    }
}

async fn insert_activity(
    pool: &PgPool,
    user_id: Uuid,
    action: &str,
    ip: Option<&str>,
    user_agent: Option<&str>,
    details: serde_json::Value,
) -> Result<()> {
    let query = r"
        INSERT INTO user_activity (user_id, action, ip_address, user_agent, details)
        VALUES ($1, $2, $3, $4, $5)
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(action)
        .bind(ip)
        .bind(user_agent)
        .bind(details)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to insert activity record")?;
    Ok(())
}

#[utoipa::path(
    get,
    path = "/api/auth/activity",
    params(
        ("user_id" = Option<Uuid>, Query, description = "Filter by user (super admin only)"),
        ("action" = Option<String>, Query, description = "Action substring filter (super admin only)"),
        ("limit" = Option<i64>, Query, description = "Max rows, capped at 200"),
    ),
    responses(
        (status = 200, description = "Activity records, newest first.", body = [ActivityEntry]),
        (status = 401, description = "Missing or invalid token.", body = ErrorBody),
        (status = 403, description = "Filters require super admin.", body = ErrorBody),
    ),
    tag = "activity"
)]
#[instrument(skip(headers, state, pool))]
pub async fn list_activity(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
    Query(params): Query<ActivityQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(&headers, &pool, &state).await?;

    let filters_requested = params.user_id.is_some() || params.action.is_some();
    if filters_requested && !principal.is_super_admin() {
        return Err(ApiError::Authorization);
    }

    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    // Non-admins are always scoped to their own trail.
    let (user_filter, action_filter) = if principal.is_super_admin() {
        (params.user_id, params.action)
    } else {
        (Some(principal.user_id), None)
    };

    let entries = fetch_activity(&pool, user_filter, action_filter.as_deref(), limit).await?;
    Ok((StatusCode::OK, Json(entries)))
}

async fn fetch_activity(
    pool: &PgPool,
    user_id: Option<Uuid>,
    action: Option<&str>,
    limit: i64,
) -> Result<Vec<ActivityEntry>> {
    let query = r#"
        SELECT
            id::text AS id,
            user_id::text AS user_id,
            action,
            ip_address,
            user_agent,
            details,
            to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
        FROM user_activity
        WHERE ($1::uuid IS NULL OR user_id = $1)
          AND ($2::text IS NULL OR action ILIKE '%' || $2 || '%')
        ORDER BY created_at DESC
        LIMIT $3
    "#;
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(user_id)
        .bind(action)
        .bind(limit)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list activity")?;

    Ok(rows
        .into_iter()
        .map(|row| ActivityEntry {
            id: row.get("id"),
            user_id: row.get("user_id"),
            action: row.get("action"),
            ip_address: row.get("ip_address"),
            user_agent: row.get("user_agent"),
            details: row.get("details"),
            created_at: row.get("created_at"),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_names_are_upper_snake() {
        let actions = [
            ACTION_USER_REGISTERED,
            ACTION_USER_LOGIN,
            ACTION_PROFILE_UPDATED,
            ACTION_PASSWORD_CHANGED,
            ACTION_MFA_SETUP_INITIATED,
            ACTION_MFA_ENABLED,
            ACTION_MFA_DISABLED,
            ACTION_USER_ROLE_UPDATED,
            ACTION_USER_ACTIVATED,
            ACTION_USER_DEACTIVATED,
            ACTION_USER_DELETED,
        ];
        for action in actions {
            assert!(
                action
                    .chars()
                    .all(|ch| ch.is_ascii_uppercase() || ch == '_')
            );
        }
    }

    #[test]
    fn activity_query_deserializes_from_params() {
        let params: ActivityQuery =
            serde_json::from_str(r#"{"action":"MFA","limit":10}"#).expect("query");
        assert_eq!(params.action.as_deref(), Some("MFA"));
        assert_eq!(params.limit, Some(10));
        assert!(params.user_id.is_none());
    }
}
