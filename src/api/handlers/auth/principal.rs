//! Authenticated principal extraction and authorization helpers.
//!
//! Handlers receive an explicit `Principal` resolved from the bearer token;
//! there is no ambient request-global user state. Every endpoint gate reduces
//! to one of: public, any-authenticated, editor-or-above, super-admin-only,
//! or owner-or-admin.

use axum::http::HeaderMap;
use sqlx::PgPool;
use uuid::Uuid;

use super::role::{Role, level_of};
use super::state::AuthState;
use super::storage::{self, UserRecord};
use super::token::{self, TOKEN_TYPE_ACCESS};
use super::utils::bearer_token;
use crate::api::error::ApiError;

/// Authenticated user context derived from the access token and the current
/// database row (tokens do not outlive account deactivation).
#[derive(Clone, Debug)]
pub struct Principal {
    pub user_id: Uuid,
    pub email: String,
    pub role: Option<Role>,
    pub is_superuser: bool,
}

impl Principal {
    /// Effective level; the superuser flag overrides the role table.
    #[must_use]
    pub fn level(&self) -> u8 {
        if self.is_superuser {
            Role::SuperAdmin.level()
        } else {
            level_of(self.role)
        }
    }

    #[must_use]
    pub fn has_permission(&self, required: Role) -> bool {
        self.level() >= required.level()
    }

    #[must_use]
    pub fn can_edit(&self) -> bool {
        self.has_permission(Role::Editor)
    }

    #[must_use]
    pub fn is_super_admin(&self) -> bool {
        self.is_superuser || self.role == Some(Role::SuperAdmin)
    }
}

impl From<&UserRecord> for Principal {
    fn from(user: &UserRecord) -> Self {
        Self {
            user_id: user.id,
            email: user.email.clone(),
            role: Role::parse(&user.role),
            is_superuser: user.is_superuser,
        }
    }
}

/// Resolve the bearer token to the current user row, rejecting missing or
/// invalid tokens and deactivated accounts.
pub(crate) async fn require_user(
    headers: &HeaderMap,
    pool: &PgPool,
    state: &AuthState,
) -> Result<UserRecord, ApiError> {
    let token = bearer_token(headers).ok_or(ApiError::Authentication)?;
    let claims = token::decode_token(state.config(), token, TOKEN_TYPE_ACCESS)?;
    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| ApiError::Authentication)?;

    let user = storage::lookup_user_by_id(pool, user_id)
        .await?
        .ok_or(ApiError::Authentication)?;
    if !user.is_active {
        return Err(ApiError::Authentication);
    }
    Ok(user)
}

/// Like [`require_user`] but returns only the principal context.
pub(crate) async fn require_auth(
    headers: &HeaderMap,
    pool: &PgPool,
    state: &AuthState,
) -> Result<Principal, ApiError> {
    let user = require_user(headers, pool, state).await?;
    Ok(Principal::from(&user))
}
