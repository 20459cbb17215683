//! JWT issuance and the refresh endpoint.
//!
//! Tokens are HS256 bearer credentials bound to the user id and role at
//! issuance. There is no server-side revocation list; logout is client-side
//! token discard, and refresh re-checks the stored account state.

use anyhow::{Result, anyhow};
use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use super::role::Role;
use super::state::{AuthConfig, AuthState};
use super::storage;
use super::types::{TokenPair, TokenRefreshRequest, TokenRefreshResponse};
use crate::api::error::{ApiError, ErrorBody};

const TOKEN_ISSUER: &str = "folio";
pub(super) const TOKEN_TYPE_ACCESS: &str = "access";
pub(super) const TOKEN_TYPE_REFRESH: &str = "refresh";

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Claims {
    pub(crate) sub: String,
    pub(crate) email: String,
    pub(crate) role: String,
    pub(crate) typ: String,
    pub(crate) iss: String,
    pub(crate) iat: i64,
    pub(crate) exp: i64,
    pub(crate) jti: String,
}

/// Issue the access/refresh pair for a freshly authenticated user.
///
/// # Errors
/// Returns an error if signing fails.
pub(super) fn issue_token_pair(
    config: &AuthConfig,
    user_id: Uuid,
    email: &str,
    role: Option<Role>,
) -> Result<TokenPair> {
    Ok(TokenPair {
        access: issue_token(
            config,
            user_id,
            email,
            role,
            TOKEN_TYPE_ACCESS,
            config.access_ttl_seconds(),
        )?,
        refresh: issue_token(
            config,
            user_id,
            email,
            role,
            TOKEN_TYPE_REFRESH,
            config.refresh_ttl_seconds(),
        )?,
    })
}

fn issue_token(
    config: &AuthConfig,
    user_id: Uuid,
    email: &str,
    role: Option<Role>,
    typ: &str,
    ttl_seconds: i64,
) -> Result<String> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        role: role.map_or("", Role::as_str).to_string(),
        typ: typ.to_string(),
        iss: TOKEN_ISSUER.to_string(),
        iat: now,
        exp: now + ttl_seconds,
        jti: Uuid::new_v4().to_string(),
    };
    let key = EncodingKey::from_secret(config.jwt_secret().expose_secret().as_bytes());
    encode(&Header::default(), &claims, &key).map_err(|e| anyhow!("token encode error: {e}"))
}

/// Decode and validate a token of the expected type. Any failure collapses
/// into an authentication error.
pub(super) fn decode_token(
    config: &AuthConfig,
    token: &str,
    expected_typ: &str,
) -> Result<Claims, ApiError> {
    let key = DecodingKey::from_secret(config.jwt_secret().expose_secret().as_bytes());
    let mut validation = Validation::default();
    validation.set_issuer(&[TOKEN_ISSUER]);
    validation.set_required_spec_claims(&["exp", "iss"]);

    let data = decode::<Claims>(token, &key, &validation).map_err(|_| ApiError::Authentication)?;
    if data.claims.typ != expected_typ {
        return Err(ApiError::Authentication);
    }
    Ok(data.claims)
}

#[utoipa::path(
    post,
    path = "/api/auth/token/refresh",
    request_body = TokenRefreshRequest,
    responses(
        (status = 200, description = "New access token.", body = TokenRefreshResponse),
        (status = 401, description = "Invalid, expired, or wrong-type token.", body = ErrorBody),
    ),
    tag = "auth"
)]
#[instrument(skip(state, pool, payload))]
pub async fn refresh(
    state: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
    payload: Option<Json<TokenRefreshRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(Json(payload)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };

    let claims = decode_token(state.config(), &payload.refresh, TOKEN_TYPE_REFRESH)?;
    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| ApiError::Authentication)?;

    // Bind the new access token to current account state, not the claims.
    let user = storage::lookup_user_by_id(&pool, user_id)
        .await?
        .ok_or(ApiError::Authentication)?;
    if !user.is_active {
        return Err(ApiError::Authentication);
    }

    let access = issue_token(
        state.config(),
        user.id,
        &user.email,
        Role::parse(&user.role),
        TOKEN_TYPE_ACCESS,
        state.config().access_ttl_seconds(),
    )?;

    Ok((StatusCode::OK, Json(TokenRefreshResponse { access })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn config() -> AuthConfig {
        AuthConfig::new(SecretString::from("test-signing-secret"))
    }

    #[test]
    fn pair_round_trips_with_expected_types() {
        let config = config();
        let user_id = Uuid::new_v4();
        let pair = issue_token_pair(&config, user_id, "a@x.com", Some(Role::Editor)).expect("pair");

        let access = decode_token(&config, &pair.access, TOKEN_TYPE_ACCESS).expect("access");
        assert_eq!(access.sub, user_id.to_string());
        assert_eq!(access.email, "a@x.com");
        assert_eq!(access.role, "editor");
        assert_eq!(access.iss, "folio");

        let refresh = decode_token(&config, &pair.refresh, TOKEN_TYPE_REFRESH).expect("refresh");
        assert_eq!(refresh.sub, access.sub);
        assert!(refresh.exp > access.exp);
        assert_ne!(refresh.jti, access.jti);
    }

    #[test]
    fn wrong_type_is_rejected() {
        let config = config();
        let pair =
            issue_token_pair(&config, Uuid::new_v4(), "a@x.com", Some(Role::Viewer)).expect("pair");
        assert!(decode_token(&config, &pair.refresh, TOKEN_TYPE_ACCESS).is_err());
        assert!(decode_token(&config, &pair.access, TOKEN_TYPE_REFRESH).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        // Expiry far enough in the past to clear the default leeway.
        let config = config().with_access_ttl_seconds(-120);
        let pair =
            issue_token_pair(&config, Uuid::new_v4(), "a@x.com", Some(Role::Viewer)).expect("pair");
        assert!(decode_token(&config, &pair.access, TOKEN_TYPE_ACCESS).is_err());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let config = config();
        let pair =
            issue_token_pair(&config, Uuid::new_v4(), "a@x.com", Some(Role::Viewer)).expect("pair");
        let other = AuthConfig::new(SecretString::from("other-secret"));
        assert!(decode_token(&other, &pair.access, TOKEN_TYPE_ACCESS).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        let config = config();
        assert!(decode_token(&config, "not.a.jwt", TOKEN_TYPE_ACCESS).is_err());
        assert!(decode_token(&config, "", TOKEN_TYPE_ACCESS).is_err());
    }

    #[test]
    fn absent_role_encodes_as_empty_string() {
        let config = config();
        let pair = issue_token_pair(&config, Uuid::new_v4(), "a@x.com", None).expect("pair");
        let claims = decode_token(&config, &pair.access, TOKEN_TYPE_ACCESS).expect("claims");
        assert_eq!(claims.role, "");
    }
}
