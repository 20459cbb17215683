//! Request/response types for auth endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::storage::UserRecord;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    /// Six-digit TOTP code or a `XXXX-XXXX-XXXX` backup code.
    pub mfa_token: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UserSummary {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: String,
    pub is_verified: bool,
    pub is_active: bool,
    pub mfa_enabled: bool,
    pub created_at: String,
}

impl From<&UserRecord> for UserSummary {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id.to_string(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            phone: user.phone.clone(),
            role: user.role.clone(),
            is_verified: user.is_verified,
            is_active: user.is_active,
            mfa_enabled: user.mfa_enabled,
            created_at: user.created_at.clone(),
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ProfileSummary {
    pub user_id: String,
    pub email: String,
    pub full_name: String,
    pub headline: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct AuthResponse {
    pub user: UserSummary,
    pub tokens: TokenPair,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    pub user: UserSummary,
    pub profile: ProfileSummary,
    pub tokens: TokenPair,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct TokenRefreshRequest {
    pub refresh: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct TokenRefreshResponse {
    pub access: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct PasswordChangeRequest {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MfaSetupResponse {
    pub secret: String,
    pub otpauth_url: String,
    /// `data:image/png;base64,...` QR for authenticator enrollment.
    pub qr_code: String,
    /// Raw one-time backup codes; shown here once and never again.
    pub backup_codes: Vec<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MfaVerifyRequest {
    pub token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MfaDisableRequest {
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ProfileUpdateRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MessageResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};

    #[test]
    fn login_request_accepts_missing_mfa_token() -> Result<()> {
        let decoded: LoginRequest =
            serde_json::from_str(r#"{"email":"a@x.com","password":"pw"}"#)?;
        assert_eq!(decoded.email, "a@x.com");
        assert!(decoded.mfa_token.is_none());
        Ok(())
    }

    #[test]
    fn mfa_setup_response_serializes_backup_codes() -> Result<()> {
        let response = MfaSetupResponse {
            secret: "BASE32SECRET".to_string(),
            otpauth_url: "otpauth://totp/x".to_string(),
            qr_code: "data:image/png;base64,xx".to_string(),
            backup_codes: vec!["AAAA-BBBB-CCCC".to_string()],
        };
        let value = serde_json::to_value(&response)?;
        let codes = value
            .get("backup_codes")
            .and_then(serde_json::Value::as_array)
            .context("missing backup_codes")?;
        assert_eq!(codes.len(), 1);
        Ok(())
    }
}
