//! Database helpers for accounts, credentials, and MFA state.
//!
//! MFA transitions and backup-code consumption are single conditional UPDATE
//! statements so concurrent requests cannot double-apply them.

use anyhow::{Context, Result};
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::Instrument;
use uuid::Uuid;

use super::types::ProfileSummary;
use super::utils::is_unique_violation;

const USER_COLUMNS: &str = r#"
    id, email, password_hash, first_name, last_name, phone, role,
    is_verified, is_active, is_superuser, mfa_enabled, mfa_secret,
    to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at,
    to_char(updated_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS updated_at
"#;

#[derive(Debug, Clone)]
pub(crate) struct UserRecord {
    pub(crate) id: Uuid,
    pub(crate) email: String,
    pub(crate) password_hash: String,
    pub(crate) first_name: String,
    pub(crate) last_name: String,
    pub(crate) phone: Option<String>,
    pub(crate) role: String,
    pub(crate) is_verified: bool,
    pub(crate) is_active: bool,
    pub(crate) is_superuser: bool,
    pub(crate) mfa_enabled: bool,
    pub(crate) mfa_secret: Option<String>,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

/// Outcome when attempting to create a new user.
#[derive(Debug)]
pub(super) enum SignupOutcome {
    Created(Box<UserRecord>),
    DuplicateEmail,
}

pub(super) struct NewUser<'a> {
    pub(super) email: &'a str,
    pub(super) password_hash: &'a str,
    pub(super) first_name: &'a str,
    pub(super) last_name: &'a str,
    pub(super) phone: Option<&'a str>,
    pub(super) role: &'a str,
}

fn map_user(row: &PgRow) -> UserRecord {
    UserRecord {
        id: row.get("id"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        phone: row.get("phone"),
        role: row.get("role"),
        is_verified: row.get("is_verified"),
        is_active: row.get("is_active"),
        is_superuser: row.get("is_superuser"),
        mfa_enabled: row.get("mfa_enabled"),
        mfa_secret: row.get("mfa_secret"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

pub(super) async fn insert_user(pool: &PgPool, new: &NewUser<'_>) -> Result<SignupOutcome> {
    let query = format!(
        r"
        INSERT INTO users (email, password_hash, first_name, last_name, phone, role)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {USER_COLUMNS}
    "
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(new.email)
        .bind(new.password_hash)
        .bind(new.first_name)
        .bind(new.last_name)
        .bind(new.phone)
        .bind(new.role)
        .fetch_one(pool)
        .instrument(span)
        .await;

    match row {
        Ok(row) => Ok(SignupOutcome::Created(Box::new(map_user(&row)))),
        Err(err) if is_unique_violation(&err) => Ok(SignupOutcome::DuplicateEmail),
        Err(err) => Err(err).context("failed to insert user"),
    }
}

pub(super) async fn lookup_user_by_email(
    pool: &PgPool,
    email: &str,
) -> Result<Option<UserRecord>> {
    let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1 LIMIT 1");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user by email")?;
    Ok(row.as_ref().map(map_user))
}

pub(crate) async fn lookup_user_by_id(pool: &PgPool, user_id: Uuid) -> Result<Option<UserRecord>> {
    let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 LIMIT 1");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(user_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user by id")?;
    Ok(row.as_ref().map(map_user))
}

/// Record a successful login (source IP for audit).
pub(super) async fn record_login(pool: &PgPool, user_id: Uuid, ip: Option<&str>) -> Result<()> {
    let query = "UPDATE users SET last_login_ip = $2, updated_at = NOW() WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(ip)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to record login")?;
    Ok(())
}

pub(super) async fn update_password(pool: &PgPool, user_id: Uuid, hash: &str) -> Result<()> {
    let query = "UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to update password")?;
    Ok(())
}

/// Allow-listed self-service profile updates.
pub(crate) async fn update_profile_fields(
    pool: &PgPool,
    user_id: Uuid,
    first_name: Option<&str>,
    last_name: Option<&str>,
    phone: Option<&str>,
) -> Result<Option<UserRecord>> {
    let query = format!(
        r"
        UPDATE users
        SET first_name = COALESCE($2, first_name),
            last_name = COALESCE($3, last_name),
            phone = COALESCE($4, phone),
            updated_at = NOW()
        WHERE id = $1
        RETURNING {USER_COLUMNS}
    "
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(user_id)
        .bind(first_name)
        .bind(last_name)
        .bind(phone)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to update profile fields")?;
    Ok(row.as_ref().map(map_user))
}

/// Store a pending MFA secret and fresh backup-code digests.
///
/// Guarded by `mfa_enabled = FALSE`: setup is rejected once MFA is on, and a
/// repeated pending setup simply overwrites the previous pending secret.
pub(super) async fn set_mfa_pending(
    pool: &PgPool,
    user_id: Uuid,
    secret: &str,
    code_hashes: &[String],
) -> Result<bool> {
    let query = r"
        UPDATE users
        SET mfa_secret = $2, backup_codes = $3, updated_at = NOW()
        WHERE id = $1 AND mfa_enabled = FALSE
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(user_id)
        .bind(secret)
        .bind(code_hashes)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to store pending MFA secret")?;
    Ok(result.rows_affected() > 0)
}

/// Flip the enabled flag after a first successful verification of the pending
/// secret. The guard makes concurrent verifies enable at most once.
pub(super) async fn enable_mfa(pool: &PgPool, user_id: Uuid) -> Result<bool> {
    let query = r"
        UPDATE users
        SET mfa_enabled = TRUE, updated_at = NOW()
        WHERE id = $1 AND mfa_enabled = FALSE AND mfa_secret IS NOT NULL
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(user_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to enable MFA")?;
    Ok(result.rows_affected() > 0)
}

/// Clear secret, backup codes, and the flag in one statement.
pub(super) async fn disable_mfa(pool: &PgPool, user_id: Uuid) -> Result<bool> {
    let query = r"
        UPDATE users
        SET mfa_enabled = FALSE, mfa_secret = NULL, backup_codes = '{}', updated_at = NOW()
        WHERE id = $1 AND mfa_enabled = TRUE
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(user_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to disable MFA")?;
    Ok(result.rows_affected() > 0)
}

/// Remove one backup-code digest if present. The `= ANY(...)` guard makes
/// consumption atomic: false means the code was absent and nothing changed.
pub(super) async fn consume_backup_code(
    pool: &PgPool,
    user_id: Uuid,
    code_hash: &str,
) -> Result<bool> {
    let query = r"
        UPDATE users
        SET backup_codes = array_remove(backup_codes, $2), updated_at = NOW()
        WHERE id = $1 AND $2 = ANY(backup_codes)
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(user_id)
        .bind(code_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to consume backup code")?;
    Ok(result.rows_affected() > 0)
}

/// Create or refresh the user's portfolio profile row. Called explicitly on
/// login; there are no implicit side effects elsewhere.
pub(super) async fn ensure_profile(pool: &PgPool, user: &UserRecord) -> Result<ProfileSummary> {
    let full_name = format!("{} {}", user.first_name, user.last_name)
        .trim()
        .to_string();
    let query = r"
        INSERT INTO profiles (user_id, email, full_name)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id)
        DO UPDATE SET email = EXCLUDED.email, full_name = EXCLUDED.full_name
        RETURNING user_id::text AS user_id, email, full_name, headline
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user.id)
        .bind(&user.email)
        .bind(&full_name)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to ensure profile")?;
    Ok(ProfileSummary {
        user_id: row.get("user_id"),
        email: row.get("email"),
        full_name: row.get("full_name"),
        headline: row.get("headline"),
    })
}

#[cfg(test)]
mod tests {
    use super::{NewUser, SignupOutcome, UserRecord};
    use uuid::Uuid;

    fn sample_user() -> UserRecord {
        UserRecord {
            id: Uuid::nil(),
            email: "a@x.com".to_string(),
            password_hash: "$argon2id$...".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            phone: None,
            role: "viewer".to_string(),
            is_verified: false,
            is_active: true,
            is_superuser: false,
            mfa_enabled: false,
            mfa_secret: None,
            created_at: "2026-01-01T00:00:00Z".to_string(),
            updated_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn signup_outcome_debug_names() {
        let created = SignupOutcome::Created(Box::new(sample_user()));
        assert!(format!("{created:?}").starts_with("Created"));
        assert_eq!(
            format!("{:?}", SignupOutcome::DuplicateEmail),
            "DuplicateEmail"
        );
    }

    #[test]
    fn new_user_holds_bindings() {
        let new = NewUser {
            email: "a@x.com",
            password_hash: "hash",
            first_name: "Ada",
            last_name: "Lovelace",
            phone: Some("+15551234567"),
            role: "viewer",
        };
        assert_eq!(new.role, "viewer");
        assert_eq!(new.phone, Some("+15551234567"));
    }
}
