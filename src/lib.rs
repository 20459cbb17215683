//! # Folio (Portfolio Backend API)
//!
//! `folio` is the identity and access backend for a personal-portfolio web
//! application. It owns the security-relevant slice of the system: accounts,
//! multi-factor authentication, role-based authorization, bearer tokens, and
//! the user-activity audit trail.
//!
//! ## Accounts & Roles
//!
//! Email is the sole login identifier; passwords are stored as Argon2id
//! hashes. Roles form a total order (`super_admin` > `editor` > `viewer`) and
//! every privileged endpoint reduces to one of: public, any authenticated
//! user, editor-or-above, super-admin-only, or owner-or-admin.
//!
//! ## Multi-Factor Authentication
//!
//! MFA is TOTP-based (RFC 6238, 30-second steps, one step of allowed clock
//! skew). Setup stores a pending secret plus ten single-use backup codes;
//! the enabled flag is only set after the first successful verification of
//! the pending secret. Disabling clears the secret, the backup codes, and
//! the flag in a single atomic update.
//!
//! ## Tokens
//!
//! Successful authentication issues a JWT pair: a short-lived access token
//! and a longer-lived refresh token, both bound to the user id and role at
//! issuance. Tokens are bearer credentials; there is no server-side
//! revocation list, so logout is client-side token discard.
//!
//! ## Audit Trail
//!
//! Every state-changing or security-relevant operation appends a record to
//! an append-only activity log. The log is read-only through the API for
//! all callers, including admins.

pub mod api;
pub mod cli;
pub mod totp;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
