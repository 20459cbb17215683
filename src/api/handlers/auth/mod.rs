//! Auth handlers and supporting modules.
//!
//! This module coordinates credentials, the MFA lifecycle, role policy, and
//! bearer-token issuance.
//!
//! ## Rate Limiting
//!
//! Register and login are limited per source IP (default 10 attempts per
//! hour) with a fixed window. The decision is made before credentials are
//! checked, so a limited caller gets 429 regardless of correctness.
//!
//! ## MFA
//!
//! TOTP secrets and backup-code digests are stored on the user row; every
//! state transition is a single conditional UPDATE so concurrent requests
//! cannot double-enable, double-disable, or replay a backup code.

pub(crate) mod login;
pub(crate) mod mfa;
pub(crate) mod password;
pub(crate) mod principal;
mod rate_limit;
pub(crate) mod register;
pub(crate) mod role;
mod state;
pub(crate) mod storage;
pub(crate) mod token;
pub(crate) mod types;
pub(crate) mod utils;

pub use rate_limit::{FixedWindowRateLimiter, NoopRateLimiter, RateLimiter};
pub use role::Role;
pub use state::{AuthConfig, AuthState};
