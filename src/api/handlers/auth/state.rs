//! Auth configuration and shared request state.

use secrecy::SecretString;
use std::sync::Arc;

use super::rate_limit::RateLimiter;
use crate::totp::TotpEngine;

const DEFAULT_TOTP_ISSUER: &str = "Folio Portfolio";
const DEFAULT_ACCESS_TTL_SECONDS: i64 = 30 * 60;
const DEFAULT_REFRESH_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
const DEFAULT_RATE_LIMIT_MAX_ATTEMPTS: u32 = 10;
const DEFAULT_RATE_LIMIT_WINDOW_SECONDS: u64 = 60 * 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    // SecretString keeps the signing secret out of Debug output.
    jwt_secret: SecretString,
    totp_issuer: String,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
    rate_limit_max_attempts: u32,
    rate_limit_window_seconds: u64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(jwt_secret: SecretString) -> Self {
        Self {
            jwt_secret,
            totp_issuer: DEFAULT_TOTP_ISSUER.to_string(),
            access_ttl_seconds: DEFAULT_ACCESS_TTL_SECONDS,
            refresh_ttl_seconds: DEFAULT_REFRESH_TTL_SECONDS,
            rate_limit_max_attempts: DEFAULT_RATE_LIMIT_MAX_ATTEMPTS,
            rate_limit_window_seconds: DEFAULT_RATE_LIMIT_WINDOW_SECONDS,
        }
    }

    #[must_use]
    pub fn with_totp_issuer(mut self, issuer: String) -> Self {
        self.totp_issuer = issuer;
        self
    }

    #[must_use]
    pub fn with_access_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_rate_limit_max_attempts(mut self, attempts: u32) -> Self {
        self.rate_limit_max_attempts = attempts;
        self
    }

    #[must_use]
    pub fn with_rate_limit_window_seconds(mut self, seconds: u64) -> Self {
        self.rate_limit_window_seconds = seconds;
        self
    }

    #[must_use]
    pub fn totp_issuer(&self) -> &str {
        &self.totp_issuer
    }

    #[must_use]
    pub fn rate_limit_max_attempts(&self) -> u32 {
        self.rate_limit_max_attempts
    }

    #[must_use]
    pub fn rate_limit_window_seconds(&self) -> u64 {
        self.rate_limit_window_seconds
    }

    pub(super) fn jwt_secret(&self) -> &SecretString {
        &self.jwt_secret
    }

    pub(super) fn access_ttl_seconds(&self) -> i64 {
        self.access_ttl_seconds
    }

    pub(super) fn refresh_ttl_seconds(&self) -> i64 {
        self.refresh_ttl_seconds
    }
}

pub struct AuthState {
    config: AuthConfig,
    totp: TotpEngine,
    rate_limiter: Arc<dyn RateLimiter>,
}

impl AuthState {
    #[must_use]
    pub fn new(config: AuthConfig, rate_limiter: Arc<dyn RateLimiter>) -> Self {
        let totp = TotpEngine::new(config.totp_issuer().to_string());
        Self {
            config,
            totp,
            rate_limiter,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub(crate) fn totp(&self) -> &TotpEngine {
        &self.totp
    }

    pub(super) fn rate_limiter(&self) -> &dyn RateLimiter {
        self.rate_limiter.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::super::rate_limit::{NoopRateLimiter, RateLimitAction, RateLimitDecision};
    use super::{AuthConfig, AuthState};
    use secrecy::SecretString;
    use std::sync::Arc;

    #[test]
    fn auth_config_defaults_and_overrides() {
        let config = AuthConfig::new(SecretString::from("sekret"));

        assert_eq!(config.totp_issuer(), super::DEFAULT_TOTP_ISSUER);
        assert_eq!(
            config.access_ttl_seconds(),
            super::DEFAULT_ACCESS_TTL_SECONDS
        );
        assert_eq!(
            config.refresh_ttl_seconds(),
            super::DEFAULT_REFRESH_TTL_SECONDS
        );
        assert_eq!(
            config.rate_limit_max_attempts(),
            super::DEFAULT_RATE_LIMIT_MAX_ATTEMPTS
        );

        let config = config
            .with_totp_issuer("Test Issuer".to_string())
            .with_access_ttl_seconds(60)
            .with_refresh_ttl_seconds(120)
            .with_rate_limit_max_attempts(2)
            .with_rate_limit_window_seconds(30);

        assert_eq!(config.totp_issuer(), "Test Issuer");
        assert_eq!(config.access_ttl_seconds(), 60);
        assert_eq!(config.refresh_ttl_seconds(), 120);
        assert_eq!(config.rate_limit_max_attempts(), 2);
        assert_eq!(config.rate_limit_window_seconds(), 30);
    }

    #[test]
    fn debug_output_masks_the_secret() {
        let config = AuthConfig::new(SecretString::from("super-secret-value"));
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret-value"));
    }

    #[test]
    fn auth_state_wires_totp_issuer_and_limiter() {
        let config =
            AuthConfig::new(SecretString::from("sekret")).with_totp_issuer("Folio".to_string());
        let state = AuthState::new(config, Arc::new(NoopRateLimiter));
        assert_eq!(state.totp().issuer(), "Folio");
        assert_eq!(
            state
                .rate_limiter()
                .check_ip(Some("1.2.3.4"), RateLimitAction::Login),
            RateLimitDecision::Allowed
        );
    }
}
