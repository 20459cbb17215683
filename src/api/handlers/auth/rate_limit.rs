//! Rate limiting primitives for auth flows.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RateLimitAction {
    Register,
    Login,
}

impl RateLimitAction {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::Login => "login",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited,
}

pub trait RateLimiter: Send + Sync {
    fn check_ip(&self, ip: Option<&str>, action: RateLimitAction) -> RateLimitDecision;
}

#[derive(Clone, Debug)]
pub struct NoopRateLimiter;

impl RateLimiter for NoopRateLimiter {
    fn check_ip(&self, _ip: Option<&str>, _action: RateLimitAction) -> RateLimitDecision {
        RateLimitDecision::Allowed
    }
}

/// Fixed-window in-memory limiter keyed by `(ip, action)`.
///
/// The first request in a window starts it; the decision does not depend on
/// whether the attempt later succeeds. Requests without a resolvable client
/// IP are allowed (nothing to key on).
#[derive(Debug)]
pub struct FixedWindowRateLimiter {
    max_attempts: u32,
    window: Duration,
    windows: Mutex<HashMap<String, (Instant, u32)>>,
}

impl FixedWindowRateLimiter {
    #[must_use]
    pub fn new(max_attempts: u32, window: Duration) -> Self {
        Self {
            max_attempts,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    fn check_at(&self, key: String, now: Instant) -> RateLimitDecision {
        let Ok(mut windows) = self.windows.lock() else {
            // Poisoned lock: fail open, auth still checks credentials.
            return RateLimitDecision::Allowed;
        };

        windows.retain(|_, (started, _)| now.duration_since(*started) < self.window);

        let (started, count) = windows.entry(key).or_insert((now, 0));
        if now.duration_since(*started) >= self.window {
            *started = now;
            *count = 0;
        }

        if *count >= self.max_attempts {
            return RateLimitDecision::Limited;
        }
        *count += 1;
        RateLimitDecision::Allowed
    }
}

impl RateLimiter for FixedWindowRateLimiter {
    fn check_ip(&self, ip: Option<&str>, action: RateLimitAction) -> RateLimitDecision {
        let Some(ip) = ip else {
            return RateLimitDecision::Allowed;
        };
        self.check_at(format!("{}:{ip}", action.as_str()), Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_rate_limiter_allows() {
        let limiter = NoopRateLimiter;
        assert_eq!(
            limiter.check_ip(None, RateLimitAction::Register),
            RateLimitDecision::Allowed
        );
        assert_eq!(
            limiter.check_ip(Some("1.2.3.4"), RateLimitAction::Login),
            RateLimitDecision::Allowed
        );
    }

    #[test]
    fn fixed_window_limits_after_max_attempts() {
        let limiter = FixedWindowRateLimiter::new(3, Duration::from_secs(3600));
        for _ in 0..3 {
            assert_eq!(
                limiter.check_ip(Some("1.2.3.4"), RateLimitAction::Login),
                RateLimitDecision::Allowed
            );
        }
        assert_eq!(
            limiter.check_ip(Some("1.2.3.4"), RateLimitAction::Login),
            RateLimitDecision::Limited
        );
    }

    #[test]
    fn windows_are_keyed_per_ip_and_action() {
        let limiter = FixedWindowRateLimiter::new(1, Duration::from_secs(3600));
        assert_eq!(
            limiter.check_ip(Some("1.2.3.4"), RateLimitAction::Login),
            RateLimitDecision::Allowed
        );
        // Different IP and different action are independent windows.
        assert_eq!(
            limiter.check_ip(Some("5.6.7.8"), RateLimitAction::Login),
            RateLimitDecision::Allowed
        );
        assert_eq!(
            limiter.check_ip(Some("1.2.3.4"), RateLimitAction::Register),
            RateLimitDecision::Allowed
        );
        assert_eq!(
            limiter.check_ip(Some("1.2.3.4"), RateLimitAction::Login),
            RateLimitDecision::Limited
        );
    }

    #[test]
    fn window_expiry_resets_the_count() {
        let limiter = FixedWindowRateLimiter::new(1, Duration::from_secs(60));
        let start = Instant::now();
        assert_eq!(
            limiter.check_at("login:1.2.3.4".to_string(), start),
            RateLimitDecision::Allowed
        );
        assert_eq!(
            limiter.check_at("login:1.2.3.4".to_string(), start),
            RateLimitDecision::Limited
        );
        let later = start + Duration::from_secs(61);
        assert_eq!(
            limiter.check_at("login:1.2.3.4".to_string(), later),
            RateLimitDecision::Allowed
        );
    }

    #[test]
    fn missing_ip_is_allowed() {
        let limiter = FixedWindowRateLimiter::new(0, Duration::from_secs(60));
        assert_eq!(
            limiter.check_ip(None, RateLimitAction::Login),
            RateLimitDecision::Allowed
        );
    }
}
