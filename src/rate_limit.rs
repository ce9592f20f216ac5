//! Rate limiting for verification code endpoints.
//!
//! Limits are keyed by the normalised e-mail address, so guessing codes for
//! one account is bounded no matter how many clients take part.

use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::{num::NonZeroU32, sync::Arc};

/// Per-address rate limiter.
pub type EmailLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Rate limiting configuration for code issuance and submission.
#[derive(Clone)]
pub struct RateLimitConfig {
    /// Issuing codes (register, login): 3 per minute per address
    pub code_issue: Arc<EmailLimiter>,
    /// Submitting codes (verify_register, verify_login): 5 per minute per address
    pub code_verify: Arc<EmailLimiter>,
}

const CODE_ISSUE_PER_MIN: u32 = 3;
const CODE_VERIFY_PER_MIN: u32 = 5;
const PERMISSIVE_PER_SEC: u32 = 1000;

impl RateLimitConfig {
    /// Create rate limiters with production limits.
    pub fn new() -> Self {
        Self {
            code_issue: Arc::new(RateLimiter::keyed(Quota::per_minute(nonzero(
                CODE_ISSUE_PER_MIN,
            )))),
            code_verify: Arc::new(RateLimiter::keyed(Quota::per_minute(nonzero(
                CODE_VERIFY_PER_MIN,
            )))),
        }
    }

    /// Limits high enough never to trigger in tests.
    pub fn permissive() -> Self {
        Self::with_quota(Quota::per_second(nonzero(PERMISSIVE_PER_SEC)))
    }

    fn with_quota(quota: Quota) -> Self {
        Self {
            code_issue: Arc::new(RateLimiter::keyed(quota)),
            code_verify: Arc::new(RateLimiter::keyed(quota)),
        }
    }

    /// Whether another code may be issued for `email`.
    pub fn allow_issue(&self, email: &str) -> bool {
        self.code_issue.check_key(&email.to_lowercase()).is_ok()
    }

    /// Whether another code may be submitted for `email`.
    pub fn allow_verify(&self, email: &str) -> bool {
        self.code_verify.check_key(&email.to_lowercase()).is_ok()
    }

    /// Forget addresses whose quota has fully replenished.
    ///
    /// Every address ever submitted gets an entry, so this has to run
    /// periodically to keep the maps bounded.
    pub fn retain_recent(&self) {
        for limiter in [&self.code_issue, &self.code_verify] {
            limiter.retain_recent();
            limiter.shrink_to_fit();
        }
    }

    /// Number of addresses currently tracked across both limiters.
    pub fn tracked_addresses(&self) -> usize {
        self.code_issue.len() + self.code_verify.len()
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn nonzero(n: u32) -> NonZeroU32 {
    NonZeroU32::new(n).unwrap_or(NonZeroU32::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_issue_limit_per_address() {
        let limits = RateLimitConfig::new();

        for _ in 0..CODE_ISSUE_PER_MIN {
            assert!(limits.allow_issue("alice@example.com"));
        }
        assert!(!limits.allow_issue("alice@example.com"));
        // Case-insensitive key
        assert!(!limits.allow_issue("ALICE@example.com"));
        // Other addresses are unaffected
        assert!(limits.allow_issue("bob@example.com"));
    }

    #[test]
    fn test_verify_limit_per_address() {
        let limits = RateLimitConfig::new();

        for _ in 0..CODE_VERIFY_PER_MIN {
            assert!(limits.allow_verify("alice@example.com"));
        }
        assert!(!limits.allow_verify("alice@example.com"));
    }

    #[test]
    fn test_permissive_allows_bursts() {
        let limits = RateLimitConfig::permissive();
        for _ in 0..100 {
            assert!(limits.allow_verify("alice@example.com"));
        }
    }

    #[test]
    fn test_retain_recent_forgets_replenished_addresses() {
        let limits =
            RateLimitConfig::with_quota(Quota::with_period(Duration::from_millis(200)).unwrap());

        for i in 0..50 {
            let email = format!("user{}@example.com", i);
            assert!(limits.allow_issue(&email));
            assert!(limits.allow_verify(&email));
        }
        assert_eq!(limits.tracked_addresses(), 100);

        // Still inside the window: nothing is dropped
        limits.retain_recent();
        assert!(limits.tracked_addresses() > 0);

        std::thread::sleep(Duration::from_millis(400));
        limits.retain_recent();
        assert_eq!(limits.tracked_addresses(), 0);

        // A forgotten address starts over with a full quota
        assert!(limits.allow_issue("user0@example.com"));
    }
}
