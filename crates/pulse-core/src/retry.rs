//! Reconnect backoff calculation.
//!
//! Portable, sync-only building blocks for the reconnecting client and the
//! upstream channel subscriber: a policy struct plus the delay math. The
//! async sleep/retry loops live in the crates that own a runtime.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default base delay before the first reconnect attempt.
pub const DEFAULT_BASE_DELAY_MS: u64 = 1_000;
/// Default cap on the reconnect delay.
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;
/// Default maximum consecutive failures before giving up (0 = retry forever).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Reconnection policy: doubling delay from a fixed base, capped, with a
/// bounded number of consecutive attempts.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ReconnectPolicy {
    /// Base delay in milliseconds for the first retry.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Maximum delay in milliseconds between retries.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Maximum consecutive failed attempts before giving up (0 = unbounded).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_base_delay_ms() -> u64 {
    DEFAULT_BASE_DELAY_MS
}
fn default_max_delay_ms() -> u64 {
    DEFAULT_MAX_DELAY_MS
}
fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl ReconnectPolicy {
    /// A policy that retries forever, used by the upstream channel
    /// subscriber, whose connectivity is an infra concern rather than a
    /// client-behavior one.
    #[must_use]
    pub fn unbounded() -> Self {
        Self {
            max_attempts: 0,
            ..Self::default()
        }
    }

    /// Delay before the retry following the given zero-based failure count.
    ///
    /// Formula: `min(max_delay, base_delay * 2^failures)`.
    #[must_use]
    pub fn delay_for(&self, failures: u32) -> Duration {
        let doubled = self
            .base_delay_ms
            .saturating_mul(1u64 << failures.min(31));
        Duration::from_millis(doubled.min(self.max_delay_ms))
    }

    /// Whether the given consecutive-failure count exhausts the policy.
    #[must_use]
    pub fn exhausted(&self, failures: u32) -> bool {
        self.max_attempts != 0 && failures >= self.max_attempts
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn first_delay_is_base() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_millis(1_000));
    }

    #[test]
    fn delay_doubles_until_cap() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(2_000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(4_000));
        assert_eq!(policy.delay_for(4), Duration::from_millis(16_000));
        assert_eq!(policy.delay_for(5), Duration::from_millis(30_000));
        assert_eq!(policy.delay_for(20), Duration::from_millis(30_000));
    }

    #[test]
    fn bounded_policy_exhausts() {
        let policy = ReconnectPolicy::default();
        assert!(!policy.exhausted(9));
        assert!(policy.exhausted(10));
        assert!(policy.exhausted(11));
    }

    #[test]
    fn unbounded_policy_never_exhausts() {
        let policy = ReconnectPolicy::unbounded();
        assert!(!policy.exhausted(u32::MAX));
    }

    #[test]
    fn huge_failure_count_does_not_overflow() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_millis(30_000));
    }

    proptest! {
        #[test]
        fn delay_never_exceeds_cap(failures in 0u32..64, base in 1u64..10_000, cap in 1u64..120_000) {
            let policy = ReconnectPolicy { base_delay_ms: base, max_delay_ms: cap, max_attempts: 0 };
            prop_assert!(policy.delay_for(failures) <= Duration::from_millis(cap));
        }

        #[test]
        fn delay_is_monotone_nondecreasing(failures in 0u32..63) {
            let policy = ReconnectPolicy::default();
            prop_assert!(policy.delay_for(failures) <= policy.delay_for(failures + 1));
        }
    }
}
