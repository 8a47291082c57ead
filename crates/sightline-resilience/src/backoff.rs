// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Exponential backoff and retry policy.

use std::time::Duration;

use sightline_config::model::RetryPolicyConfig;

/// Delay before retry number `attempt` (1-indexed): `base * 2^(attempt - 1)`.
///
/// Saturates instead of overflowing for large attempt numbers.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(31);
    base.saturating_mul(1u32 << exponent)
}

/// How many times to try, how long to wait, and what to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Deadline for one attempt. Expiry counts as a retriable failure.
    pub attempt_timeout: Option<Duration>,
    /// Retry every failure instead of only transient ones.
    pub retry_all_errors: bool,
}

impl RetryPolicy {
    pub fn step() -> Self {
        Self::from(&RetryPolicyConfig::default())
    }

    pub fn agent() -> Self {
        Self {
            base_delay: Duration::from_millis(2000),
            ..Self::step()
        }
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        backoff_delay(self.base_delay, attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::step()
    }
}

impl From<&RetryPolicyConfig> for RetryPolicy {
    fn from(config: &RetryPolicyConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            attempt_timeout: config.attempt_timeout_secs.map(Duration::from_secs),
            retry_all_errors: config.retry_all_errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn doubles_from_base() {
        let base = Duration::from_millis(1000);
        let delays: Vec<u128> = (1..=4).map(|n| backoff_delay(base, n).as_millis()).collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000]);
    }

    #[test]
    fn huge_attempts_saturate() {
        let delay = backoff_delay(Duration::from_secs(u64::MAX / 2), 64);
        assert_eq!(delay, Duration::MAX);
    }

    #[test]
    fn config_conversion_keeps_values() {
        let config = RetryPolicyConfig {
            max_attempts: 5,
            base_delay_ms: 250,
            attempt_timeout_secs: Some(30),
            retry_all_errors: true,
        };
        let policy = RetryPolicy::from(&config);
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.base_delay, Duration::from_millis(250));
        assert_eq!(policy.attempt_timeout, Some(Duration::from_secs(30)));
        assert!(policy.retry_all_errors);
    }

    #[test]
    fn tier_defaults() {
        assert_eq!(RetryPolicy::step().max_attempts, 3);
        assert_eq!(RetryPolicy::step().base_delay, Duration::from_millis(1000));
        assert_eq!(RetryPolicy::agent().base_delay, Duration::from_millis(2000));
    }

    proptest! {
        #[test]
        fn delay_is_base_times_power_of_two(base_ms in 0u64..100_000, attempt in 1u32..20) {
            let delay = backoff_delay(Duration::from_millis(base_ms), attempt);
            prop_assert_eq!(delay.as_millis(), u128::from(base_ms) * (1u128 << (attempt - 1)));
        }

        #[test]
        fn delay_never_shrinks(base_ms in 1u64..10_000, attempt in 1u32..30) {
            let base = Duration::from_millis(base_ms);
            prop_assert!(backoff_delay(base, attempt + 1) >= backoff_delay(base, attempt));
        }
    }
}
