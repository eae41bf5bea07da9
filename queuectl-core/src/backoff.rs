//! Pure backoff policy: `attempts -> delay`.
//!
//! Adapted from `hook_common::retry::RetryPolicy::time_until_next_retry`, stripped of the
//! teacher's `preferred_retry_interval`/`maximum_interval` knobs (this spec has no `Retry-After`
//! header and no ceiling) down to the bare `base ^ attempts` the spec calls for.

use std::time::Duration;

/// `delay_seconds = base ^ attempts`, where `attempts` is the 1-based count of the attempt that
/// just failed.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    base: u32,
}

impl BackoffPolicy {
    pub fn new(base: u32) -> Self {
        Self { base }
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    /// Delay until a job that just failed on its `attempts`-th try becomes eligible again.
    pub fn delay(&self, attempts: i64) -> Duration {
        let exponent = attempts.max(0) as u32;
        Duration::from_secs(u64::from(self.base).saturating_pow(exponent))
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self { base: 2 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_spec_example_with_base_two() {
        let policy = BackoffPolicy::new(2);
        assert_eq!(policy.delay(1), Duration::from_secs(2));
        assert_eq!(policy.delay(2), Duration::from_secs(4));
        assert_eq!(policy.delay(3), Duration::from_secs(8));
    }

    #[test]
    fn monotonically_increasing_for_base_greater_than_one() {
        let policy = BackoffPolicy::new(3);
        for attempts in 1..10 {
            assert!(policy.delay(attempts + 1) > policy.delay(attempts));
        }
    }

    #[test]
    fn base_one_is_accepted_and_constant() {
        // Open question resolved in DESIGN.md: base=1 is accepted, not rejected.
        let policy = BackoffPolicy::new(1);
        assert_eq!(policy.delay(1), Duration::from_secs(1));
        assert_eq!(policy.delay(5), Duration::from_secs(1));
    }
}
