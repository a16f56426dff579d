//! Backoff schedule between upstream attempts.

use std::time::Duration;

/// Exponential backoff with a hard cap and no jitter.
///
/// The delay after attempt `n` (1-based) is `base * 2^(n-1)`, capped at
/// `cap`. Attempts run strictly in sequence, so the schedule never needs to
/// coordinate across tasks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetrySchedule {
    base: Duration,
    cap: Duration,
}

impl RetrySchedule {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self { base, cap }
    }

    /// Delay to sleep after the given 1-based attempt number failed.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let factor = 2u32.saturating_pow(exponent);
        self.base.saturating_mul(factor).min(self.cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_up_to_the_cap() {
        let schedule = RetrySchedule::new(Duration::from_millis(1000), Duration::from_millis(4000));
        assert_eq!(schedule.delay_after(1), Duration::from_millis(1000));
        assert_eq!(schedule.delay_after(2), Duration::from_millis(2000));
        assert_eq!(schedule.delay_after(3), Duration::from_millis(4000));
        assert_eq!(schedule.delay_after(4), Duration::from_millis(4000));
        assert_eq!(schedule.delay_after(10), Duration::from_millis(4000));
    }

    #[test]
    fn attempt_zero_is_treated_like_attempt_one() {
        let schedule = RetrySchedule::new(Duration::from_millis(1000), Duration::from_millis(4000));
        assert_eq!(schedule.delay_after(0), Duration::from_millis(1000));
    }

    #[test]
    fn custom_base_and_cap() {
        let schedule = RetrySchedule::new(Duration::from_millis(25), Duration::from_millis(100));
        assert_eq!(schedule.delay_after(1), Duration::from_millis(25));
        assert_eq!(schedule.delay_after(2), Duration::from_millis(50));
        assert_eq!(schedule.delay_after(3), Duration::from_millis(100));
        assert_eq!(schedule.delay_after(4), Duration::from_millis(100));
    }

    #[test]
    fn huge_attempt_numbers_do_not_overflow() {
        let schedule = RetrySchedule::new(Duration::from_secs(1), Duration::from_secs(4));
        assert_eq!(schedule.delay_after(u32::MAX), Duration::from_secs(4));
    }
}
