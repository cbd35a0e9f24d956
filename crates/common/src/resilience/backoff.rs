//! Exponential backoff with multiplicative jitter.
//!
//! `delay = min(initial * multiplier^attempt, max)`, then scaled by
//! `1 + U(-jitter, +jitter)` and clamped to at least one millisecond.
//!
//! Jitter samples come from a thread-local [`SmallRng`], which is not a
//! CSPRNG. Request ids use the OS generator instead (see [`crate::ids`]).

use std::cell::RefCell;
use std::time::Duration;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Floor applied to every computed delay to avoid busy retry loops.
pub const MIN_DELAY: Duration = Duration::from_millis(1);

thread_local! {
    static JITTER_RNG: RefCell<SmallRng> = RefCell::new(SmallRng::from_entropy());
}

/// Timing parameters for retry backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    /// Delay before the first retry (attempt 0)
    pub initial: Duration,
    /// Upper bound applied before jitter
    pub max: Duration,
    /// Growth factor per attempt
    pub multiplier: f64,
    /// Jitter fraction in `[0, 1]`
    pub jitter: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(200),
            max: Duration::from_secs(2),
            multiplier: 2.0,
            jitter: 0.2,
        }
    }
}

impl BackoffPolicy {
    /// Policy with explicit interval, growth and jitter settings.
    pub fn new(initial: Duration, max: Duration, multiplier: f64, jitter: f64) -> Self {
        Self { initial, max, multiplier, jitter }
    }

    /// Capped exponential delay for `attempt` (0-based), before jitter.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.initial.as_secs_f64() * self.multiplier.powi(exponent);
        let max_secs = self.max.as_secs_f64();
        if !secs.is_finite() || secs >= max_secs {
            return self.max;
        }
        Duration::from_secs_f64(secs.max(0.0))
    }

    /// Jittered delay for `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let sample = if self.jitter > 0.0 {
            JITTER_RNG.with(|rng| rng.borrow_mut().gen_range(-1.0..=1.0))
        } else {
            0.0
        };
        self.delay_with_sample(attempt, sample)
    }

    /// Delay to wait before retrying a response that may carry a
    /// `Retry-After` hint: the larger of the backoff and the hint.
    pub fn retry_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let backoff = self.delay(attempt);
        match retry_after {
            Some(hint) if hint > backoff => hint,
            _ => backoff,
        }
    }

    /// `sample` is a uniform draw from `[-1, 1]`.
    fn delay_with_sample(&self, attempt: u32, sample: f64) -> Duration {
        let base = self.base_delay(attempt);
        let jitter = self.jitter.clamp(0.0, 1.0);
        let factor = (1.0 + sample.clamp(-1.0, 1.0) * jitter).max(0.0);
        // Jitter above a near-`Duration::MAX` cap does not fit; fall back to the cap.
        Duration::try_from_secs_f64(factor * base.as_secs_f64())
            .unwrap_or(self.max)
            .max(MIN_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter() -> BackoffPolicy {
        BackoffPolicy::new(Duration::from_millis(100), Duration::from_secs(1), 2.0, 0.0)
    }

    #[test]
    fn grows_exponentially_until_cap() {
        let policy = no_jitter();
        assert_eq!(policy.delay(0), Duration::from_millis(100));
        assert_eq!(policy.delay(1), Duration::from_millis(200));
        assert_eq!(policy.delay(2), Duration::from_millis(400));
        assert_eq!(policy.delay(3), Duration::from_millis(800));
        assert_eq!(policy.delay(4), Duration::from_secs(1));
        assert_eq!(policy.delay(40), Duration::from_secs(1));
    }

    #[test]
    fn huge_attempt_numbers_saturate_at_max() {
        let policy = no_jitter();
        assert_eq!(policy.base_delay(u32::MAX), Duration::from_secs(1));
    }

    #[test]
    fn jitter_stays_within_fraction() {
        let policy =
            BackoffPolicy::new(Duration::from_millis(1000), Duration::from_secs(10), 1.0, 0.25);
        for _ in 0..500 {
            let delay = policy.delay(0);
            assert!(delay >= Duration::from_millis(750), "{delay:?} below lower bound");
            assert!(delay <= Duration::from_millis(1250), "{delay:?} above upper bound");
        }
    }

    #[test]
    fn jitter_extremes_map_to_bounds() {
        let policy =
            BackoffPolicy::new(Duration::from_millis(1000), Duration::from_secs(10), 1.0, 0.5);
        assert_eq!(policy.delay_with_sample(0, -1.0), Duration::from_millis(500));
        assert_eq!(policy.delay_with_sample(0, 1.0), Duration::from_millis(1500));
    }

    #[test]
    fn clamps_to_one_millisecond() {
        let policy = BackoffPolicy::new(Duration::ZERO, Duration::ZERO, 2.0, 0.0);
        assert_eq!(policy.delay(0), MIN_DELAY);

        let full_jitter =
            BackoffPolicy::new(Duration::from_millis(10), Duration::from_millis(10), 1.0, 1.0);
        assert_eq!(full_jitter.delay_with_sample(0, -1.0), MIN_DELAY);
    }

    #[test]
    fn oversized_cap_with_jitter_does_not_overflow() {
        let policy = BackoffPolicy::new(Duration::from_secs(1), Duration::MAX, 2.0, 0.5);
        assert_eq!(policy.delay_with_sample(80, 1.0), Duration::MAX);
        assert!(policy.delay(80) >= Duration::from_secs(u64::MAX / 4));
    }

    #[test]
    fn retry_after_wins_when_longer() {
        let policy = no_jitter();
        assert_eq!(
            policy.retry_delay(0, Some(Duration::from_secs(30))),
            Duration::from_secs(30)
        );
        assert_eq!(
            policy.retry_delay(2, Some(Duration::from_millis(10))),
            Duration::from_millis(400)
        );
        assert_eq!(policy.retry_delay(1, None), Duration::from_millis(200));
    }
}
