//! Backoff Calculator
//!
//! `delay = base_delay * backoff_factor^(attempt - 1)`, capped at `max_delay`.
//! With jitter enabled the capped delay moves by a uniform offset in
//! `[-25%, +25%]` and the result is clamped to `[0, max_delay]`.
//!
//! Attempt numbers start at 1; attempt 0 is treated like attempt 1 so DLQ
//! admissions with a zero retry count wait for `base_delay`.

use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::constants::{JITTER_RATIO, MAX_BACKOFF_EXPONENT};
use super::policy::RetryPolicy;

/// Delay before jitter for `attempt` under `policy`, capped at `max_delay`
pub fn capped_delay(attempt: u32, policy: &RetryPolicy) -> Duration {
    let exponent = attempt.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
    // exponent <= 30, fits in i32
    #[allow(clippy::cast_possible_wrap)]
    let multiplier = policy.backoff_factor().powi(exponent as i32);
    let max_secs = policy.max_delay().as_secs_f64();
    let secs = (policy.base_delay().as_secs_f64() * multiplier).min(max_secs);
    Duration::try_from_secs_f64(secs).unwrap_or_else(|_| policy.max_delay())
}

/// Compute the delay for `attempt`, drawing jitter from `rng`
pub fn compute_delay<R: Rng + ?Sized>(attempt: u32, policy: &RetryPolicy, rng: &mut R) -> Duration {
    let capped = capped_delay(attempt, policy);
    if !policy.jitter() || capped.is_zero() {
        return capped;
    }

    let capped_secs = capped.as_secs_f64();
    let offset = capped_secs * rng.gen_range(-JITTER_RATIO..=JITTER_RATIO);
    let jittered = (capped_secs + offset).clamp(0.0, policy.max_delay().as_secs_f64());
    Duration::try_from_secs_f64(jittered).unwrap_or(capped)
}

/// Stateful wrapper owning the random source used for jitter
///
/// Production code uses [`BackoffCalculator::new`]; tests seed it for
/// reproducible jitter.
#[derive(Debug)]
pub struct BackoffCalculator {
    rng: Mutex<StdRng>,
}

impl Default for BackoffCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl BackoffCalculator {
    pub fn new() -> Self {
        Self { rng: Mutex::new(StdRng::from_entropy()) }
    }

    /// Deterministic calculator for tests
    pub fn seeded(seed: u64) -> Self {
        Self { rng: Mutex::new(StdRng::seed_from_u64(seed)) }
    }

    pub fn delay(&self, attempt: u32, policy: &RetryPolicy) -> Duration {
        let mut rng = self.rng.lock();
        compute_delay(attempt, policy, &mut *rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(jitter: bool) -> RetryPolicy {
        RetryPolicy::builder()
            .base_delay(Duration::from_millis(100))
            .max_delay(Duration::from_secs(5))
            .backoff_factor(2.0)
            .jitter(jitter)
            .build()
            .unwrap()
    }

    #[test]
    fn test_exponential_growth_without_jitter() {
        let calc = BackoffCalculator::seeded(7);
        let p = policy(false);

        assert_eq!(calc.delay(1, &p), Duration::from_millis(100));
        assert_eq!(calc.delay(2, &p), Duration::from_millis(200));
        assert_eq!(calc.delay(3, &p), Duration::from_millis(400));
        assert_eq!(calc.delay(4, &p), Duration::from_millis(800));
    }

    #[test]
    fn test_attempt_zero_uses_base_delay() {
        let p = policy(false);
        assert_eq!(capped_delay(0, &p), Duration::from_millis(100));
    }

    /// Validates monotonic growth up to the cap, then a flat line at the cap.
    #[test]
    fn test_monotonic_until_capped() {
        let p = policy(false);
        let mut previous = Duration::ZERO;
        for attempt in 1..=40 {
            let delay = capped_delay(attempt, &p);
            assert!(delay >= previous, "attempt {attempt} shrank: {delay:?} < {previous:?}");
            if delay == p.max_delay() {
                for later in attempt..attempt + 5 {
                    assert_eq!(capped_delay(later, &p), p.max_delay());
                }
            }
            previous = delay;
        }
        assert_eq!(capped_delay(40, &p), Duration::from_secs(5));
    }

    /// Validates jitter stays within ±25% of the capped delay and never
    /// exceeds `max_delay`, for many seeds and attempts.
    #[test]
    fn test_jitter_bounds() {
        let p = policy(true);
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            for attempt in 1..=10 {
                let base = capped_delay(attempt, &p).as_secs_f64();
                let delay = compute_delay(attempt, &p, &mut rng).as_secs_f64();
                let lower = base * 0.75 - 1e-9;
                let upper = (base * 1.25).min(p.max_delay().as_secs_f64()) + 1e-9;
                assert!(delay >= lower && delay <= upper, "{delay} outside [{lower}, {upper}]");
            }
        }
    }

    #[test]
    fn test_seeded_calculators_agree() {
        let p = policy(true);
        let a = BackoffCalculator::seeded(42);
        let b = BackoffCalculator::seeded(42);
        for attempt in 1..=5 {
            assert_eq!(a.delay(attempt, &p), b.delay(attempt, &p));
        }
    }

    #[test]
    fn test_zero_base_delay_stays_zero() {
        let p = RetryPolicy::builder()
            .base_delay(Duration::ZERO)
            .max_delay(Duration::ZERO)
            .jitter(true)
            .build()
            .unwrap();
        assert_eq!(BackoffCalculator::new().delay(3, &p), Duration::ZERO);
    }

    #[test]
    fn test_huge_factor_saturates_at_max() {
        let p = RetryPolicy::builder()
            .base_delay(Duration::from_secs(1))
            .max_delay(Duration::from_secs(60))
            .backoff_factor(1e300)
            .jitter(false)
            .build()
            .unwrap();
        assert_eq!(capped_delay(30, &p), Duration::from_secs(60));
    }
}
