//! Retry backoff. Ported from the exponential/linear shapes the teacher
//! uses for its own retry scheduling, with one addition: ±20% jitter on
//! every computed delay, since jobs here are retried by many concurrent
//! workers and synchronized retries would thunder back onto the claim
//! transaction at the same instant.

use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub enum BackoffStrategy {
    Exponential { initial: Duration, max: Duration },
    Linear { initial: Duration, max: Duration },
}

impl BackoffStrategy {
    #[must_use]
    pub fn delay_for_attempt(self, attempt: u32) -> Duration {
        let base = match self {
            Self::Exponential { initial, max } => exponential(initial, max, attempt),
            Self::Linear { initial, max } => linear(initial, max, attempt),
        };
        with_jitter(base)
    }
}

fn exponential(initial: Duration, max: Duration, attempt: u32) -> Duration {
    if attempt == 0 {
        return initial;
    }
    let exponent = (attempt - 1).min(63);
    let multiplier = 1u64.checked_shl(exponent).unwrap_or(u64::MAX);
    let millis = initial.as_millis().min(u128::from(u64::MAX)) as u64;
    let scaled = millis.saturating_mul(multiplier);
    Duration::from_millis(scaled).min(max)
}

fn linear(initial: Duration, max: Duration, attempt: u32) -> Duration {
    let millis = initial.as_millis().min(u128::from(u64::MAX)) as u64;
    let scaled = millis.saturating_mul(u64::from(attempt.max(1)));
    Duration::from_millis(scaled).min(max)
}

fn with_jitter(base: Duration) -> Duration {
    let jitter_fraction = rand::thread_rng().gen_range(-0.20..=0.20);
    let millis = base.as_millis() as f64;
    let jittered = (millis * (1.0 + jitter_fraction)).max(0.0);
    Duration::from_millis(jittered as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_doubles_each_attempt_before_capping() {
        let strategy = BackoffStrategy::Exponential {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(1000),
        };
        // Use the uncapped inner fn directly to avoid jitter noise.
        assert_eq!(exponential(Duration::from_secs(1), Duration::from_secs(1000), 1), Duration::from_secs(1));
        assert_eq!(exponential(Duration::from_secs(1), Duration::from_secs(1000), 2), Duration::from_secs(2));
        assert_eq!(exponential(Duration::from_secs(1), Duration::from_secs(1000), 3), Duration::from_secs(4));
        let _ = strategy;
    }

    #[test]
    fn exponential_is_capped_at_max() {
        let capped = exponential(Duration::from_secs(1), Duration::from_secs(10), 10);
        assert_eq!(capped, Duration::from_secs(10));
    }

    #[test]
    fn linear_scales_by_attempt_number() {
        assert_eq!(linear(Duration::from_secs(2), Duration::from_secs(100), 3), Duration::from_secs(6));
    }

    #[test]
    fn linear_is_capped_at_max() {
        assert_eq!(linear(Duration::from_secs(10), Duration::from_secs(15), 10), Duration::from_secs(15));
    }

    #[test]
    fn jitter_stays_within_twenty_percent_band() {
        let base = Duration::from_millis(1000);
        for _ in 0..50 {
            let jittered = with_jitter(base);
            assert!(jittered.as_millis() >= 790 && jittered.as_millis() <= 1210);
        }
    }

    #[test]
    fn delay_for_attempt_never_exceeds_max_plus_jitter_band() {
        let strategy = BackoffStrategy::Exponential {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(10),
        };
        for attempt in 1..20 {
            let d = strategy.delay_for_attempt(attempt);
            assert!(d.as_millis() <= 12_100);
        }
    }
}
