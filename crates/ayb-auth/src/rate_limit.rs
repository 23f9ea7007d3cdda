//! Sliding-window rate limiting keyed by `(app_id, user_id, key_id)`.
//!
//! Counters live in process memory, not the database — a restart resets
//! them, which the contract treats as acceptable (at-most-once fairness,
//! not a correctness property). Any internal failure (e.g. a clock that
//! refuses to produce a duration) fails **open**: better to let a request
//! through than to wedge the whole API on a rate-limiter bug.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct RequestRecord {
    window_start: Instant,
    count: u32,
}

pub struct KeyedRateLimiter {
    counters: Mutex<HashMap<String, RequestRecord>>,
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Only meaningful when `allowed` is false.
    pub retry_after_secs: u64,
}

impl Default for KeyedRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyedRateLimiter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            counters: Mutex::new(HashMap::new()),
        }
    }

    /// `rps == 0` means unlimited for this app, per §4.3.
    pub fn check(&self, key: &str, rps: u32, window_seconds: u32) -> RateLimitDecision {
        if rps == 0 {
            return RateLimitDecision {
                allowed: true,
                retry_after_secs: 0,
            };
        }
        let cap = rps.saturating_mul(window_seconds);
        let window = Duration::from_secs(u64::from(window_seconds));

        let Ok(mut counters) = self.counters.lock() else {
            // A poisoned mutex means a prior panic mid-update; fail open
            // rather than propagate a panic into every request handler.
            return RateLimitDecision {
                allowed: true,
                retry_after_secs: 0,
            };
        };

        let now = Instant::now();
        let record = counters.entry(key.to_string()).or_insert(RequestRecord {
            window_start: now,
            count: 0,
        });

        if now.duration_since(record.window_start) >= window {
            record.window_start = now;
            record.count = 0;
        }

        if record.count < cap {
            record.count += 1;
            RateLimitDecision {
                allowed: true,
                retry_after_secs: 0,
            }
        } else {
            let elapsed = now.duration_since(record.window_start);
            let remaining = window.saturating_sub(elapsed);
            RateLimitDecision {
                allowed: false,
                retry_after_secs: remaining.as_secs().max(1),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlimited_when_rps_is_zero() {
        let limiter = KeyedRateLimiter::new();
        for _ in 0..1000 {
            assert!(limiter.check("k", 0, 60).allowed);
        }
    }

    #[test]
    fn denies_once_cap_is_reached() {
        let limiter = KeyedRateLimiter::new();
        for _ in 0..5 {
            assert!(limiter.check("k", 5, 60).allowed);
        }
        let decision = limiter.check("k", 5, 60);
        assert!(!decision.allowed);
        assert!(decision.retry_after_secs >= 1);
    }

    #[test]
    fn separate_keys_have_separate_budgets() {
        let limiter = KeyedRateLimiter::new();
        for _ in 0..5 {
            assert!(limiter.check("a", 5, 60).allowed);
        }
        assert!(limiter.check("b", 5, 60).allowed);
    }
}
