// src/utils/backoff.rs
//! Exponential backoff with jitter
//!
//! Shared by the proof submitter (bounded attempts) and the account
//! refresh loop of forever mode (unbounded attempts).

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry schedule for one operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
    /// Attempts allowed before giving up (0 = never give up)
    pub max_attempts: u32,
    /// Delay after the first failure, in milliseconds
    pub initial_delay_ms: u64,
    /// Upper bound for any single delay, in milliseconds
    pub max_delay_ms: u64,
    /// Growth factor between consecutive delays
    pub multiplier: f64,
    /// Fraction of the delay randomized in both directions (0.0 - 1.0)
    pub jitter: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::submission()
    }
}

impl BackoffPolicy {
    /// Defaults for proof submission: 5 attempts, 0.5s doubling to 8s
    pub fn submission() -> Self {
        BackoffPolicy {
            max_attempts: 5,
            initial_delay_ms: 500,
            max_delay_ms: 8_000,
            multiplier: 2.0,
            jitter: 0.2,
        }
    }

    /// Defaults for account refresh: unbounded, 1s doubling to 30s
    pub fn refresh() -> Self {
        BackoffPolicy {
            max_attempts: 0,
            initial_delay_ms: 1_000,
            max_delay_ms: 30_000,
            multiplier: 2.0,
            jitter: 0.2,
        }
    }

    /// A policy that retries without waiting
    pub fn immediate(max_attempts: u32) -> Self {
        BackoffPolicy {
            max_attempts,
            initial_delay_ms: 0,
            max_delay_ms: 0,
            multiplier: 1.0,
            jitter: 0.0,
        }
    }

    /// Whether `failures` consecutive failures used up the budget
    pub fn exhausted(&self, failures: u32) -> bool {
        self.max_attempts != 0 && failures >= self.max_attempts
    }

    /// Delay to wait after the `failures`-th consecutive failure
    pub fn delay(&self, failures: u32) -> Duration {
        let base = self.base_delay_ms(failures);
        if base == 0.0 {
            return Duration::ZERO;
        }

        let jitter = self.jitter.clamp(0.0, 1.0);
        let factor = if jitter > 0.0 {
            1.0 + rand::thread_rng().gen_range(-jitter..=jitter)
        } else {
            1.0
        };

        Duration::from_millis((base * factor).max(0.0) as u64)
    }

    fn base_delay_ms(&self, failures: u32) -> f64 {
        let exponent = failures.saturating_sub(1).min(63) as i32;
        let raw = self.initial_delay_ms as f64 * self.multiplier.max(1.0).powi(exponent);
        raw.min(self.max_delay_ms as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_grow_and_cap() {
        let policy = BackoffPolicy {
            jitter: 0.0,
            ..BackoffPolicy::submission()
        };
        assert_eq!(policy.delay(1), Duration::from_millis(500));
        assert_eq!(policy.delay(2), Duration::from_millis(1_000));
        assert_eq!(policy.delay(4), Duration::from_millis(4_000));
        assert_eq!(policy.delay(10), Duration::from_millis(8_000));
        assert_eq!(policy.delay(u32::MAX), Duration::from_millis(8_000));
    }

    #[test]
    fn jitter_stays_within_band() {
        let policy = BackoffPolicy::submission();
        for _ in 0..200 {
            let d = policy.delay(2).as_millis();
            assert!((799..=1_200).contains(&d), "delay {} out of band", d);
        }
    }

    #[test]
    fn budget() {
        let policy = BackoffPolicy::submission();
        assert!(!policy.exhausted(4));
        assert!(policy.exhausted(5));

        let forever = BackoffPolicy::refresh();
        assert!(!forever.exhausted(u32::MAX));
    }

    #[test]
    fn immediate_never_sleeps() {
        let policy = BackoffPolicy::immediate(3);
        assert_eq!(policy.delay(1), Duration::ZERO);
        assert_eq!(policy.delay(3), Duration::ZERO);
        assert!(policy.exhausted(3));
    }
}
