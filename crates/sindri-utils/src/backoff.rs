/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Exponential backoff with optional jitter, used by the task retry loop.

use std::time::Duration;

use rand::Rng;

/// Per-key exponential backoff state.
///
/// The delay grows as `min * factor^attempts`, clamped to `max`. With
/// `jitter` enabled the returned delay is scaled by a random factor in
/// `[0.5, 1.5)` (still clamped to `max`).
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    pub factor: f64,
    pub min: Duration,
    pub max: Duration,
    pub jitter: bool,

    attempts: u32,
}

impl ExponentialBackoff {
    pub fn new(factor: f64, min: Duration, max: Duration, jitter: bool) -> Self {
        ExponentialBackoff {
            factor,
            min,
            max,
            jitter,
            attempts: 0,
        }
    }

    /// The default policy for transient system errors: factor 2,
    /// 200 ms to 10 s, jitter on.
    pub fn default_policy() -> Self {
        ExponentialBackoff::new(
            2.0,
            Duration::from_millis(200),
            Duration::from_secs(10),
            true,
        )
    }

    /// Returns the next delay and increments the attempt counter.
    pub fn increase_and_return_new_duration(&mut self) -> Duration {
        let exp = self.factor.powi(self.attempts as i32);
        let mut delay = self.min.mul_f64(exp);
        if delay > self.max {
            delay = self.max;
        }

        if self.jitter {
            let scale: f64 = rand::thread_rng().gen_range(0.5..1.5);
            delay = delay.mul_f64(scale);
            if delay > self.max {
                delay = self.max;
            }
        }

        self.attempts = self.attempts.saturating_add(1);
        delay
    }

    /// Resets the attempt counter, returning the delay to `min`.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter() -> ExponentialBackoff {
        ExponentialBackoff::new(
            2.0,
            Duration::from_millis(200),
            Duration::from_secs(10),
            false,
        )
    }

    #[test]
    fn test_backoff_doubles_per_attempt() {
        let mut backoff = no_jitter();
        assert_eq!(
            backoff.increase_and_return_new_duration(),
            Duration::from_millis(200)
        );
        assert_eq!(
            backoff.increase_and_return_new_duration(),
            Duration::from_millis(400)
        );
        assert_eq!(
            backoff.increase_and_return_new_duration(),
            Duration::from_millis(800)
        );
    }

    #[test]
    fn test_backoff_clamps_to_max() {
        let mut backoff = no_jitter();
        for _ in 0..20 {
            backoff.increase_and_return_new_duration();
        }
        assert_eq!(
            backoff.increase_and_return_new_duration(),
            Duration::from_secs(10)
        );
    }

    #[test]
    fn test_backoff_reset_returns_to_min() {
        let mut backoff = no_jitter();
        backoff.increase_and_return_new_duration();
        backoff.increase_and_return_new_duration();
        backoff.reset();
        assert_eq!(
            backoff.increase_and_return_new_duration(),
            Duration::from_millis(200)
        );
    }

    #[test]
    fn test_jitter_stays_within_max() {
        let mut backoff = ExponentialBackoff::default_policy();
        for _ in 0..30 {
            let delay = backoff.increase_and_return_new_duration();
            assert!(delay <= Duration::from_secs(10));
        }
    }
}
