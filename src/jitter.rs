//! Jitter strategies to prevent thundering herd
//!
//! When to use which strategy:
//! - `None`: deterministic retries for tests or tightly controlled workflows.
//! - `Full`: uniform in `[0, delay]`, good default to spread load.
//! - `Equal`: uniform in `[delay/2, delay]`, keeps a floor while adding randomness.
//! - `Decorrelated`: `min(max, uniform(base, previous * 3))`, growing from the previous
//!   sleep of the same retry sequence.
//!
//! Notes:
//! - RNG: uses `rand`'s thread-local RNG by default; deterministic RNGs can be injected via
//!   `apply_with_rng`.
//! - Jitter itself holds no state. The previous delay is passed in by the retry loop,
//!   which keeps it on its own stack, so concurrent sequences never influence each other.

use crate::backoff::{Backoff, DelayProvider};
use rand::{rng, Rng};
use std::time::Duration;

/// Jitter strategy for randomizing retry delays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum Jitter {
    /// No jitter - use exact backoff delay
    #[default]
    None,
    /// Full jitter: random between 0 and delay
    Full,
    /// Equal jitter: random between delay/2 and delay
    Equal,
    /// Decorrelated jitter bounded by `base` and `max`
    Decorrelated { base: Duration, max: Duration },
}

/// Errors produced when configuring jitter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JitterError {
    #[error("decorrelated jitter: base ({base:?}) must not exceed max ({max:?})")]
    BaseExceedsMax { base: Duration, max: Duration },
}

impl Jitter {
    /// Create a full jitter strategy
    pub fn full() -> Self {
        Jitter::Full
    }

    /// Create an equal jitter strategy
    pub fn equal() -> Self {
        Jitter::Equal
    }

    /// Create a decorrelated jitter strategy
    pub fn decorrelated(base: Duration, max: Duration) -> Result<Self, JitterError> {
        if base > max {
            return Err(JitterError::BaseExceedsMax { base, max });
        }
        Ok(Jitter::Decorrelated { base, max })
    }

    /// Apply jitter to a delay duration
    pub fn apply(&self, delay: Duration, previous: Option<Duration>) -> Duration {
        let mut rng = rng();
        self.apply_with_rng(delay, previous, &mut rng)
    }

    /// Apply jitter with a custom RNG (for testing)
    pub fn apply_with_rng<R: Rng>(
        &self,
        delay: Duration,
        previous: Option<Duration>,
        rng: &mut R,
    ) -> Duration {
        match *self {
            Jitter::None => delay,
            Jitter::Full => {
                let millis = as_millis_saturated(delay);
                if millis == 0 {
                    return Duration::ZERO;
                }
                Duration::from_millis(rng.random_range(0..=millis))
            }
            Jitter::Equal => {
                let millis = as_millis_saturated(delay);
                if millis == 0 {
                    return Duration::ZERO;
                }
                Duration::from_millis(rng.random_range(millis / 2..=millis))
            }
            Jitter::Decorrelated { base, max } => {
                let base_millis = as_millis_saturated(base);
                let max_millis = as_millis_saturated(max);
                let prev_millis = as_millis_saturated(previous.unwrap_or(base));

                let upper = prev_millis.saturating_mul(3).min(max_millis);
                // floor at base, but never above upper when previous was tiny
                let lower = base_millis.min(upper);

                Duration::from_millis(rng.random_range(lower..=upper))
            }
        }
    }
}

fn as_millis_saturated(duration: Duration) -> u64 {
    duration.as_millis().try_into().unwrap_or(u64::MAX)
}

/// A backoff schedule randomized by a jitter strategy; what `RetryPolicy` uses by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JitteredBackoff {
    pub backoff: Backoff,
    #[cfg_attr(feature = "serde", serde(default))]
    pub jitter: Jitter,
}

impl JitteredBackoff {
    pub fn new(backoff: Backoff, jitter: Jitter) -> Self {
        Self { backoff, jitter }
    }
}

impl DelayProvider for JitteredBackoff {
    fn delay(&self, attempt: usize, previous: Option<Duration>) -> Duration {
        self.jitter.apply(self.backoff.delay(attempt), previous)
    }
}
