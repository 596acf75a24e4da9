//! Backoff strategies for retry policies.
//!
//! Provides constant, linear, and exponential strategies with optional caps. Attempt
//! semantics: `attempt` is the zero-based index of the retry about to happen, so the first
//! retry asks for `delay(0)`. Exponential backoff is therefore `base * 2^attempt`.
//!
//! Example
//! ```rust
//! use std::time::Duration;
//! use bulwark::Backoff;
//!
//! let backoff = Backoff::exponential(Duration::from_millis(100))
//!     .with_max(Duration::from_secs(2))
//!     .unwrap();
//! assert_eq!(backoff.delay(0), Duration::from_millis(100)); // first retry
//! assert_eq!(backoff.delay(1), Duration::from_millis(200));
//! assert_eq!(backoff.delay(3), Duration::from_millis(800));
//! assert_eq!(backoff.delay(5), Duration::from_secs(2)); // capped
//! ```
//!
//! Overflow behavior: computations that would overflow saturate to `MAX_BACKOFF` (1 day).

use std::fmt;
use std::time::Duration;

/// Maximum delay used when calculations overflow (1 day).
pub const MAX_BACKOFF: Duration = Duration::from_secs(24 * 60 * 60);

/// Errors returned by backoff configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackoffError {
    #[error("with_max is only valid for Linear or Exponential backoff")]
    ConstantDoesNotSupportMax,
    #[error("max must be greater than zero")]
    MaxMustBePositive,
    #[error("max ({max:?}) must be >= base ({base:?})")]
    MaxLessThanBase { base: Duration, max: Duration },
}

/// Computes the pause before a retry.
///
/// `attempt` is the zero-based retry index; `previous` is the delay used before the prior
/// retry of the *same* sequence (`None` for the first retry). Stateful strategies such as
/// decorrelated jitter derive the next delay from it, so nothing is shared between
/// concurrent retry sequences.
pub trait DelayProvider: Send + Sync {
    fn delay(&self, attempt: usize, previous: Option<Duration>) -> Duration;
}

impl<F> DelayProvider for F
where
    F: Fn(usize, Option<Duration>) -> Duration + Send + Sync,
{
    fn delay(&self, attempt: usize, previous: Option<Duration>) -> Duration {
        self(attempt, previous)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
enum BackoffKind {
    Constant { delay: Duration },
    Linear { base: Duration, max: Option<Duration> },
    Exponential { base: Duration, max: Option<Duration> },
}

fn clamp_attempt(attempt: usize) -> u32 {
    attempt.min(u32::MAX as usize) as u32
}

impl BackoffKind {
    fn delay(&self, attempt: usize) -> Duration {
        match *self {
            BackoffKind::Constant { delay } => delay.min(MAX_BACKOFF),
            BackoffKind::Linear { base, max } => {
                let steps = clamp_attempt(attempt).saturating_add(1);
                let linear = base.checked_mul(steps).unwrap_or(MAX_BACKOFF);
                max.map(|m| linear.min(m)).unwrap_or(linear).min(MAX_BACKOFF)
            }
            BackoffKind::Exponential { base, max } => {
                let multiplier = 2u128.saturating_pow(clamp_attempt(attempt));
                let nanos = base.as_nanos().saturating_mul(multiplier);
                let exp_delay = Duration::from_nanos(nanos.min(MAX_BACKOFF.as_nanos()) as u64);
                max.map(|m| exp_delay.min(m)).unwrap_or(exp_delay).min(MAX_BACKOFF)
            }
        }
    }
}

/// Deterministic backoff schedule: constant, linear or exponential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Backoff {
    kind: BackoffKind,
}

impl Backoff {
    /// Same delay before every retry.
    pub fn constant(delay: Duration) -> Self {
        Self { kind: BackoffKind::Constant { delay } }
    }

    /// `base * (attempt + 1)`.
    pub fn linear(base: Duration) -> Self {
        Self { kind: BackoffKind::Linear { base, max: None } }
    }

    /// `base * 2^attempt`.
    pub fn exponential(base: Duration) -> Self {
        Self { kind: BackoffKind::Exponential { base, max: None } }
    }

    /// Set a maximum delay for the backoff (linear or exponential).
    /// Returns an error if called on `Constant`, if `max` is zero, or if `max < base`.
    pub fn with_max(mut self, max: Duration) -> Result<Self, BackoffError> {
        if max.is_zero() {
            return Err(BackoffError::MaxMustBePositive);
        }
        match &mut self.kind {
            BackoffKind::Linear { base, max: existing }
            | BackoffKind::Exponential { base, max: existing } => {
                if max < *base {
                    return Err(BackoffError::MaxLessThanBase { base: *base, max });
                }
                *existing = Some(max);
                Ok(self)
            }
            BackoffKind::Constant { .. } => Err(BackoffError::ConstantDoesNotSupportMax),
        }
    }

    /// Delay before the retry with zero-based index `attempt`.
    pub fn delay(&self, attempt: usize) -> Duration {
        self.kind.delay(attempt)
    }

    /// The configured cap, if any.
    pub fn max(&self) -> Option<Duration> {
        match self.kind {
            BackoffKind::Constant { .. } => None,
            BackoffKind::Linear { max, .. } | BackoffKind::Exponential { max, .. } => max,
        }
    }
}

impl DelayProvider for Backoff {
    fn delay(&self, attempt: usize, _previous: Option<Duration>) -> Duration {
        self.kind.delay(attempt)
    }
}

impl fmt::Display for Backoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            BackoffKind::Constant { delay } => write!(f, "constant({:?})", delay),
            BackoffKind::Linear { base, .. } => write!(f, "linear({:?})", base),
            BackoffKind::Exponential { base, .. } => write!(f, "exponential({:?})", base),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_backoff_returns_same_delay() {
        let backoff = Backoff::constant(Duration::from_secs(1));
        assert_eq!(backoff.delay(0), Duration::from_secs(1));
        assert_eq!(backoff.delay(1), Duration::from_secs(1));
        assert_eq!(backoff.delay(100), Duration::from_secs(1));
    }

    #[test]
    fn linear_backoff_increases_linearly() {
        let backoff = Backoff::linear(Duration::from_millis(100));
        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(1), Duration::from_millis(200));
        assert_eq!(backoff.delay(2), Duration::from_millis(300));
        assert_eq!(backoff.delay(9), Duration::from_millis(1000));
    }

    #[test]
    fn exponential_backoff_is_base_times_two_to_the_attempt() {
        let base = Duration::from_millis(100);
        let backoff = Backoff::exponential(base);
        for n in 0..8u32 {
            assert_eq!(backoff.delay(n as usize), base * 2u32.pow(n));
        }
    }

    #[test]
    fn exponential_backoff_respects_max() {
        let backoff = Backoff::exponential(Duration::from_millis(100))
            .with_max(Duration::from_secs(1))
            .unwrap();

        assert_eq!(backoff.delay(3), Duration::from_millis(800));
        assert_eq!(backoff.delay(4), Duration::from_secs(1));
        assert_eq!(backoff.delay(10), Duration::from_secs(1));
        assert_eq!(backoff.max(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn exponential_backoff_handles_overflow() {
        let backoff = Backoff::exponential(Duration::from_secs(1));
        assert_eq!(backoff.delay(1_000_000_000), MAX_BACKOFF);
        assert_eq!(backoff.delay(usize::MAX), MAX_BACKOFF);
    }

    #[test]
    fn linear_backoff_handles_overflow() {
        let backoff = Backoff::linear(Duration::from_secs(u64::MAX / 2));
        assert_eq!(backoff.delay(1_000_000_000), MAX_BACKOFF);
    }

    #[test]
    fn linear_with_cap_progression() {
        let backoff =
            Backoff::linear(Duration::from_secs(10)).with_max(Duration::from_secs(25)).unwrap();
        assert_eq!(backoff.delay(0), Duration::from_secs(10));
        assert_eq!(backoff.delay(1), Duration::from_secs(20));
        assert_eq!(backoff.delay(2), Duration::from_secs(25));
    }

    #[test]
    fn with_max_validation() {
        let constant = Backoff::constant(Duration::from_secs(5)).with_max(Duration::from_secs(1));
        assert_eq!(constant.unwrap_err(), BackoffError::ConstantDoesNotSupportMax);

        let zero = Backoff::exponential(Duration::from_secs(1)).with_max(Duration::ZERO);
        assert_eq!(zero.unwrap_err(), BackoffError::MaxMustBePositive);

        let err = Backoff::linear(Duration::from_secs(100))
            .with_max(Duration::from_secs(50))
            .unwrap_err();
        assert!(matches!(err, BackoffError::MaxLessThanBase { .. }));
        assert!(err.to_string().contains("must be >= base"));
    }

    #[test]
    fn closures_are_delay_providers() {
        let provider = |attempt: usize, previous: Option<Duration>| {
            previous.unwrap_or(Duration::from_millis(5)) + Duration::from_millis(attempt as u64)
        };
        assert_eq!(provider.delay(0, None), Duration::from_millis(5));
        assert_eq!(provider.delay(2, Some(Duration::from_millis(10))), Duration::from_millis(12));
    }
}
