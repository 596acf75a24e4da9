//! Error types for resilience policies
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Cap the number of stored failures inside RetryExhausted to avoid unbounded growth.
pub const MAX_RETRY_FAILURES: usize = 10;

/// Unified error type for every policy and for composed pipelines.
///
/// Callers branch on the variant: show cached data on `BrokenCircuit`, ask the user to
/// try again on `Timeout`, and so on. Nothing private to a policy's implementation
/// (tokio elapsed errors, semaphore errors, join errors) ever surfaces here.
#[derive(Debug, Clone, PartialEq)]
pub enum ResilienceError<E> {
    /// The operation (or the attempt) exceeded the timeout duration
    Timeout { elapsed: Duration, timeout: Duration },
    /// The bulkhead rejected the call; the operation never ran
    BulkheadRejected { active: usize, queued: usize, max_parallel: usize, max_queue: usize },
    /// The circuit breaker is open; the operation never ran
    BrokenCircuit { retry_after: Duration },
    /// Every retry attempt failed. `failures` holds the most recent failures, oldest first;
    /// the last one is the cause.
    RetryExhausted { attempts: usize, failures: Arc<Vec<ResilienceError<E>>> },
    /// The caller cancelled the execution or its deadline passed
    Cancelled,
    /// The underlying operation failed
    Inner(E),
}

impl<E: fmt::Display> fmt::Display for ResilienceError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout { elapsed, timeout } => {
                write!(f, "operation timed out after {:?} (limit: {:?})", elapsed, timeout)
            }
            Self::BulkheadRejected { active, queued, max_parallel, max_queue } => {
                write!(
                    f,
                    "bulkhead rejected request ({}/{} active, {}/{} queued)",
                    active, max_parallel, queued, max_queue
                )
            }
            Self::BrokenCircuit { retry_after } => {
                write!(f, "circuit breaker open (next probe in {:?})", retry_after)
            }
            Self::RetryExhausted { attempts, failures } => {
                let recorded = failures.len();
                let truncated_note = if recorded < *attempts {
                    format!(" (recorded last {} failures)", recorded)
                } else {
                    String::new()
                };
                if let Some(last) = failures.last() {
                    write!(
                        f,
                        "retry exhausted after {} attempts{}; last error: {}",
                        attempts, truncated_note, last
                    )
                } else {
                    write!(
                        f,
                        "retry exhausted after {} attempts{}; no recorded failures",
                        attempts, truncated_note
                    )
                }
            }
            Self::Cancelled => write!(f, "execution cancelled by caller"),
            Self::Inner(e) => write!(f, "{}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for ResilienceError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Inner(e) => Some(e),
            Self::RetryExhausted { failures, .. } => {
                failures.last().map(|e| e as &dyn std::error::Error)
            }
            _ => None,
        }
    }
}

impl<E> ResilienceError<E> {
    /// Construct a `RetryExhausted` variant while enforcing the `MAX_RETRY_FAILURES` cap by
    /// keeping the most recent failures.
    pub fn retry_exhausted(attempts: usize, failures: Vec<ResilienceError<E>>) -> Self {
        let trimmed = if failures.len() > MAX_RETRY_FAILURES {
            let skip = failures.len() - MAX_RETRY_FAILURES;
            failures.into_iter().skip(skip).collect()
        } else {
            failures
        };
        ResilienceError::RetryExhausted { attempts, failures: Arc::new(trimmed) }
    }

    /// Check if this error is due to timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Check if this error is due to an open circuit breaker
    pub fn is_broken_circuit(&self) -> bool {
        matches!(self, Self::BrokenCircuit { .. })
    }

    /// Check if this error is due to bulkhead rejection
    pub fn is_bulkhead_rejected(&self) -> bool {
        matches!(self, Self::BulkheadRejected { .. })
    }

    /// Check if this error is due to retry exhaustion
    pub fn is_retry_exhausted(&self) -> bool {
        matches!(self, Self::RetryExhausted { .. })
    }

    /// Check if the caller cancelled the execution
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Check if this error wraps an inner error.
    pub fn is_inner(&self) -> bool {
        matches!(self, Self::Inner(_))
    }

    /// Get the inner error if this is an Inner variant
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Inner(e) => Some(e),
            _ => None,
        }
    }

    /// Borrow the inner error if present.
    pub fn as_inner(&self) -> Option<&E> {
        match self {
            Self::Inner(e) => Some(e),
            _ => None,
        }
    }

    /// Access all recorded failures for RetryExhausted, if present.
    pub fn failures(&self) -> Option<&[ResilienceError<E>]> {
        match self {
            Self::RetryExhausted { failures, .. } => Some(failures.as_slice()),
            _ => None,
        }
    }

    /// The failure that ended a retry sequence, or `self` for every other variant.
    pub fn last_cause(&self) -> &ResilienceError<E> {
        match self {
            Self::RetryExhausted { failures, .. } => match failures.last() {
                Some(last) => last.last_cause(),
                None => self,
            },
            other => other,
        }
    }

    /// Access timeout details as (elapsed, timeout).
    pub fn timeout_details(&self) -> Option<(Duration, Duration)> {
        match self {
            Self::Timeout { elapsed, timeout } => Some((*elapsed, *timeout)),
            _ => None,
        }
    }

    /// Time left until the breaker admits a probe, if this is a broken-circuit error.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::BrokenCircuit { retry_after } => Some(*retry_after),
            _ => None,
        }
    }

    /// Access retry exhaustion info as (attempts, recorded_failures).
    pub fn retry_exhausted_info(&self) -> Option<(usize, usize)> {
        match self {
            Self::RetryExhausted { attempts, failures } => Some((*attempts, failures.len())),
            _ => None,
        }
    }

    /// Short, stable name of the variant; handy as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::BulkheadRejected { .. } => "bulkhead_rejected",
            Self::BrokenCircuit { .. } => "broken_circuit",
            Self::RetryExhausted { .. } => "retry_exhausted",
            Self::Cancelled => "cancelled",
            Self::Inner(_) => "operation_failure",
        }
    }
}
