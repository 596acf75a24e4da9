//! Retry policy for fallible async operations.
//!
//! Semantics:
//! - `max_retries` counts retries after the initial try; total attempts = `1 + max_retries`.
//! - A predicate over the whole `ResilienceError` decides what is transient. By default
//!   `Inner(_)` (filtered by `should_retry`) and `Timeout` are retried; `BrokenCircuit`,
//!   `BulkheadRejected`, a nested `RetryExhausted` and `Cancelled` are returned at once.
//! - A [`DelayProvider`] computes the pause before each retry. The previous delay of the
//!   *same* sequence is kept on this call's stack and handed back to the provider, which is
//!   what decorrelated jitter grows from.
//! - Sleeper controls how delays are applied (production uses `TokioSleeper`; tests can inject
//!   `InstantSleeper`/`TrackingSleeper`). Every sleep races the caller's cancellation.
//!
//! Invariants:
//! - Attempts never exceed `1 + max_retries`.
//! - `Cancelled` is never retried, whatever the predicate says.
//! - The delay provider is invoked exactly once per retry.
//!
//! Example
//! ```rust
//! use std::time::Duration;
//! use bulwark::{Backoff, ExecutionContext, Jitter, RetryPolicy, ResilienceError};
//!
//! #[derive(Debug)]
//! struct MyErr;
//! impl std::fmt::Display for MyErr { fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "oops") } }
//! impl std::error::Error for MyErr {}
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let policy = RetryPolicy::<MyErr>::builder()
//!     .max_retries(2)
//!     .backoff(Backoff::exponential(Duration::from_millis(1)))
//!     .with_jitter(Jitter::full())
//!     .should_retry(|_e| true)
//!     .build()
//!     .unwrap();
//! let ctx = ExecutionContext::new();
//! let result: Result<(), ResilienceError<MyErr>> =
//!     policy.execute(&ctx, |_ctx| async { Err(ResilienceError::Inner(MyErr)) }).await;
//! assert!(result.unwrap_err().is_retry_exhausted());
//! # });
//! ```

use crate::backoff::DelayProvider;
use crate::error::MAX_RETRY_FAILURES;
use crate::jitter::{JitterError, JitteredBackoff};
use crate::policy::{Operation, Policy};
use crate::{Backoff, ExecutionContext, Jitter, ResilienceError, Sleeper, TokioSleeper};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

/// Upper bound on `max_retries`; anything larger is almost certainly a unit mix-up.
pub const MAX_RETRIES_LIMIT: usize = 1_000;

type RetryPredicate<E> = Arc<dyn Fn(&ResilienceError<E>) -> bool + Send + Sync>;
type RetryHook<E> = Arc<dyn Fn(usize, Duration, &ResilienceError<E>) + Send + Sync>;

/// Plain-data retry settings, e.g. loaded from a config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RetryConfig {
    pub max_retries: usize,
    pub backoff: Backoff,
    pub jitter: Jitter,
    /// Retry `Timeout` errors from inner layers.
    pub retry_timeouts: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Backoff::exponential(Duration::from_millis(100)),
            jitter: Jitter::Full,
            retry_timeouts: true,
        }
    }
}

impl RetryConfig {
    pub fn validate(&self) -> Result<(), RetryBuildError> {
        if self.max_retries > MAX_RETRIES_LIMIT {
            return Err(RetryBuildError::TooManyRetries {
                provided: self.max_retries,
                limit: MAX_RETRIES_LIMIT,
            });
        }
        if let Jitter::Decorrelated { base, max } = self.jitter {
            Jitter::decorrelated(base, max)?;
        }
        Ok(())
    }
}

/// Errors produced while building a retry policy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RetryBuildError {
    #[error("max_retries must be <= {limit} (got {provided})")]
    TooManyRetries { provided: usize, limit: usize },
    #[error(transparent)]
    Jitter(#[from] JitterError),
}

/// Retry policy combining a delay schedule, a transient-error predicate, and a sleeper.
#[derive(Clone)]
pub struct RetryPolicy<E> {
    max_retries: usize,
    delay: Arc<dyn DelayProvider>,
    predicate: RetryPredicate<E>,
    sleeper: Arc<dyn Sleeper>,
    on_retry: Option<RetryHook<E>>,
}

impl<E> std::fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("delay", &"<delay provider>")
            .field("sleeper", &self.sleeper)
            .field("predicate", &"<predicate>")
            .finish()
    }
}

impl<E> RetryPolicy<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// Construct a new builder with defaults.
    pub fn builder() -> RetryPolicyBuilder<E> {
        RetryPolicyBuilder::new()
    }

    /// Build from plain-data settings. `Inner` errors are all considered transient.
    pub fn from_config(config: &RetryConfig) -> Result<Self, RetryBuildError> {
        config.validate()?;
        Self::builder()
            .max_retries(config.max_retries)
            .backoff(config.backoff)
            .with_jitter(config.jitter)
            .retry_timeouts(config.retry_timeouts)
            .build()
    }

    /// Retries after the initial attempt.
    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    /// Execute an async operation with retry semantics.
    ///
    /// The operation receives a clone of `ctx` on every attempt. When the context is
    /// cancelled (before an attempt or during a delay) the loop stops with `Cancelled`.
    pub async fn execute<T, Fut, Op>(
        &self,
        ctx: &ExecutionContext,
        mut operation: Op,
    ) -> Result<T, ResilienceError<E>>
    where
        Fut: Future<Output = Result<T, ResilienceError<E>>>,
        Op: FnMut(ExecutionContext) -> Fut,
    {
        let mut failures: VecDeque<ResilienceError<E>> = VecDeque::new();
        let mut previous: Option<Duration> = None;
        let mut retry = 0usize;

        loop {
            ctx.check()?;
            let err = match operation(ctx.clone()).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if err.is_cancelled() || !(self.predicate)(&err) {
                return Err(err);
            }

            if retry >= self.max_retries {
                if self.max_retries == 0 {
                    return Err(err);
                }
                tracing::debug!(attempts = retry + 1, error = %err, "retry budget exhausted");
                failures.push_back(err);
                while failures.len() > MAX_RETRY_FAILURES {
                    failures.pop_front();
                }
                return Err(ResilienceError::retry_exhausted(retry + 1, failures.into()));
            }

            let delay = self.delay.delay(retry, previous);
            tracing::debug!(
                retry = retry + 1,
                max_retries = self.max_retries,
                ?delay,
                error = %err,
                "retrying after transient failure"
            );
            if let Some(hook) = &self.on_retry {
                if catch_unwind(AssertUnwindSafe(|| hook(retry + 1, delay, &err))).is_err() {
                    tracing::warn!(hook = "on_retry", "retry hook panicked");
                }
            }

            failures.push_back(err);
            while failures.len() > MAX_RETRY_FAILURES {
                failures.pop_front();
            }

            tokio::select! {
                biased;
                _ = ctx.cancelled() => return Err(ResilienceError::Cancelled),
                _ = self.sleeper.sleep(delay) => {}
            }

            previous = Some(delay);
            retry += 1;
        }
    }
}

#[async_trait]
impl<T, E> Policy<T, E> for RetryPolicy<E>
where
    T: Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    async fn call(
        &self,
        ctx: ExecutionContext,
        next: Operation<T, E>,
    ) -> Result<T, ResilienceError<E>> {
        self.execute(&ctx, |ctx| next(ctx)).await
    }

    fn name(&self) -> &'static str {
        "retry"
    }
}

/// Builder for `RetryPolicy`.
pub struct RetryPolicyBuilder<E> {
    max_retries: usize,
    backoff: Backoff,
    jitter: Jitter,
    delay: Option<Arc<dyn DelayProvider>>,
    should_retry: Arc<dyn Fn(&E) -> bool + Send + Sync>,
    retry_timeouts: bool,
    retry_if: Option<RetryPredicate<E>>,
    sleeper: Arc<dyn Sleeper>,
    on_retry: Option<RetryHook<E>>,
}

impl<E> RetryPolicyBuilder<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// Create a builder with sane defaults: 3 retries, exponential backoff from 100ms with
    /// full jitter, every `Inner` error and every `Timeout` retried.
    pub fn new() -> Self {
        let defaults = RetryConfig::default();
        Self {
            max_retries: defaults.max_retries,
            backoff: defaults.backoff,
            jitter: defaults.jitter,
            delay: None,
            should_retry: Arc::new(|_| true),
            retry_timeouts: defaults.retry_timeouts,
            retry_if: None,
            sleeper: Arc::new(TokioSleeper),
            on_retry: None,
        }
    }

    /// Retries after the initial attempt; `0` disables retrying.
    pub fn max_retries(mut self, retries: usize) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set backoff strategy.
    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Set jitter strategy.
    pub fn with_jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = jitter;
        self
    }

    /// Replace backoff and jitter with a custom delay schedule.
    pub fn delay_provider<P>(mut self, provider: P) -> Self
    where
        P: DelayProvider + 'static,
    {
        self.delay = Some(Arc::new(provider));
        self
    }

    /// Predicate to decide if an `Inner` error is retryable.
    pub fn should_retry<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.should_retry = Arc::new(predicate);
        self
    }

    /// Whether `Timeout` errors from inner layers are retried (default: yes).
    pub fn retry_timeouts(mut self, yes: bool) -> Self {
        self.retry_timeouts = yes;
        self
    }

    /// Full control over what is transient. Overrides `should_retry` and `retry_timeouts`;
    /// `Cancelled` is still never retried.
    pub fn retry_if<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&ResilienceError<E>) -> bool + Send + Sync + 'static,
    {
        self.retry_if = Some(Arc::new(predicate));
        self
    }

    /// Provide a custom sleeper implementation.
    pub fn with_sleeper<S>(mut self, sleeper: S) -> Self
    where
        S: Sleeper + 'static,
    {
        self.sleeper = Arc::new(sleeper);
        self
    }

    /// Called before each retry with the 1-based retry number, the delay about to be
    /// slept, and the failure being retried.
    pub fn on_retry<F>(mut self, hook: F) -> Self
    where
        F: Fn(usize, Duration, &ResilienceError<E>) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(hook));
        self
    }

    /// Build the retry policy, validating inputs.
    pub fn build(self) -> Result<RetryPolicy<E>, RetryBuildError> {
        if self.max_retries > MAX_RETRIES_LIMIT {
            return Err(RetryBuildError::TooManyRetries {
                provided: self.max_retries,
                limit: MAX_RETRIES_LIMIT,
            });
        }
        let delay = match self.delay {
            Some(custom) => custom,
            None => Arc::new(JitteredBackoff::new(self.backoff, self.jitter)),
        };
        let predicate = match self.retry_if {
            Some(custom) => custom,
            None => {
                let should_retry = self.should_retry;
                let retry_timeouts = self.retry_timeouts;
                Arc::new(move |err: &ResilienceError<E>| match err {
                    ResilienceError::Inner(e) => should_retry(e),
                    ResilienceError::Timeout { .. } => retry_timeouts,
                    _ => false,
                })
            }
        };
        Ok(RetryPolicy {
            max_retries: self.max_retries,
            delay,
            predicate,
            sleeper: self.sleeper,
            on_retry: self.on_retry,
        })
    }
}

impl<E> Default for RetryPolicyBuilder<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InstantSleeper, TrackingSleeper};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct TestError(String);

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "TestError: {}", self.0)
        }
    }

    impl std::error::Error for TestError {}

    fn instant(max_retries: usize) -> RetryPolicy<TestError> {
        RetryPolicy::builder()
            .max_retries(max_retries)
            .backoff(Backoff::constant(Duration::from_millis(10)))
            .with_jitter(Jitter::None)
            .with_sleeper(InstantSleeper)
            .build()
            .expect("builder")
    }

    #[tokio::test]
    async fn test_success_first_attempt() {
        let policy = instant(3);
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();

        let result = policy
            .execute(&ExecutionContext::new(), |_| {
                let counter = counter_clone.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ResilienceError<TestError>>(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 1, "Should only execute once");
    }

    #[tokio::test]
    async fn test_success_after_retries() {
        let policy = instant(4);
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();

        let result = policy
            .execute(&ExecutionContext::new(), |_| {
                let counter = counter_clone.clone();
                async move {
                    let attempt = counter.fetch_add(1, Ordering::SeqCst);
                    if attempt < 2 {
                        Err(ResilienceError::Inner(TestError(format!("attempt {}", attempt))))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 3, "Should succeed on 3rd attempt");
    }

    #[tokio::test]
    async fn three_retries_mean_four_invocations() {
        let policy = instant(3);
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();

        let result = policy
            .execute(&ExecutionContext::new(), |_| {
                let counter = counter_clone.clone();
                async move {
                    let attempt = counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(ResilienceError::Inner(TestError(format!("attempt {}", attempt))))
                }
            })
            .await;

        assert_eq!(counter.load(Ordering::SeqCst), 4);
        match result.unwrap_err() {
            ResilienceError::RetryExhausted { attempts, failures } => {
                assert_eq!(attempts, 4);
                assert_eq!(failures.len(), 4);
                assert_eq!(
                    failures.last().and_then(|e| e.as_inner()),
                    Some(&TestError("attempt 3".into()))
                );
            }
            e => panic!("Expected RetryExhausted, got {:?}", e),
        }
    }

    #[tokio::test]
    async fn retry_exhausted_caps_stored_failures() {
        let policy = instant(20);
        let result = policy
            .execute(&ExecutionContext::new(), |_| async {
                Err::<(), _>(ResilienceError::Inner(TestError("fail".to_string())))
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.retry_exhausted_info(), Some((21, MAX_RETRY_FAILURES)));
    }

    #[tokio::test]
    async fn zero_retries_returns_error_unchanged() {
        let policy = instant(0);
        let result = policy
            .execute(&ExecutionContext::new(), |_| async {
                Err::<(), _>(ResilienceError::Inner(TestError("once".into())))
            })
            .await;
        assert_eq!(result.unwrap_err(), ResilienceError::Inner(TestError("once".into())));
    }

    #[tokio::test]
    async fn non_transient_errors_short_circuit() {
        let sleeper = TrackingSleeper::new();
        let policy = RetryPolicy::builder()
            .max_retries(5)
            .should_retry(|e: &TestError| e.0 != "fatal")
            .with_sleeper(sleeper.clone())
            .build()
            .expect("builder");

        for err in [
            ResilienceError::Inner(TestError("fatal".into())),
            ResilienceError::BrokenCircuit { retry_after: Duration::from_secs(1) },
            ResilienceError::BulkheadRejected {
                active: 1,
                queued: 0,
                max_parallel: 1,
                max_queue: 0,
            },
            ResilienceError::retry_exhausted(2, vec![]),
            ResilienceError::Cancelled,
        ] {
            let counter = Arc::new(AtomicUsize::new(0));
            let counter_clone = counter.clone();
            let expected = err.clone();
            let result = policy
                .execute(&ExecutionContext::new(), |_| {
                    let counter = counter_clone.clone();
                    let err = err.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Err::<(), _>(err)
                    }
                })
                .await;
            assert_eq!(result.unwrap_err(), expected);
            assert_eq!(counter.load(Ordering::SeqCst), 1);
        }
        assert_eq!(sleeper.calls(), 0);
    }

    #[tokio::test]
    async fn timeouts_are_retried_unless_disabled() {
        let timeout = ResilienceError::<TestError>::Timeout {
            elapsed: Duration::from_millis(5),
            timeout: Duration::from_millis(5),
        };

        let retrying = instant(2);
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        let t = timeout.clone();
        let result = retrying
            .execute(&ExecutionContext::new(), |_| {
                c.fetch_add(1, Ordering::SeqCst);
                let t = t.clone();
                async move { Err::<(), _>(t) }
            })
            .await;
        assert!(result.unwrap_err().last_cause().is_timeout());
        assert_eq!(counter.load(Ordering::SeqCst), 3);

        let strict = RetryPolicy::<TestError>::builder()
            .max_retries(2)
            .retry_timeouts(false)
            .with_sleeper(InstantSleeper)
            .build()
            .unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        let result = strict
            .execute(&ExecutionContext::new(), |_| {
                c.fetch_add(1, Ordering::SeqCst);
                let t = timeout.clone();
                async move { Err::<(), _>(t) }
            })
            .await;
        assert!(result.unwrap_err().is_timeout());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retry_if_overrides_default_predicate() {
        let policy = RetryPolicy::<TestError>::builder()
            .max_retries(2)
            .retry_if(|e| e.is_bulkhead_rejected())
            .with_sleeper(InstantSleeper)
            .build()
            .unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        let result = policy
            .execute(&ExecutionContext::new(), |_| {
                c.fetch_add(1, Ordering::SeqCst);
                async {
                    Err::<(), _>(ResilienceError::BulkheadRejected {
                        active: 2,
                        queued: 1,
                        max_parallel: 2,
                        max_queue: 1,
                    })
                }
            })
            .await;
        assert!(result.unwrap_err().is_retry_exhausted());
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_backoff_applied() {
        let sleeper = TrackingSleeper::new();
        let policy = RetryPolicy::builder()
            .max_retries(3)
            .backoff(Backoff::exponential(Duration::from_millis(100)))
            .with_jitter(Jitter::None)
            .with_sleeper(sleeper.clone())
            .build()
            .expect("builder");

        let _ = policy
            .execute(&ExecutionContext::new(), |_| async {
                Err::<(), _>(ResilienceError::Inner(TestError("always fail".to_string())))
            })
            .await;

        assert_eq!(
            sleeper.recorded(),
            vec![Duration::from_millis(100), Duration::from_millis(200), Duration::from_millis(400)]
        );
    }

    #[tokio::test]
    async fn test_jitter_applied() {
        let sleeper = TrackingSleeper::new();
        let policy = RetryPolicy::builder()
            .max_retries(2)
            .backoff(Backoff::constant(Duration::from_millis(100)))
            .with_jitter(Jitter::full())
            .with_sleeper(sleeper.clone())
            .build()
            .expect("builder");

        let _ = policy
            .execute(&ExecutionContext::new(), |_| async {
                Err::<(), _>(ResilienceError::Inner(TestError("fail".to_string())))
            })
            .await;

        assert_eq!(sleeper.calls(), 2);
        for delay in sleeper.recorded() {
            assert!(delay <= Duration::from_millis(100));
        }
    }

    #[tokio::test]
    async fn previous_delay_is_scoped_to_one_sequence() {
        let sleeper = TrackingSleeper::new();
        let policy = RetryPolicy::builder()
            .max_retries(3)
            .delay_provider(|_attempt: usize, previous: Option<Duration>| {
                previous.map(|p| p * 2).unwrap_or(Duration::from_millis(10))
            })
            .with_sleeper(sleeper.clone())
            .build()
            .expect("builder");

        for _ in 0..2 {
            let _ = policy
                .execute(&ExecutionContext::new(), |_| async {
                    Err::<(), _>(ResilienceError::Inner(TestError("fail".to_string())))
                })
                .await;
        }

        let one = vec![Duration::from_millis(10), Duration::from_millis(20), Duration::from_millis(40)];
        let mut both = one.clone();
        both.extend(one);
        assert_eq!(sleeper.recorded(), both);
    }

    #[tokio::test]
    async fn on_retry_sees_each_retry() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let policy = RetryPolicy::builder()
            .max_retries(2)
            .backoff(Backoff::linear(Duration::from_millis(5)))
            .with_jitter(Jitter::None)
            .with_sleeper(InstantSleeper)
            .on_retry(move |retry, delay, err: &ResilienceError<TestError>| {
                seen_clone.lock().unwrap().push((retry, delay, err.to_string()));
            })
            .build()
            .expect("builder");

        let _ = policy
            .execute(&ExecutionContext::new(), |_| async {
                Err::<(), _>(ResilienceError::Inner(TestError("boom".to_string())))
            })
            .await;

        let seen = seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                (1, Duration::from_millis(5), "TestError: boom".to_string()),
                (2, Duration::from_millis(10), "TestError: boom".to_string()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_backoff_sleep() {
        let policy = RetryPolicy::<TestError>::builder()
            .max_retries(3)
            .backoff(Backoff::constant(Duration::from_secs(60)))
            .with_jitter(Jitter::None)
            .build()
            .unwrap();
        let ctx = ExecutionContext::new();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        let start = tokio::time::Instant::now();
        let result = policy
            .execute(&ctx, |_| {
                c.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(ResilienceError::Inner(TestError("slow".into()))) }
            })
            .await;

        assert!(result.unwrap_err().is_cancelled());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(start.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test]
    async fn cancelled_context_never_invokes_operation() {
        let policy = instant(3);
        let ctx = ExecutionContext::new();
        ctx.cancel();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        let result = policy
            .execute(&ctx, |_| {
                c.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, ResilienceError<TestError>>(()) }
            })
            .await;
        assert!(result.unwrap_err().is_cancelled());
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn build_validates_inputs() {
        let err = RetryPolicy::<TestError>::builder().max_retries(5_000).build().unwrap_err();
        assert_eq!(err, RetryBuildError::TooManyRetries { provided: 5_000, limit: MAX_RETRIES_LIMIT });

        let bad = RetryConfig {
            jitter: Jitter::Decorrelated {
                base: Duration::from_secs(2),
                max: Duration::from_secs(1),
            },
            ..RetryConfig::default()
        };
        assert!(matches!(
            RetryPolicy::<TestError>::from_config(&bad),
            Err(RetryBuildError::Jitter(JitterError::BaseExceedsMax { .. }))
        ));
        assert_eq!(RetryPolicy::<TestError>::from_config(&RetryConfig::default()).unwrap().max_retries(), 3);
    }
}
