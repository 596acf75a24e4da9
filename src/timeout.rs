//! Timeout policy implementation
//!
//! Two strategies:
//! - `Pessimistic` (default): the operation gets a child context. When the timer fires the
//!   child token is cancelled, the operation future is dropped, and `Timeout` is returned.
//! - `Optimistic`: the operation is spawned with the caller's own context. When the timer
//!   fires `Timeout` is returned and the task keeps running detached; its result is
//!   discarded. Use it for operations that must not be interrupted half way.
//!
//! In both cases the caller's cancellation (token or deadline) is raced as well and wins
//! ties, surfacing as `Cancelled` rather than `Timeout`.

use crate::policy::{Operation, Policy};
use crate::{ExecutionContext, ResilienceError};
use async_trait::async_trait;
use std::future::Future;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Longest accepted timeout (1 day).
pub const MAX_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// How a timed-out operation is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TimeoutStrategy {
    /// Cancel and drop the operation.
    #[default]
    Pessimistic,
    /// Stop waiting but let the operation finish in the background.
    Optimistic,
}

/// Plain-data timeout settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TimeoutConfig {
    pub duration: Duration,
    pub strategy: TimeoutStrategy,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { duration: Duration::from_secs(10), strategy: TimeoutStrategy::Pessimistic }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeoutError {
    #[error("timeout duration must be > 0")]
    ZeroDuration,
    #[error("timeout duration {provided:?} exceeds the maximum of {max:?}")]
    TooLong { provided: Duration, max: Duration },
}

type TimeoutHook = Arc<dyn Fn(Duration) + Send + Sync>;

#[derive(Clone)]
pub struct TimeoutPolicy {
    duration: Duration,
    strategy: TimeoutStrategy,
    on_timeout: Option<TimeoutHook>,
}

impl std::fmt::Debug for TimeoutPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeoutPolicy")
            .field("duration", &self.duration)
            .field("strategy", &self.strategy)
            .finish()
    }
}

impl TimeoutPolicy {
    /// Create a pessimistic timeout policy.
    pub fn new(duration: Duration) -> Result<Self, TimeoutError> {
        if duration.is_zero() {
            return Err(TimeoutError::ZeroDuration);
        }
        if duration > MAX_TIMEOUT {
            return Err(TimeoutError::TooLong { provided: duration, max: MAX_TIMEOUT });
        }
        Ok(Self { duration, strategy: TimeoutStrategy::Pessimistic, on_timeout: None })
    }

    pub fn from_config(config: &TimeoutConfig) -> Result<Self, TimeoutError> {
        Ok(Self::new(config.duration)?.with_strategy(config.strategy))
    }

    pub fn with_strategy(mut self, strategy: TimeoutStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Shorthand for `with_strategy(TimeoutStrategy::Optimistic)`.
    pub fn optimistic(self) -> Self {
        self.with_strategy(TimeoutStrategy::Optimistic)
    }

    /// Called with the elapsed time whenever the timer wins.
    pub fn on_timeout<F>(mut self, hook: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.on_timeout = Some(Arc::new(hook));
        self
    }

    /// Inspect the configured timeout duration.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn strategy(&self) -> TimeoutStrategy {
        self.strategy
    }

    pub async fn execute<T, E, Fut, Op>(
        &self,
        ctx: &ExecutionContext,
        operation: Op,
    ) -> Result<T, ResilienceError<E>>
    where
        T: Send + 'static,
        E: Send + Sync + 'static,
        Fut: Future<Output = Result<T, ResilienceError<E>>> + Send + 'static,
        Op: FnOnce(ExecutionContext) -> Fut,
    {
        ctx.check()?;
        match self.strategy {
            TimeoutStrategy::Pessimistic => self.pessimistic(ctx, operation).await,
            TimeoutStrategy::Optimistic => self.optimistic_run(ctx, operation).await,
        }
    }

    async fn pessimistic<T, E, Fut, Op>(
        &self,
        ctx: &ExecutionContext,
        operation: Op,
    ) -> Result<T, ResilienceError<E>>
    where
        Fut: Future<Output = Result<T, ResilienceError<E>>>,
        Op: FnOnce(ExecutionContext) -> Fut,
    {
        let child = ctx.child();
        let start = Instant::now();
        let fut = operation(child.clone());
        tokio::select! {
            biased;
            _ = ctx.cancelled() => {
                child.cancel();
                Err(ResilienceError::Cancelled)
            }
            result = fut => result,
            _ = tokio::time::sleep(self.duration) => {
                child.cancel();
                Err(self.timed_out(start))
            }
        }
    }

    async fn optimistic_run<T, E, Fut, Op>(
        &self,
        ctx: &ExecutionContext,
        operation: Op,
    ) -> Result<T, ResilienceError<E>>
    where
        T: Send + 'static,
        E: Send + Sync + 'static,
        Fut: Future<Output = Result<T, ResilienceError<E>>> + Send + 'static,
        Op: FnOnce(ExecutionContext) -> Fut,
    {
        let start = Instant::now();
        let handle = tokio::spawn(operation(ctx.clone()));
        tokio::select! {
            biased;
            _ = ctx.cancelled() => Err(ResilienceError::Cancelled),
            joined = handle => match joined {
                Ok(result) => result,
                Err(err) if err.is_panic() => resume_unwind(err.into_panic()),
                // the runtime is shutting down
                Err(_) => Err(ResilienceError::Cancelled),
            },
            _ = tokio::time::sleep(self.duration) => {
                tracing::debug!(timeout = ?self.duration, "optimistic timeout; operation left running");
                Err(self.timed_out(start))
            }
        }
    }

    fn timed_out<E>(&self, start: Instant) -> ResilienceError<E> {
        let elapsed = start.elapsed();
        tracing::debug!(?elapsed, timeout = ?self.duration, strategy = ?self.strategy, "operation timed out");
        if let Some(hook) = &self.on_timeout {
            if catch_unwind(AssertUnwindSafe(|| hook(elapsed))).is_err() {
                tracing::warn!(hook = "on_timeout", "timeout hook panicked");
            }
        }
        ResilienceError::Timeout { elapsed, timeout: self.duration }
    }
}

#[async_trait]
impl<T, E> Policy<T, E> for TimeoutPolicy
where
    T: Send + 'static,
    E: Send + Sync + 'static,
{
    async fn call(
        &self,
        ctx: ExecutionContext,
        next: Operation<T, E>,
    ) -> Result<T, ResilienceError<E>> {
        self.execute(&ctx, move |ctx| next(ctx)).await
    }

    fn name(&self) -> &'static str {
        "timeout"
    }
}
