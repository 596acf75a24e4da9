//! Fallback policy: the one layer allowed to turn a failure into a value.
//!
//! Typically outermost, so it sees every error the rest of the stack produced
//! (`BrokenCircuit`, `Timeout`, `RetryExhausted`, ...). Caller cancellation is never handled;
//! a cancelled call stays cancelled.

use crate::policy::{BoxResultFuture, Operation, Policy};
use crate::{ExecutionContext, ResilienceError};
use async_trait::async_trait;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

type Handler<T, E> =
    Arc<dyn Fn(ResilienceError<E>, ExecutionContext) -> BoxResultFuture<T, E> + Send + Sync>;
type Predicate<E> = Arc<dyn Fn(&ResilienceError<E>) -> bool + Send + Sync>;
type FallbackHook<E> = Arc<dyn Fn(&ResilienceError<E>) + Send + Sync>;

pub struct FallbackPolicy<T, E> {
    handler: Handler<T, E>,
    should_handle: Predicate<E>,
    on_fallback: Option<FallbackHook<E>>,
}

impl<T, E> Clone for FallbackPolicy<T, E> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            should_handle: Arc::clone(&self.should_handle),
            on_fallback: self.on_fallback.clone(),
        }
    }
}

impl<T, E> std::fmt::Debug for FallbackPolicy<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackPolicy").field("handler", &"<handler>").finish()
    }
}

impl<T, E> FallbackPolicy<T, E>
where
    T: Send + 'static,
    E: Send + Sync + 'static,
{
    /// Run `handler` with the failure and the call's context whenever the protected call
    /// fails. The handler may itself fail.
    pub fn new<F, Fut>(handler: F) -> Self
    where
        F: Fn(ResilienceError<E>, ExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ResilienceError<E>>> + Send + 'static,
    {
        Self {
            handler: Arc::new(move |err, ctx| -> BoxResultFuture<T, E> {
                Box::pin(handler(err, ctx))
            }),
            should_handle: Arc::new(|_| true),
            on_fallback: None,
        }
    }

    /// Substitute a fixed value for any failure.
    pub fn value(value: T) -> Self
    where
        T: Clone + Sync,
    {
        Self::new(move |_err, _ctx| {
            let value = value.clone();
            async move { Ok(value) }
        })
    }

    /// Only handle failures matching `predicate`; others pass through unchanged.
    pub fn handle_if<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&ResilienceError<E>) -> bool + Send + Sync + 'static,
    {
        self.should_handle = Arc::new(predicate);
        self
    }

    /// Observe every failure that is about to be replaced.
    pub fn on_fallback<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ResilienceError<E>) + Send + Sync + 'static,
    {
        self.on_fallback = Some(Arc::new(hook));
        self
    }

    pub async fn execute<Fut, Op>(
        &self,
        ctx: &ExecutionContext,
        operation: Op,
    ) -> Result<T, ResilienceError<E>>
    where
        Fut: Future<Output = Result<T, ResilienceError<E>>>,
        Op: FnOnce(ExecutionContext) -> Fut,
    {
        let err = match operation(ctx.clone()).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if err.is_cancelled() || ctx.is_cancelled() || !(self.should_handle)(&err) {
            return Err(err);
        }

        tracing::debug!(error_kind = err.kind(), "fallback engaged");
        if let Some(hook) = &self.on_fallback {
            if catch_unwind(AssertUnwindSafe(|| hook(&err))).is_err() {
                tracing::warn!(hook = "on_fallback", "fallback hook panicked");
            }
        }
        (self.handler)(err, ctx.clone()).await
    }
}

#[async_trait]
impl<T, E> Policy<T, E> for FallbackPolicy<T, E>
where
    T: Send + 'static,
    E: Send + Sync + 'static,
{
    async fn call(
        &self,
        ctx: ExecutionContext,
        next: Operation<T, E>,
    ) -> Result<T, ResilienceError<E>> {
        self.execute(&ctx, |ctx| next(ctx)).await
    }

    fn name(&self) -> &'static str {
        "fallback"
    }
}
