//! The uniform execution contract shared by every policy.
//!
//! Each concrete policy has a generic, zero-boxing `execute(&ctx, op)` method for direct
//! use. For composition every policy also implements the object-safe [`Policy`] trait,
//! where the wrapped operation is a shared, boxed [`Operation`] that can be invoked more
//! than once (retries) and whose future is `'static` (optimistic timeouts spawn it).

use crate::{ExecutionContext, ResilienceError};
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;

/// Boxed outcome future produced by an [`Operation`].
pub type BoxResultFuture<T, E> = BoxFuture<'static, Result<T, ResilienceError<E>>>;

/// Type-erased operation handed from one layer to the next.
pub type Operation<T, E> = Arc<dyn Fn(ExecutionContext) -> BoxResultFuture<T, E> + Send + Sync>;

/// Box a closure into an [`Operation`].
pub fn operation<T, E, F, Fut>(f: F) -> Operation<T, E>
where
    F: Fn(ExecutionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ResilienceError<E>>> + Send + 'static,
{
    Arc::new(move |ctx| -> BoxResultFuture<T, E> { Box::pin(f(ctx)) })
}

/// Execute `next` under this policy's protection.
///
/// Implementations decide whether `next` runs at all, how often, and how its outcome is
/// tagged. They must pass failures through as failures (only fallback may turn a failure
/// into a value) and must observe `ctx` at every point where they wait.
#[async_trait]
pub trait Policy<T, E>: Send + Sync {
    async fn call(&self, ctx: ExecutionContext, next: Operation<T, E>)
        -> Result<T, ResilienceError<E>>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

#[async_trait]
impl<T, E, P> Policy<T, E> for Arc<P>
where
    T: Send + 'static,
    E: Send + Sync + 'static,
    P: Policy<T, E> + ?Sized,
{
    async fn call(
        &self,
        ctx: ExecutionContext,
        next: Operation<T, E>,
    ) -> Result<T, ResilienceError<E>> {
        (**self).call(ctx, next).await
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
