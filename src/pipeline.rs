//! Composition of policies into one execution chain.
//!
//! A [`Pipeline`] is an ordered list of policies, outermost first. Executing it folds the
//! list from the inside out around the operation, so each policy decides whether (and how
//! often) the next inner one runs.
//!
//! Two operators compose pipelines:
//! - `a + b` - sequential: every policy of `a` wraps every policy of `b`.
//! - `a | b` - alternatives: run the operation through `a`; if that fails, run it again
//!   through `b`. Caller cancellation is never retried through `b`.
//!
//! `+` binds tighter than `|`, so `a | b + c` means `a | (b + c)`.
//!
//! # Examples
//!
//! ```
//! use bulwark::{ExecutionContext, Pipeline, ResilienceError, RetryPolicy, TimeoutPolicy};
//! use std::time::Duration;
//!
//! #[derive(Debug)]
//! struct Flaky;
//! impl std::fmt::Display for Flaky {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "flaky") }
//! }
//! impl std::error::Error for Flaky {}
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # tokio::runtime::Runtime::new()?.block_on(async {
//! let pipeline: Pipeline<u32, Flaky> = Pipeline::builder()
//!     .policy(TimeoutPolicy::new(Duration::from_secs(1))?)
//!     .policy(RetryPolicy::builder().max_retries(2).build()?)
//!     .build();
//!
//! let value = pipeline
//!     .execute(&ExecutionContext::new(), |_ctx| async { Ok::<_, ResilienceError<Flaky>>(7) })
//!     .await?;
//! assert_eq!(value, 7);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # })
//! # }
//! ```

use crate::policy::{operation, Operation, Policy};
use crate::{ExecutionContext, ResilienceError};
use async_trait::async_trait;
use std::future::Future;
use std::ops::{Add, BitOr};
use std::sync::Arc;

/// Immutable, cheaply clonable chain of policies (outermost first).
pub struct Pipeline<T, E> {
    policies: Vec<Arc<dyn Policy<T, E>>>,
}

impl<T, E> Clone for Pipeline<T, E> {
    fn clone(&self) -> Self {
        Self { policies: self.policies.clone() }
    }
}

impl<T, E> std::fmt::Debug for Pipeline<T, E>
where
    T: Send + 'static,
    E: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline").field("policies", &self.names()).finish()
    }
}

impl<T, E> Default for Pipeline<T, E> {
    fn default() -> Self {
        Self { policies: Vec::new() }
    }
}

impl<T, E> Pipeline<T, E>
where
    T: Send + 'static,
    E: Send + Sync + 'static,
{
    pub fn builder() -> PipelineBuilder<T, E> {
        PipelineBuilder { policies: Vec::new() }
    }

    /// A pipeline that runs the operation unprotected.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Policy names, outermost first.
    pub fn names(&self) -> Vec<&'static str> {
        self.policies.iter().map(|p| p.name()).collect()
    }

    /// Wrap `op` in every policy of this pipeline.
    pub fn wrap(&self, op: Operation<T, E>) -> Operation<T, E> {
        self.policies.iter().rev().fold(op, |next, policy| {
            let policy = Arc::clone(policy);
            operation(move |ctx| {
                let policy = Arc::clone(&policy);
                let next = Arc::clone(&next);
                async move { policy.call(ctx, next).await }
            })
        })
    }

    /// Run `op` through the whole chain.
    ///
    /// Fails fast with `Cancelled` if `ctx` is already done, and aborts every layer as soon
    /// as it is cancelled while the chain runs.
    pub async fn execute<F, Fut>(
        &self,
        ctx: &ExecutionContext,
        op: F,
    ) -> Result<T, ResilienceError<E>>
    where
        F: Fn(ExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ResilienceError<E>>> + Send + 'static,
    {
        self.execute_operation(ctx, operation(op)).await
    }

    /// Like [`execute`](Self::execute) for an already boxed operation.
    pub async fn execute_operation(
        &self,
        ctx: &ExecutionContext,
        op: Operation<T, E>,
    ) -> Result<T, ResilienceError<E>> {
        ctx.check()?;
        tracing::trace!(policies = ?self.names(), correlation_id = ctx.correlation_id(), "executing pipeline");
        let chain = self.wrap(op);
        ctx.run(chain(ctx.clone())).await
    }
}

/// Builder for [`Pipeline`]; policies are listed outermost first.
pub struct PipelineBuilder<T, E> {
    policies: Vec<Arc<dyn Policy<T, E>>>,
}

impl<T, E> PipelineBuilder<T, E>
where
    T: Send + 'static,
    E: Send + Sync + 'static,
{
    /// Append a policy inside the ones added so far.
    pub fn policy<P>(mut self, policy: P) -> Self
    where
        P: Policy<T, E> + 'static,
    {
        self.policies.push(Arc::new(policy));
        self
    }

    /// Append an already shared policy.
    pub fn shared(mut self, policy: Arc<dyn Policy<T, E>>) -> Self {
        self.policies.push(policy);
        self
    }

    pub fn build(self) -> Pipeline<T, E> {
        Pipeline { policies: self.policies }
    }
}

#[async_trait]
impl<T, E> Policy<T, E> for Pipeline<T, E>
where
    T: Send + 'static,
    E: Send + Sync + 'static,
{
    async fn call(
        &self,
        ctx: ExecutionContext,
        next: Operation<T, E>,
    ) -> Result<T, ResilienceError<E>> {
        self.wrap(next)(ctx).await
    }

    fn name(&self) -> &'static str {
        "pipeline"
    }
}

impl<T, E> Add for Pipeline<T, E> {
    type Output = Pipeline<T, E>;

    fn add(mut self, inner: Pipeline<T, E>) -> Self::Output {
        self.policies.extend(inner.policies);
        self
    }
}

/// Try `primary`; on failure run the same operation through `secondary`.
struct Alternatives<T, E> {
    primary: Pipeline<T, E>,
    secondary: Pipeline<T, E>,
}

#[async_trait]
impl<T, E> Policy<T, E> for Alternatives<T, E>
where
    T: Send + 'static,
    E: Send + Sync + 'static,
{
    async fn call(
        &self,
        ctx: ExecutionContext,
        next: Operation<T, E>,
    ) -> Result<T, ResilienceError<E>> {
        match self.primary.wrap(Arc::clone(&next))(ctx.clone()).await {
            Ok(value) => Ok(value),
            Err(err) if err.is_cancelled() || ctx.is_cancelled() => Err(err),
            Err(err) => {
                tracing::debug!(error_kind = err.kind(), "primary pipeline failed; trying secondary");
                self.secondary.wrap(next)(ctx).await
            }
        }
    }

    fn name(&self) -> &'static str {
        "alternatives"
    }
}

impl<T, E> BitOr for Pipeline<T, E>
where
    T: Send + 'static,
    E: Send + Sync + 'static,
{
    type Output = Pipeline<T, E>;

    fn bitor(self, secondary: Pipeline<T, E>) -> Self::Output {
        Pipeline::builder().policy(Alternatives { primary: self, secondary }).build()
    }
}
