//! Resilience stack builder for composing policies in the canonical order
//!
//! Layering (outermost first):
//!
//! ```text
//! Fallback → CircuitBreaker → Timeout → Bulkhead → Retry → operation      (TimeoutScope::WholeCall)
//! Fallback → CircuitBreaker → Bulkhead → Retry → Timeout → operation      (TimeoutScope::PerAttempt)
//! ```
//!
//! With the default `WholeCall` scope the timeout bounds the entire retry sequence,
//! including backoff sleeps and bulkhead queueing, and the breaker sees one outcome per
//! logical call. `PerAttempt` bounds each attempt separately instead; timed-out attempts
//! are then retried.

use crate::bulkhead::BulkheadHealth;
use crate::circuit_breaker::CircuitBreakerHealth;
use crate::pipeline::{Pipeline, PipelineBuilder};
use crate::{
    BulkheadPolicy, CircuitBreakerPolicy, ExecutionContext, FallbackPolicy, ResilienceError,
    RetryPolicy, TimeoutPolicy,
};
use std::future::Future;

/// Where the timeout sits relative to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TimeoutScope {
    /// One deadline for the whole call, retries included.
    #[default]
    WholeCall,
    /// A fresh timeout for every attempt.
    PerAttempt,
}

/// Aggregated health of the stateful layers of a stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StackHealth {
    pub circuit_breaker: Option<CircuitBreakerHealth>,
    pub bulkhead: Option<BulkheadHealth>,
}

/// A fully assembled, immutable policy stack. Clones share breaker and bulkhead state.
pub struct ResilienceStack<T, E> {
    pipeline: Pipeline<T, E>,
    circuit_breaker: Option<CircuitBreakerPolicy>,
    bulkhead: Option<BulkheadPolicy>,
    timeout_scope: TimeoutScope,
}

impl<T, E> Clone for ResilienceStack<T, E> {
    fn clone(&self) -> Self {
        Self {
            pipeline: self.pipeline.clone(),
            circuit_breaker: self.circuit_breaker.clone(),
            bulkhead: self.bulkhead.clone(),
            timeout_scope: self.timeout_scope,
        }
    }
}

impl<T, E> std::fmt::Debug for ResilienceStack<T, E>
where
    T: Send + 'static,
    E: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilienceStack")
            .field("layers", &self.pipeline.names())
            .field("timeout_scope", &self.timeout_scope)
            .finish()
    }
}

impl<T, E> ResilienceStack<T, E>
where
    T: Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    pub fn builder() -> ResilienceStackBuilder<T, E> {
        ResilienceStackBuilder::new()
    }

    pub async fn execute<F, Fut>(
        &self,
        ctx: &ExecutionContext,
        operation: F,
    ) -> Result<T, ResilienceError<E>>
    where
        F: Fn(ExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ResilienceError<E>>> + Send + 'static,
    {
        self.pipeline.execute(ctx, operation).await
    }

    /// Layer names, outermost first.
    pub fn layers(&self) -> Vec<&'static str> {
        self.pipeline.names()
    }

    pub fn timeout_scope(&self) -> TimeoutScope {
        self.timeout_scope
    }

    pub fn circuit_breaker(&self) -> Option<&CircuitBreakerPolicy> {
        self.circuit_breaker.as_ref()
    }

    pub fn bulkhead(&self) -> Option<&BulkheadPolicy> {
        self.bulkhead.as_ref()
    }

    pub fn health(&self) -> StackHealth {
        StackHealth {
            circuit_breaker: self.circuit_breaker.as_ref().map(CircuitBreakerPolicy::health),
            bulkhead: self.bulkhead.as_ref().map(BulkheadPolicy::health),
        }
    }

    /// The underlying pipeline, e.g. to compose it further with `+` or `|`.
    pub fn pipeline(&self) -> &Pipeline<T, E> {
        &self.pipeline
    }

    pub fn into_pipeline(self) -> Pipeline<T, E> {
        self.pipeline
    }
}

/// Builder for [`ResilienceStack`]. Every layer is optional; absent layers are skipped.
pub struct ResilienceStackBuilder<T, E> {
    fallback: Option<FallbackPolicy<T, E>>,
    circuit_breaker: Option<CircuitBreakerPolicy>,
    timeout: Option<TimeoutPolicy>,
    bulkhead: Option<BulkheadPolicy>,
    retry: Option<RetryPolicy<E>>,
    timeout_scope: TimeoutScope,
}

impl<T, E> ResilienceStackBuilder<T, E>
where
    T: Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            fallback: None,
            circuit_breaker: None,
            timeout: None,
            bulkhead: None,
            retry: None,
            timeout_scope: TimeoutScope::default(),
        }
    }

    pub fn fallback(mut self, policy: FallbackPolicy<T, E>) -> Self {
        self.fallback = Some(policy);
        self
    }

    /// Use (a clone of) a shared breaker; state is shared with every other holder.
    pub fn circuit_breaker(mut self, policy: CircuitBreakerPolicy) -> Self {
        self.circuit_breaker = Some(policy);
        self
    }

    pub fn timeout(mut self, policy: TimeoutPolicy) -> Self {
        self.timeout = Some(policy);
        self
    }

    pub fn bulkhead(mut self, policy: BulkheadPolicy) -> Self {
        self.bulkhead = Some(policy);
        self
    }

    pub fn retry(mut self, policy: RetryPolicy<E>) -> Self {
        self.retry = Some(policy);
        self
    }

    pub fn timeout_scope(mut self, scope: TimeoutScope) -> Self {
        self.timeout_scope = scope;
        self
    }

    pub fn no_fallback(mut self) -> Self {
        self.fallback = None;
        self
    }

    pub fn no_circuit_breaker(mut self) -> Self {
        self.circuit_breaker = None;
        self
    }

    pub fn no_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    pub fn no_bulkhead(mut self) -> Self {
        self.bulkhead = None;
        self
    }

    pub fn no_retry(mut self) -> Self {
        self.retry = None;
        self
    }

    pub fn build(self) -> ResilienceStack<T, E> {
        let mut builder: PipelineBuilder<T, E> = Pipeline::builder();
        if let Some(fallback) = self.fallback {
            builder = builder.policy(fallback);
        }
        if let Some(breaker) = self.circuit_breaker.clone() {
            builder = builder.policy(breaker);
        }
        let (outer_timeout, inner_timeout) = match self.timeout_scope {
            TimeoutScope::WholeCall => (self.timeout, None),
            TimeoutScope::PerAttempt => (None, self.timeout),
        };
        if let Some(timeout) = outer_timeout {
            builder = builder.policy(timeout);
        }
        if let Some(bulkhead) = self.bulkhead.clone() {
            builder = builder.policy(bulkhead);
        }
        if let Some(retry) = self.retry {
            builder = builder.policy(retry);
        }
        if let Some(timeout) = inner_timeout {
            builder = builder.policy(timeout);
        }
        ResilienceStack {
            pipeline: builder.build(),
            circuit_breaker: self.circuit_breaker,
            bulkhead: self.bulkhead,
            timeout_scope: self.timeout_scope,
        }
    }
}

impl<T, E> Default for ResilienceStackBuilder<T, E>
where
    T: Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
