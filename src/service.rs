//! Tower integration: run any `tower::Service` through a [`Pipeline`].
//!
//! Each attempt clones the inner service and the request, waits for the clone to become
//! ready, and calls it. Inner service errors surface as `ResilienceError::Inner`, so the
//! pipeline's retry predicates and breaker see them like any other operation failure.
//!
//! ```rust
//! use bulwark::{Pipeline, PipelineLayer, ResilienceError, RetryPolicy};
//! use tower::{service_fn, ServiceBuilder, ServiceExt};
//!
//! #[derive(Debug)]
//! struct Down;
//! impl std::fmt::Display for Down {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "down") }
//! }
//! impl std::error::Error for Down {}
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let pipeline: Pipeline<String, Down> = Pipeline::builder()
//!     .policy(RetryPolicy::builder().max_retries(1).build().unwrap())
//!     .build();
//! let svc = ServiceBuilder::new()
//!     .layer(PipelineLayer::new(pipeline))
//!     .service(service_fn(|name: &'static str| async move { Ok::<_, Down>(format!("hi {name}")) }));
//! assert_eq!(svc.oneshot("ann").await.unwrap(), "hi ann");
//! # });
//! ```

use crate::pipeline::Pipeline;
use crate::policy::operation;
use crate::{ExecutionContext, ResilienceError};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::ServiceExt;
use tower_layer::Layer;
use tower_service::Service;

type ContextFn = Arc<dyn Fn() -> ExecutionContext + Send + Sync>;

fn fresh_context() -> ContextFn {
    Arc::new(ExecutionContext::new)
}

/// `tower::Layer` wrapping services in a pipeline.
///
/// Every call runs under a fresh [`ExecutionContext`] unless [`with_context`](Self::with_context)
/// supplies one, e.g. a child of a shutdown token or a per-call budget.
pub struct PipelineLayer<T, E> {
    pipeline: Pipeline<T, E>,
    context: ContextFn,
}

impl<T, E> PipelineLayer<T, E> {
    pub fn new(pipeline: Pipeline<T, E>) -> Self {
        Self { pipeline, context: fresh_context() }
    }

    /// Build the context for each call with `make`.
    pub fn with_context<F>(mut self, make: F) -> Self
    where
        F: Fn() -> ExecutionContext + Send + Sync + 'static,
    {
        self.context = Arc::new(make);
        self
    }
}

impl<T, E> Clone for PipelineLayer<T, E> {
    fn clone(&self) -> Self {
        Self { pipeline: self.pipeline.clone(), context: self.context.clone() }
    }
}

impl<S, T, E> Layer<S> for PipelineLayer<T, E> {
    type Service = PipelineService<S, T, E>;

    fn layer(&self, inner: S) -> Self::Service {
        PipelineService { inner, pipeline: self.pipeline.clone(), context: self.context.clone() }
    }
}

/// Service produced by [`PipelineLayer`].
pub struct PipelineService<S, T, E> {
    inner: S,
    pipeline: Pipeline<T, E>,
    context: ContextFn,
}

impl<S: Clone, T, E> Clone for PipelineService<S, T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            pipeline: self.pipeline.clone(),
            context: self.context.clone(),
        }
    }
}

impl<S, T, E> PipelineService<S, T, E> {
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S, Request> Service<Request> for PipelineService<S, S::Response, S::Error>
where
    Request: Clone + Send + Sync + 'static,
    S: Service<Request> + Clone + Send + Sync + 'static,
    S::Response: Send + 'static,
    S::Error: Send + Sync + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = ResilienceError<S::Error>;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    /// Readiness is awaited per attempt on a clone of the inner service, so the pipeline's
    /// bulkhead and breaker decide admission rather than the inner service's backpressure.
    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let inner = self.inner.clone();
        let pipeline = self.pipeline.clone();
        let ctx = (self.context)();
        Box::pin(async move {
            let op = operation(move |_ctx: ExecutionContext| {
                let svc = inner.clone();
                let req = req.clone();
                async move {
                    let mut svc = svc;
                    let ready = svc.ready().await.map_err(ResilienceError::Inner)?;
                    ready.call(req).await.map_err(ResilienceError::Inner)
                }
            });
            pipeline.execute_operation(&ctx, op).await
        })
    }
}
