#![forbid(unsafe_code)]

//! # bulwark
//!
//! Resilience policies for async Rust: circuit breakers, retries with backoff and jitter,
//! timeouts, bulkheads and fallbacks, composed into pipelines and exposed as a
//! `tower::Layer`.
//!
//! Every policy runs an operation of the form `Fn(ExecutionContext) -> Future<Output =
//! Result<T, ResilienceError<E>>>`. The [`ExecutionContext`] carries cancellation, an
//! optional deadline and a correlation id through every layer; [`ResilienceError`] tells
//! callers which layer produced a failure.
//!
//! ## Quick Start
//!
//! ```rust
//! use bulwark::{
//!     Backoff, CircuitBreakerPolicy, ExecutionContext, Jitter, ResilienceError, ResilienceStack,
//!     RetryPolicy, TimeoutPolicy,
//! };
//! use std::time::Duration;
//!
//! #[derive(Debug)]
//! struct Flaky;
//! impl std::fmt::Display for Flaky {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "flaky") }
//! }
//! impl std::error::Error for Flaky {}
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let stack: ResilienceStack<u32, Flaky> = ResilienceStack::builder()
//!     .circuit_breaker(CircuitBreakerPolicy::new(5, Duration::from_secs(30)).unwrap())
//!     .timeout(TimeoutPolicy::new(Duration::from_secs(2)).unwrap())
//!     .retry(
//!         RetryPolicy::builder()
//!             .max_retries(3)
//!             .backoff(Backoff::exponential(Duration::from_millis(10)))
//!             .with_jitter(Jitter::Full)
//!             .build()
//!             .unwrap(),
//!     )
//!     .build();
//!
//! let result = stack
//!     .execute(&ExecutionContext::new(), |_ctx| async { Ok::<_, ResilienceError<Flaky>>(7) })
//!     .await;
//! assert_eq!(result.unwrap(), 7);
//! # });
//! ```

pub mod backoff;
pub mod bulkhead;
pub mod circuit_breaker;
pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod fallback;
pub mod jitter;
pub mod pipeline;
pub mod policy;
pub mod prelude;
pub mod presets;
pub mod retry;
pub mod service;
pub mod sleeper;
pub mod stack;
pub mod timeout;

pub use backoff::{Backoff, BackoffError, DelayProvider, MAX_BACKOFF};
pub use bulkhead::{BulkheadConfig, BulkheadError, BulkheadHealth, BulkheadPolicy};
pub use circuit_breaker::{
    CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerHealth, CircuitBreakerPolicy,
    CircuitState, TripMode,
};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{ConfigError, StackConfig};
pub use context::ExecutionContext;
pub use error::{ResilienceError, MAX_RETRY_FAILURES};
pub use fallback::FallbackPolicy;
pub use jitter::{Jitter, JitterError, JitteredBackoff};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use policy::{operation, BoxResultFuture, Operation, Policy};
pub use retry::{RetryBuildError, RetryConfig, RetryPolicy, RetryPolicyBuilder, MAX_RETRIES_LIMIT};
pub use service::{PipelineLayer, PipelineService};
pub use sleeper::{InstantSleeper, Sleeper, TokioSleeper, TrackingSleeper};
pub use stack::{ResilienceStack, ResilienceStackBuilder, StackHealth, TimeoutScope};
pub use timeout::{TimeoutConfig, TimeoutError, TimeoutPolicy, TimeoutStrategy, MAX_TIMEOUT};
