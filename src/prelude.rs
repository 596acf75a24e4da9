//! Convenient re-exports for building stacks.
pub use crate::{
    operation, Backoff, BulkheadPolicy, CircuitBreakerPolicy, CircuitState, ExecutionContext,
    FallbackPolicy, Jitter, Pipeline, PipelineLayer, Policy, ResilienceError, ResilienceStack,
    RetryPolicy, StackConfig, TimeoutPolicy, TimeoutScope, TimeoutStrategy,
};
