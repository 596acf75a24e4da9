//! Plain-data configuration for a whole stack.
//!
//! `StackConfig` aggregates the per-policy configs so a stack can be described in a config
//! file (with the `serde` feature) and validated in one place. Absent sections mean the
//! layer is left out.
//!
//! ```rust
//! use bulwark::{BulkheadConfig, ResilienceStack, StackConfig, TimeoutConfig};
//! use std::time::Duration;
//!
//! #[derive(Debug)]
//! struct E;
//! impl std::fmt::Display for E { fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "e") } }
//! impl std::error::Error for E {}
//!
//! let config = StackConfig {
//!     timeout: Some(TimeoutConfig { duration: Duration::from_secs(2), ..Default::default() }),
//!     bulkhead: Some(BulkheadConfig { max_parallel: 8, max_queue: 16 }),
//!     ..Default::default()
//! };
//! let stack: ResilienceStack<u8, E> = config.build().unwrap();
//! assert_eq!(stack.layers(), vec!["timeout", "bulkhead"]);
//! ```

use crate::bulkhead::{BulkheadConfig, BulkheadError};
use crate::circuit_breaker::{CircuitBreakerConfig, CircuitBreakerError};
use crate::retry::{RetryBuildError, RetryConfig};
use crate::stack::{ResilienceStack, ResilienceStackBuilder, TimeoutScope};
use crate::timeout::{TimeoutConfig, TimeoutError};
use crate::{BulkheadPolicy, CircuitBreakerPolicy, RetryPolicy, TimeoutPolicy};

/// Any validation failure while turning a [`StackConfig`] into policies.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("circuit breaker: {0}")]
    CircuitBreaker(#[from] CircuitBreakerError),
    #[error("retry: {0}")]
    Retry(#[from] RetryBuildError),
    #[error("timeout: {0}")]
    Timeout(#[from] TimeoutError),
    #[error("bulkhead: {0}")]
    Bulkhead(#[from] BulkheadError),
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct StackConfig {
    /// Dependency name, used as the breaker's name in log events.
    pub name: Option<String>,
    pub circuit_breaker: Option<CircuitBreakerConfig>,
    pub timeout: Option<TimeoutConfig>,
    pub timeout_scope: TimeoutScope,
    pub bulkhead: Option<BulkheadConfig>,
    pub retry: Option<RetryConfig>,
}

impl StackConfig {
    /// Check every section without building anything.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(cb) = &self.circuit_breaker {
            cb.validate()?;
        }
        if let Some(t) = &self.timeout {
            TimeoutPolicy::from_config(t)?;
        }
        if let Some(b) = &self.bulkhead {
            BulkheadPolicy::from_config(b)?;
        }
        if let Some(r) = &self.retry {
            r.validate()?;
        }
        Ok(())
    }

    /// A stack builder with every configured layer, ready for further customisation
    /// (fallback, hooks, a shared breaker...).
    pub fn builder<T, E>(&self) -> Result<ResilienceStackBuilder<T, E>, ConfigError>
    where
        T: Send + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        let mut builder = ResilienceStackBuilder::new().timeout_scope(self.timeout_scope);
        if let Some(cb) = &self.circuit_breaker {
            let mut breaker = CircuitBreakerPolicy::with_config(cb.clone())?;
            if let Some(name) = &self.name {
                breaker = breaker.with_name(name.clone());
            }
            builder = builder.circuit_breaker(breaker);
        }
        if let Some(t) = &self.timeout {
            builder = builder.timeout(TimeoutPolicy::from_config(t)?);
        }
        if let Some(b) = &self.bulkhead {
            builder = builder.bulkhead(BulkheadPolicy::from_config(b)?);
        }
        if let Some(r) = &self.retry {
            builder = builder.retry(RetryPolicy::from_config(r)?);
        }
        Ok(builder)
    }

    pub fn build<T, E>(&self) -> Result<ResilienceStack<T, E>, ConfigError>
    where
        T: Send + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        Ok(self.builder()?.build())
    }
}
