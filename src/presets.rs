//! Pre-configured stacks for common dependency types.
//!
//! Each preset comes in two forms: `*_config()` returns the plain [`StackConfig`] so values
//! can be tweaked first, and the generic function returns a [`ResilienceStackBuilder`] ready
//! for a fallback or a shared breaker.
//!
//! ```rust
//! use bulwark::{presets, ExecutionContext, FallbackPolicy, ResilienceStack};
//!
//! #[derive(Debug)]
//! struct ApiError;
//! impl std::fmt::Display for ApiError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "api error") }
//! }
//! impl std::error::Error for ApiError {}
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let stack: ResilienceStack<String, ApiError> = presets::external_api()
//!     .unwrap()
//!     .fallback(FallbackPolicy::value("cached".to_string()))
//!     .build();
//! let out = stack
//!     .execute(&ExecutionContext::new(), |_| async { Ok("fresh".to_string()) })
//!     .await;
//! assert_eq!(out.unwrap(), "fresh");
//! # });
//! ```
//!
//! Retry counts are retries after the first call, so total attempts are one more.
//!
//! | preset             | timeout | retries / attempts | backoff, jitter          | breaker   | bulkhead |
//! |--------------------|---------|--------------------|--------------------------|-----------|----------|
//! | `web_service`      | 5s      | 2 / 3              | exponential 100ms, full  | 10 / 30s  | 100      |
//! | `external_api`     | 15s     | 4 / 5              | exponential 500ms, full  | 15 / 120s | 20       |
//! | `database_client`  | 10s     | none               |                          | 5 / 60s   | 50       |
//! | `fast_cache`       | 100ms   | none               |                          | none      | none     |
//! | `message_producer` | none    | 998 / 999          | exponential 200ms, full  | none      | 50       |

use crate::circuit_breaker::{CircuitBreakerConfig, TripMode};
use crate::config::{ConfigError, StackConfig};
use crate::retry::RetryConfig;
use crate::stack::{ResilienceStackBuilder, TimeoutScope};
use crate::timeout::TimeoutConfig;
use crate::{Backoff, BulkheadConfig, Jitter};
use std::time::Duration;

const WEB_SERVICE_TIMEOUT: Duration = Duration::from_secs(5);
const WEB_SERVICE_RETRIES: usize = 2;
const WEB_SERVICE_BACKOFF_BASE: Duration = Duration::from_millis(100);
const WEB_SERVICE_BREAKER_THRESHOLD: u32 = 10;
const WEB_SERVICE_BREAK: Duration = Duration::from_secs(30);
const WEB_SERVICE_PARALLEL: usize = 100;

const EXTERNAL_API_TIMEOUT: Duration = Duration::from_secs(15);
const EXTERNAL_API_RETRIES: usize = 4;
const EXTERNAL_API_BACKOFF_BASE: Duration = Duration::from_millis(500);
const EXTERNAL_API_BREAKER_THRESHOLD: u32 = 15;
const EXTERNAL_API_BREAK: Duration = Duration::from_secs(120);
const EXTERNAL_API_PARALLEL: usize = 20;

const DATABASE_TIMEOUT: Duration = Duration::from_secs(10);
const DATABASE_BREAKER_THRESHOLD: u32 = 5;
const DATABASE_BREAK: Duration = Duration::from_secs(60);
const DATABASE_PARALLEL: usize = 50;

const CACHE_TIMEOUT: Duration = Duration::from_millis(100);

// 999 attempts in total, just under `MAX_RETRIES_LIMIT`
const PRODUCER_RETRIES: usize = 998;
const PRODUCER_BACKOFF_BASE: Duration = Duration::from_millis(200);
const PRODUCER_PARALLEL: usize = 50;

fn consecutive_breaker(failure_threshold: u32, break_duration: Duration) -> CircuitBreakerConfig {
    CircuitBreakerConfig {
        mode: TripMode::Consecutive { failure_threshold },
        break_duration,
        ..CircuitBreakerConfig::default()
    }
}

fn timeout(duration: Duration) -> TimeoutConfig {
    TimeoutConfig { duration, ..TimeoutConfig::default() }
}

/// Internal HTTP services: a tight timeout, a couple of quick retries, and a wide bulkhead.
pub fn web_service_config() -> StackConfig {
    StackConfig {
        name: Some("web_service".into()),
        circuit_breaker: Some(consecutive_breaker(
            WEB_SERVICE_BREAKER_THRESHOLD,
            WEB_SERVICE_BREAK,
        )),
        timeout: Some(timeout(WEB_SERVICE_TIMEOUT)),
        timeout_scope: TimeoutScope::WholeCall,
        bulkhead: Some(BulkheadConfig { max_parallel: WEB_SERVICE_PARALLEL, max_queue: 0 }),
        retry: Some(RetryConfig {
            max_retries: WEB_SERVICE_RETRIES,
            backoff: Backoff::exponential(WEB_SERVICE_BACKOFF_BASE),
            jitter: Jitter::Full,
            retry_timeouts: true,
        }),
    }
}

pub fn web_service<T, E>() -> Result<ResilienceStackBuilder<T, E>, ConfigError>
where
    T: Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    web_service_config().builder()
}

/// Third-party HTTP APIs: slow, rate limited, and usually safe to retry.
///
/// The timeout covers the whole retry sequence, so a caller never waits more than 15s.
pub fn external_api_config() -> StackConfig {
    StackConfig {
        name: Some("external_api".into()),
        circuit_breaker: Some(consecutive_breaker(
            EXTERNAL_API_BREAKER_THRESHOLD,
            EXTERNAL_API_BREAK,
        )),
        timeout: Some(timeout(EXTERNAL_API_TIMEOUT)),
        timeout_scope: TimeoutScope::WholeCall,
        bulkhead: Some(BulkheadConfig { max_parallel: EXTERNAL_API_PARALLEL, max_queue: 0 }),
        retry: Some(RetryConfig {
            max_retries: EXTERNAL_API_RETRIES,
            backoff: Backoff::exponential(EXTERNAL_API_BACKOFF_BASE),
            jitter: Jitter::Full,
            retry_timeouts: true,
        }),
    }
}

pub fn external_api<T, E>() -> Result<ResilienceStackBuilder<T, E>, ConfigError>
where
    T: Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    external_api_config().builder()
}

/// Database clients. No retry: statements are often non-idempotent, so retrying belongs
/// to the application's transaction logic.
pub fn database_client_config() -> StackConfig {
    StackConfig {
        name: Some("database_client".into()),
        circuit_breaker: Some(consecutive_breaker(DATABASE_BREAKER_THRESHOLD, DATABASE_BREAK)),
        timeout: Some(timeout(DATABASE_TIMEOUT)),
        timeout_scope: TimeoutScope::WholeCall,
        bulkhead: Some(BulkheadConfig { max_parallel: DATABASE_PARALLEL, max_queue: 0 }),
        retry: None,
    }
}

pub fn database_client<T, E>() -> Result<ResilienceStackBuilder<T, E>, ConfigError>
where
    T: Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    database_client_config().builder()
}

/// Cache lookups: a short timeout and nothing else, so a slow cache fails fast and the
/// caller can go to the primary source.
pub fn fast_cache_config() -> StackConfig {
    StackConfig {
        name: Some("fast_cache".into()),
        timeout: Some(timeout(CACHE_TIMEOUT)),
        ..StackConfig::default()
    }
}

pub fn fast_cache<T, E>() -> Result<ResilienceStackBuilder<T, E>, ConfigError>
where
    T: Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    fast_cache_config().builder()
}

/// Message queue producers: keep retrying until the broker takes the message.
///
/// No timeout and no breaker, since a publish that is given up on is lost; the bulkhead
/// caps in-flight publishes.
pub fn message_producer_config() -> StackConfig {
    StackConfig {
        name: Some("message_producer".into()),
        bulkhead: Some(BulkheadConfig { max_parallel: PRODUCER_PARALLEL, max_queue: 0 }),
        retry: Some(RetryConfig {
            max_retries: PRODUCER_RETRIES,
            backoff: Backoff::exponential(PRODUCER_BACKOFF_BASE),
            jitter: Jitter::Full,
            retry_timeouts: true,
        }),
        ..StackConfig::default()
    }
}

pub fn message_producer<T, E>() -> Result<ResilienceStackBuilder<T, E>, ConfigError>
where
    T: Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    message_producer_config().builder()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ExecutionContext, ResilienceError, ResilienceStack};

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct TestError(String);

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "TestError: {}", self.0)
        }
    }

    impl std::error::Error for TestError {}

    #[test]
    fn every_preset_validates() {
        for config in [
            web_service_config(),
            external_api_config(),
            database_client_config(),
            fast_cache_config(),
            message_producer_config(),
        ] {
            assert!(config.validate().is_ok(), "{:?}", config.name);
        }
    }

    #[test]
    fn external_api_has_every_layer() {
        let stack: ResilienceStack<(), TestError> = external_api().unwrap().build();
        assert_eq!(stack.layers(), vec!["circuit_breaker", "timeout", "bulkhead", "retry"]);
        let health = stack.health();
        assert_eq!(health.bulkhead.map(|b| b.max_parallel), Some(EXTERNAL_API_PARALLEL));
    }

    #[test]
    fn retry_counts_exclude_the_first_call() {
        let attempts = |config: StackConfig| config.retry.map(|r| r.max_retries + 1);
        assert_eq!(attempts(web_service_config()), Some(3));
        assert_eq!(attempts(external_api_config()), Some(5));
        assert_eq!(attempts(message_producer_config()), Some(999));
    }

    #[test]
    fn web_service_has_every_layer() {
        let stack: ResilienceStack<(), TestError> = web_service().unwrap().build();
        assert_eq!(stack.layers(), vec!["circuit_breaker", "timeout", "bulkhead", "retry"]);
        let health = stack.health();
        assert_eq!(health.bulkhead.map(|b| b.max_parallel), Some(WEB_SERVICE_PARALLEL));
    }

    #[test]
    fn message_producer_has_no_timeout_or_breaker() {
        let config = message_producer_config();
        assert!(config.timeout.is_none());
        assert!(config.circuit_breaker.is_none());
        let stack: ResilienceStack<(), TestError> = message_producer().unwrap().build();
        assert_eq!(stack.layers(), vec!["bulkhead", "retry"]);
    }

    #[test]
    fn database_client_never_retries() {
        let config = database_client_config();
        assert!(config.retry.is_none());
        let stack: ResilienceStack<(), TestError> = database_client().unwrap().build();
        assert_eq!(stack.layers(), vec!["circuit_breaker", "timeout", "bulkhead"]);
    }

    #[tokio::test(start_paused = true)]
    async fn fast_cache_times_out_quickly() {
        let stack: ResilienceStack<u8, TestError> = fast_cache().unwrap().build();
        assert_eq!(stack.layers(), vec!["timeout"]);

        let result = stack
            .execute(&ExecutionContext::new(), |_| async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok(1)
            })
            .await;
        assert!(matches!(
            result,
            Err(ResilienceError::Timeout { timeout, .. }) if timeout == CACHE_TIMEOUT
        ));
    }

    #[test]
    fn presets_can_be_tweaked_before_building() {
        let mut config = external_api_config();
        config.timeout_scope = TimeoutScope::PerAttempt;
        config.bulkhead = None;
        let stack: ResilienceStack<(), TestError> = config.build().unwrap();
        assert_eq!(stack.layers(), vec!["circuit_breaker", "retry", "timeout"]);
    }
}
