use bulwark::{
    CircuitBreakerPolicy, CircuitState, FallbackPolicy, InstantSleeper, PipelineLayer,
    ResilienceError, ResilienceStack, RetryPolicy, TimeoutPolicy,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::{service_fn, ServiceBuilder, ServiceExt};
use tower_layer::Layer;

#[derive(Debug, Clone, PartialEq, Eq)]
struct UpstreamError(u16);

impl std::fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "upstream returned {}", self.0)
    }
}

impl std::error::Error for UpstreamError {}

#[tokio::test]
async fn stack_pipeline_guards_a_tower_service() {
    let breaker = CircuitBreakerPolicy::new(1, Duration::from_secs(60)).unwrap();
    let stack: ResilienceStack<String, UpstreamError> = ResilienceStack::builder()
        .fallback(
            FallbackPolicy::value("stale".to_string()).handle_if(|e| e.is_broken_circuit()),
        )
        .circuit_breaker(breaker.clone())
        .retry(RetryPolicy::builder().max_retries(1).with_sleeper(InstantSleeper).build().unwrap())
        .build();

    let hits = Arc::new(AtomicUsize::new(0));
    let h = hits.clone();
    let svc = ServiceBuilder::new().layer(PipelineLayer::new(stack.into_pipeline())).service(
        service_fn(move |path: &'static str| {
            h.fetch_add(1, Ordering::SeqCst);
            async move {
                if path == "/ok" {
                    Ok(format!("200 {path}"))
                } else {
                    Err(UpstreamError(503))
                }
            }
        }),
    );

    assert_eq!(svc.clone().oneshot("/ok").await.unwrap(), "200 /ok");

    let err = svc.clone().oneshot("/down").await.unwrap_err();
    assert!(err.is_retry_exhausted());
    assert_eq!(breaker.state(), CircuitState::Open);
    assert_eq!(hits.load(Ordering::SeqCst), 3);

    assert_eq!(svc.oneshot("/ok").await.unwrap(), "stale");
    assert_eq!(hits.load(Ordering::SeqCst), 3, "open breaker short-circuits the service");
}

#[tokio::test(start_paused = true)]
async fn slow_service_times_out() {
    let stack: ResilienceStack<(), UpstreamError> = ResilienceStack::builder()
        .timeout(TimeoutPolicy::new(Duration::from_millis(200)).unwrap())
        .build();
    let svc = PipelineLayer::new(stack.into_pipeline()).layer(service_fn(|_: ()| async {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok::<_, UpstreamError>(())
    }));

    match svc.oneshot(()).await {
        Err(ResilienceError::Timeout { timeout, .. }) => {
            assert_eq!(timeout, Duration::from_millis(200))
        }
        other => panic!("expected timeout, got {other:?}"),
    }
}
