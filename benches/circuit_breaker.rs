use bulwark::{
    CircuitBreakerConfig, CircuitBreakerPolicy, ExecutionContext, InstantSleeper, Pipeline,
    PipelineLayer, ResilienceError, ResilienceStack, RetryPolicy, TimeoutPolicy,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::time::Duration;
use tower::{service_fn, ServiceExt};
use tower_layer::Layer;

type IoResult<T> = Result<T, ResilienceError<std::io::Error>>;

fn boom() -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, "boom")
}

fn closed_breaker_success(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let breaker = CircuitBreakerPolicy::new(10, Duration::from_secs(30)).unwrap();
    let ctx = ExecutionContext::new();

    c.bench_function("circuit_breaker_closed_success", |b| {
        b.to_async(&rt).iter(|| async {
            let out: IoResult<u32> =
                breaker.execute(&ctx, |_| async { Ok(black_box(7)) }).await;
            black_box(out)
        });
    });
}

fn open_breaker_rejection(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let breaker = CircuitBreakerPolicy::new(1, Duration::from_secs(3600)).unwrap();
    let ctx = ExecutionContext::new();
    rt.block_on(async {
        let _: IoResult<()> = breaker.execute(&ctx, |_| async { Err(ResilienceError::Inner(boom())) }).await;
    });

    c.bench_function("circuit_breaker_open_rejection", |b| {
        b.to_async(&rt).iter(|| async {
            let out: IoResult<u32> = breaker.execute(&ctx, |_| async { Ok(1) }).await;
            black_box(out)
        });
    });
}

fn statistical_window_recording(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let config =
        CircuitBreakerConfig::statistical(0.9, 1_000, Duration::from_secs(10), Duration::from_secs(5))
            .unwrap();
    let breaker = CircuitBreakerPolicy::with_config(config).unwrap();
    let ctx = ExecutionContext::new();

    c.bench_function("circuit_breaker_statistical_mixed", |b| {
        let mut i = 0u64;
        b.to_async(&rt).iter(|| {
            i += 1;
            let fail = i % 4 == 0;
            let breaker = &breaker;
            let ctx = &ctx;
            async move {
                let out: IoResult<u64> = breaker
                    .execute(ctx, |_| async move {
                        if fail {
                            Err(ResilienceError::Inner(boom()))
                        } else {
                            Ok(1)
                        }
                    })
                    .await;
                black_box(out)
            }
        });
    });
}

fn full_stack_through_tower(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let stack: ResilienceStack<&'static str, std::io::Error> = ResilienceStack::builder()
        .circuit_breaker(CircuitBreakerPolicy::new(10, Duration::from_secs(30)).unwrap())
        .timeout(TimeoutPolicy::new(Duration::from_secs(1)).unwrap())
        .retry(RetryPolicy::builder().max_retries(2).with_sleeper(InstantSleeper).build().unwrap())
        .build();
    let pipeline: Pipeline<_, _> = stack.into_pipeline();
    let svc = PipelineLayer::new(pipeline)
        .layer(service_fn(|req: &'static str| async move { Ok::<_, std::io::Error>(req) }));

    c.bench_function("stack_tower_echo", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(svc.clone().oneshot(black_box("request")).await)
        });
    });
}

criterion_group!(
    benches,
    closed_breaker_success,
    open_breaker_rejection,
    statistical_window_recording,
    full_stack_through_tower
);
criterion_main!(benches);
