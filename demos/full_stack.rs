//! Full stack: fallback + breaker + timeout + bulkhead + retry around a flaky dependency.
//!
//! Run with `RUST_LOG`-style filtering via `tracing-subscriber`'s default formatter:
//! `cargo run --example full_stack`.
use bulwark::prelude::*;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    let breaker = CircuitBreakerPolicy::new(3, Duration::from_secs(5))?
        .with_name("inventory")
        .on_open(|err, after| println!("breaker opened after {after:?}: {err}"))
        .on_close(|| println!("breaker closed"));

    let stack: ResilienceStack<&'static str, io::Error> = ResilienceStack::builder()
        .fallback(FallbackPolicy::value("cached inventory").handle_if(|e| e.is_broken_circuit()))
        .circuit_breaker(breaker.clone())
        .timeout(TimeoutPolicy::new(Duration::from_secs(2))?)
        .bulkhead(BulkheadPolicy::new(32, 64)?)
        .retry(
            RetryPolicy::builder()
                .max_retries(3)
                .backoff(Backoff::exponential(Duration::from_millis(50)).with_max(Duration::from_secs(1))?)
                .with_jitter(Jitter::Equal)
                .on_retry(|retry, delay, err| println!("retry #{retry} in {delay:?} after {err}"))
                .build()?,
        )
        .build();

    let attempts = Arc::new(AtomicUsize::new(0));
    let flaky = {
        let attempts = attempts.clone();
        move |_ctx: ExecutionContext| {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ResilienceError::Inner(io::Error::new(io::ErrorKind::Other, "transient")))
                } else {
                    Ok("fresh inventory")
                }
            }
        }
    };
    let ctx = ExecutionContext::new().with_correlation_id("req-1");
    println!("first call: {}", stack.execute(&ctx, flaky).await?);

    for i in 0..3 {
        let outage = |_ctx: ExecutionContext| async {
            Err(ResilienceError::Inner(io::Error::new(io::ErrorKind::ConnectionRefused, "down")))
        };
        match stack.execute(&ExecutionContext::new(), outage).await {
            Ok(v) => println!("outage call {i}: {v}"),
            Err(e) => println!("outage call {i} failed: {e}"),
        }
    }

    let served = stack.execute(&ExecutionContext::new(), |_| async { Ok("unreachable") }).await?;
    println!("while open: {served}");
    println!("health: {:?}", stack.health());
    Ok(())
}
