//! Bulkhead with a bounded queue: two run, two wait in FIFO order, the rest are turned away.
use bulwark::{BulkheadPolicy, ExecutionContext, ResilienceError};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    let bulkhead = BulkheadPolicy::new(2, 2)?.on_reject(|| println!("rejected: bulkhead full"));

    let mut tasks = Vec::new();
    for id in 0..6u32 {
        let bh = bulkhead.clone();
        tasks.push(tokio::spawn(async move {
            let result = bh
                .execute(&ExecutionContext::new(), |_| async move {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    Ok::<_, ResilienceError<std::io::Error>>(id)
                })
                .await;
            (id, result)
        }));
        // stagger spawns so queue order is deterministic
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    println!("health while busy: {:?}", bulkhead.health());

    for task in tasks {
        match task.await? {
            (id, Ok(_)) => println!("request {id} completed"),
            (id, Err(err)) => println!("request {id} failed: {err}"),
        }
    }
    println!("rejected in total: {}", bulkhead.rejected_count());
    Ok(())
}
