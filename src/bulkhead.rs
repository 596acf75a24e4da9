//! Bulkhead implementation for concurrency limiting
//!
//! At most `max_parallel` operations run at once; up to `max_queue` further callers wait
//! in FIFO order for a slot, and everyone beyond that is rejected without the operation
//! ever running. Slots are permits of a fair `tokio::sync::Semaphore`: a released permit
//! goes straight to the longest waiter, so a newly arriving caller can never overtake the
//! queue.

use crate::policy::{Operation, Policy};
use crate::{ExecutionContext, ResilienceError};
use async_trait::async_trait;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Semaphore, SemaphorePermit, TryAcquireError};

/// Plain-data bulkhead settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BulkheadConfig {
    pub max_parallel: usize,
    pub max_queue: usize,
}

impl Default for BulkheadConfig {
    fn default() -> Self {
        Self { max_parallel: 10, max_queue: 0 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BulkheadError {
    #[error("max_parallel must be > 0")]
    ZeroParallel,
    #[error("max_parallel {provided} exceeds the semaphore limit of {limit}")]
    TooManyPermits { provided: usize, limit: usize },
}

/// Snapshot of bulkhead occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BulkheadHealth {
    pub active: usize,
    pub queued: usize,
    pub max_parallel: usize,
    pub max_queue: usize,
    /// Rejections since construction.
    pub rejected: u64,
}

#[derive(Debug)]
struct Shared {
    semaphore: Semaphore,
    max_parallel: usize,
    max_queue: usize,
    queued: AtomicUsize,
    rejected: AtomicU64,
}

/// Reserved place in the wait queue; given back when the wait ends for any reason.
struct QueueSlot<'a>(&'a AtomicUsize);

impl Drop for QueueSlot<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

type RejectHook = Arc<dyn Fn() + Send + Sync>;

/// Concurrency limiter. Clones share the same slots, queue and counters.
#[derive(Clone)]
pub struct BulkheadPolicy {
    shared: Arc<Shared>,
    on_reject: Option<RejectHook>,
}

impl std::fmt::Debug for BulkheadPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkheadPolicy").field("health", &self.health()).finish()
    }
}

impl BulkheadPolicy {
    pub fn new(max_parallel: usize, max_queue: usize) -> Result<Self, BulkheadError> {
        if max_parallel == 0 {
            return Err(BulkheadError::ZeroParallel);
        }
        if max_parallel > Semaphore::MAX_PERMITS {
            return Err(BulkheadError::TooManyPermits {
                provided: max_parallel,
                limit: Semaphore::MAX_PERMITS,
            });
        }
        Ok(Self {
            shared: Arc::new(Shared {
                semaphore: Semaphore::new(max_parallel),
                max_parallel,
                max_queue,
                queued: AtomicUsize::new(0),
                rejected: AtomicU64::new(0),
            }),
            on_reject: None,
        })
    }

    pub fn from_config(config: &BulkheadConfig) -> Result<Self, BulkheadError> {
        Self::new(config.max_parallel, config.max_queue)
    }

    /// Called every time a caller is turned away.
    pub fn on_reject<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_reject = Some(Arc::new(hook));
        self
    }

    /// Operations currently holding a slot.
    pub fn active_count(&self) -> usize {
        self.shared.max_parallel.saturating_sub(self.shared.semaphore.available_permits())
    }

    /// Callers currently waiting for a slot.
    pub fn queued_count(&self) -> usize {
        self.shared.queued.load(Ordering::SeqCst)
    }

    /// Cumulative number of rejected callers.
    pub fn rejected_count(&self) -> u64 {
        self.shared.rejected.load(Ordering::Relaxed)
    }

    pub fn health(&self) -> BulkheadHealth {
        BulkheadHealth {
            active: self.active_count(),
            queued: self.queued_count(),
            max_parallel: self.shared.max_parallel,
            max_queue: self.shared.max_queue,
            rejected: self.rejected_count(),
        }
    }

    pub async fn execute<T, E, Fut, Op>(
        &self,
        ctx: &ExecutionContext,
        operation: Op,
    ) -> Result<T, ResilienceError<E>>
    where
        Fut: Future<Output = Result<T, ResilienceError<E>>>,
        Op: FnOnce(ExecutionContext) -> Fut,
    {
        ctx.check()?;
        let _permit = self.acquire(ctx).await?;
        operation(ctx.clone()).await
    }

    async fn acquire<E>(
        &self,
        ctx: &ExecutionContext,
    ) -> Result<SemaphorePermit<'_>, ResilienceError<E>> {
        let shared = &*self.shared;
        match shared.semaphore.try_acquire() {
            Ok(permit) => return Ok(permit),
            Err(TryAcquireError::NoPermits) => {}
            Err(TryAcquireError::Closed) => return Err(self.reject()),
        }

        let reserved = shared.queued.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |q| {
            (q < shared.max_queue).then_some(q + 1)
        });
        if reserved.is_err() {
            return Err(self.reject());
        }
        let slot = QueueSlot(&shared.queued);
        tracing::debug!(
            queued = self.queued_count(),
            max_queue = shared.max_queue,
            "bulkhead full; waiting for a slot"
        );

        let acquired = tokio::select! {
            biased;
            _ = ctx.cancelled() => None,
            permit = shared.semaphore.acquire() => permit.ok(),
        };
        drop(slot);
        match acquired {
            Some(permit) => Ok(permit),
            None if ctx.is_cancelled() => Err(ResilienceError::Cancelled),
            None => Err(self.reject()),
        }
    }

    fn reject<E>(&self) -> ResilienceError<E> {
        self.shared.rejected.fetch_add(1, Ordering::Relaxed);
        let health = self.health();
        tracing::warn!(
            active = health.active,
            queued = health.queued,
            max_parallel = health.max_parallel,
            max_queue = health.max_queue,
            "bulkhead rejected call"
        );
        if let Some(hook) = &self.on_reject {
            if catch_unwind(AssertUnwindSafe(|| hook())).is_err() {
                tracing::warn!(hook = "on_reject", "bulkhead hook panicked");
            }
        }
        ResilienceError::BulkheadRejected {
            active: health.active,
            queued: health.queued,
            max_parallel: health.max_parallel,
            max_queue: health.max_queue,
        }
    }
}

#[async_trait]
impl<T, E> Policy<T, E> for BulkheadPolicy
where
    T: Send + 'static,
    E: Send + Sync + 'static,
{
    async fn call(
        &self,
        ctx: ExecutionContext,
        next: Operation<T, E>,
    ) -> Result<T, ResilienceError<E>> {
        self.execute(&ctx, |ctx| next(ctx)).await
    }

    fn name(&self) -> &'static str {
        "bulkhead"
    }
}
