//! Execution context threaded through every policy layer.
//!
//! The context carries the caller's cancellation signal, an optional deadline, and an
//! optional correlation id. Policies never own it: they read it, derive children from it
//! (the pessimistic timeout does), and pass it inward to the operation.

use crate::ResilienceError;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation, deadline and correlation metadata for one logical call.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    token: CancellationToken,
    deadline: Option<Instant>,
    correlation_id: Option<String>,
}

impl ExecutionContext {
    /// A fresh context with its own cancellation token and no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an existing token so a caller can cancel the execution from outside.
    pub fn with_token(token: CancellationToken) -> Self {
        Self { token, deadline: None, correlation_id: None }
    }

    /// Attach an absolute deadline. An earlier existing deadline is kept.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    /// Attach a deadline `budget` from now.
    pub fn with_budget(self, budget: Duration) -> Self {
        let deadline = Instant::now() + budget;
        self.with_deadline(deadline)
    }

    /// Attach a correlation id for logs emitted by hooks and the operation.
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Derive a context whose token is cancelled when this one is, but which can also be
    /// cancelled on its own without affecting the parent.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
            correlation_id: self.correlation_id.clone(),
        }
    }

    /// The cancellation token observed by this context.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Signal cancellation to this context and every child derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline; `None` when no deadline is set.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline.map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// True once the token is cancelled or the deadline has passed.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Resolves when the token is cancelled or the deadline passes, whichever comes first.
    pub async fn cancelled(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }

    /// Fail fast with `Cancelled` if the context is already done.
    pub fn check<E>(&self) -> Result<(), ResilienceError<E>> {
        if self.is_cancelled() {
            Err(ResilienceError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Drive `fut` to completion unless the context is cancelled first. Cancellation wins
    /// ties.
    pub async fn run<T, E, F>(&self, fut: F) -> Result<T, ResilienceError<E>>
    where
        F: Future<Output = Result<T, ResilienceError<E>>>,
    {
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(ResilienceError::Cancelled),
            result = fut => result,
        }
    }
}
