//! Circuit breaker built on an atomically swapped state snapshot
//!
//! All mutable breaker state (`CircuitState`, failure window, `opened_at`, the half-open
//! probe slot and a transition generation) lives in one immutable [`Snapshot`]. Every
//! change is computed by a pure function of `(snapshot, event, now)` and published with an
//! `ArcSwap` read-copy-update, so the triple is always updated as one unit and two callers
//! racing to report the tripping failure cannot both open the circuit.

use crate::clock::{Clock, MonotonicClock};
use crate::policy::{Operation, Policy};
use crate::{ExecutionContext, ResilienceError};
use arc_swap::ArcSwap;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

/// Current state of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum CircuitState {
    /// Normal operating mode.
    Closed,
    /// Short-circuits calls until the break duration elapses.
    Open,
    /// One probe call is testing recovery.
    HalfOpen,
}

/// When a closed breaker trips.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum TripMode {
    /// Trip after `failure_threshold` consecutive failures.
    Consecutive { failure_threshold: u32 },
    /// Trip when, within the trailing `sampling_duration`, at least `minimum_throughput`
    /// calls were recorded and the failure ratio reached `failure_rate_threshold`.
    Statistical {
        failure_rate_threshold: f64,
        minimum_throughput: u32,
        sampling_duration: Duration,
        /// Number of buckets the sampling duration is split into.
        buckets: u32,
    },
}

/// Number of buckets a statistical window uses unless told otherwise.
pub const DEFAULT_WINDOW_BUCKETS: u32 = 10;

/// Circuit breaker configuration.
///
/// Defaults: trip after 5 consecutive failures, stay open for 30s, count timeouts and
/// bulkhead rejections as failures.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CircuitBreakerConfig {
    pub mode: TripMode,
    /// How long the breaker stays open before admitting a probe.
    pub break_duration: Duration,
    /// Count `Timeout` errors from inner layers as failures.
    pub count_timeouts: bool,
    /// Count `BulkheadRejected` errors from inner layers as failures.
    pub count_rejections: bool,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            mode: TripMode::Consecutive { failure_threshold: 5 },
            break_duration: Duration::from_secs(30),
            count_timeouts: true,
            count_rejections: true,
        }
    }
}

/// Errors produced when validating breaker configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CircuitBreakerError {
    #[error("failure_threshold must be > 0 (got {provided})")]
    InvalidFailureThreshold { provided: u32 },
    #[error("failure_rate_threshold must be in (0, 1] (got {provided})")]
    InvalidFailureRate { provided: f64 },
    #[error("minimum_throughput must be > 0 (got {provided})")]
    InvalidMinimumThroughput { provided: u32 },
    #[error("sampling_duration must be at least one millisecond per bucket (got {sampling:?} over {buckets} buckets)")]
    InvalidSamplingWindow { sampling: Duration, buckets: u32 },
    #[error("break_duration must be at least one millisecond (got {0:?})")]
    InvalidBreakDuration(Duration),
}

impl CircuitBreakerConfig {
    /// Consecutive-failure breaker.
    pub fn consecutive(
        failure_threshold: u32,
        break_duration: Duration,
    ) -> Result<Self, CircuitBreakerError> {
        let cfg = Self {
            mode: TripMode::Consecutive { failure_threshold },
            break_duration,
            ..Self::default()
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Failure-rate breaker over a sliding window split into [`DEFAULT_WINDOW_BUCKETS`].
    pub fn statistical(
        failure_rate_threshold: f64,
        minimum_throughput: u32,
        sampling_duration: Duration,
        break_duration: Duration,
    ) -> Result<Self, CircuitBreakerError> {
        let cfg = Self {
            mode: TripMode::Statistical {
                failure_rate_threshold,
                minimum_throughput,
                sampling_duration,
                buckets: DEFAULT_WINDOW_BUCKETS,
            },
            break_duration,
            ..Self::default()
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Whether timeouts count as failures.
    pub fn count_timeouts(mut self, yes: bool) -> Self {
        self.count_timeouts = yes;
        self
    }

    /// Whether bulkhead rejections count as failures.
    pub fn count_rejections(mut self, yes: bool) -> Self {
        self.count_rejections = yes;
        self
    }

    pub fn validate(&self) -> Result<(), CircuitBreakerError> {
        match self.mode {
            TripMode::Consecutive { failure_threshold } => {
                if failure_threshold == 0 {
                    return Err(CircuitBreakerError::InvalidFailureThreshold { provided: 0 });
                }
            }
            TripMode::Statistical {
                failure_rate_threshold,
                minimum_throughput,
                sampling_duration,
                buckets,
            } => {
                if !(failure_rate_threshold > 0.0 && failure_rate_threshold <= 1.0) {
                    return Err(CircuitBreakerError::InvalidFailureRate {
                        provided: failure_rate_threshold,
                    });
                }
                if minimum_throughput == 0 {
                    return Err(CircuitBreakerError::InvalidMinimumThroughput { provided: 0 });
                }
                if buckets == 0 || sampling_duration.as_millis() < u128::from(buckets) {
                    return Err(CircuitBreakerError::InvalidSamplingWindow {
                        sampling: sampling_duration,
                        buckets,
                    });
                }
            }
        }
        // the clock ticks in whole milliseconds
        if self.break_duration < Duration::from_millis(1) {
            return Err(CircuitBreakerError::InvalidBreakDuration(self.break_duration));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Bucket {
    start: u64,
    successes: u32,
    failures: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SlidingWindow {
    buckets: VecDeque<Bucket>,
    bucket_millis: u64,
    window_millis: u64,
}

impl SlidingWindow {
    fn new(sampling_duration: Duration, buckets: u32) -> Self {
        let window_millis = u64::try_from(sampling_duration.as_millis()).unwrap_or(u64::MAX);
        let bucket_millis = (window_millis / u64::from(buckets.max(1))).max(1);
        Self { buckets: VecDeque::with_capacity(buckets as usize + 1), bucket_millis, window_millis }
    }

    fn prune(&mut self, now: u64) {
        while let Some(front) = self.buckets.front() {
            if front.start.saturating_add(self.window_millis) <= now {
                self.buckets.pop_front();
            } else {
                break;
            }
        }
    }

    fn record(&mut self, now: u64, failed: bool) {
        self.prune(now);
        let start = now - now % self.bucket_millis;
        if self.buckets.back().map_or(true, |last| last.start != start) {
            self.buckets.push_back(Bucket { start, successes: 0, failures: 0 });
        }
        let Some(bucket) = self.buckets.back_mut() else {
            return;
        };
        if failed {
            bucket.failures = bucket.failures.saturating_add(1);
        } else {
            bucket.successes = bucket.successes.saturating_add(1);
        }
    }

    /// (failures, total) over buckets still inside the window at `now`.
    fn totals(&self, now: u64) -> (u32, u32) {
        self.buckets
            .iter()
            .filter(|b| b.start.saturating_add(self.window_millis) > now)
            .fold((0u32, 0u32), |(f, t), b| {
                (f.saturating_add(b.failures), t.saturating_add(b.failures + b.successes))
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FailureWindow {
    Consecutive { failures: u32 },
    Sliding(SlidingWindow),
}

impl FailureWindow {
    fn empty(mode: &TripMode) -> Self {
        match *mode {
            TripMode::Consecutive { .. } => FailureWindow::Consecutive { failures: 0 },
            TripMode::Statistical { sampling_duration, buckets, .. } => {
                FailureWindow::Sliding(SlidingWindow::new(sampling_duration, buckets))
            }
        }
    }

    fn failures(&self, now: u64) -> u32 {
        match self {
            FailureWindow::Consecutive { failures } => *failures,
            FailureWindow::Sliding(w) => w.totals(now).0,
        }
    }

    fn samples(&self, now: u64) -> u32 {
        match self {
            FailureWindow::Consecutive { failures } => *failures,
            FailureWindow::Sliding(w) => w.totals(now).1,
        }
    }
}

/// Immutable view of a breaker; replaced wholesale on every change.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Snapshot {
    state: CircuitState,
    window: FailureWindow,
    opened_at: u64,
    probe_in_flight: bool,
    /// Bumped on every state transition; outcomes from older generations are dropped.
    generation: u64,
}

impl Snapshot {
    fn closed(mode: &TripMode, generation: u64) -> Self {
        Self {
            state: CircuitState::Closed,
            window: FailureWindow::empty(mode),
            opened_at: 0,
            probe_in_flight: false,
            generation,
        }
    }

    fn opened(&self, mode: &TripMode, now: u64) -> Self {
        Self {
            state: CircuitState::Open,
            window: FailureWindow::empty(mode),
            opened_at: now,
            probe_in_flight: false,
            generation: self.generation + 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Success,
    Failure,
    /// Neither counted nor held against the dependency (caller cancellation, uncounted
    /// error kinds, dropped probe).
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Admit { generation: u64, probe: bool },
    Reject { retry_after: Duration },
}

fn break_millis(config: &CircuitBreakerConfig) -> u64 {
    u64::try_from(config.break_duration.as_millis()).unwrap_or(u64::MAX)
}

/// Decide whether a call may proceed; returns the replacement snapshot when admission
/// itself changes state (Open → HalfOpen, or claiming the probe slot).
fn admit(snap: &Snapshot, config: &CircuitBreakerConfig, now: u64) -> (Admission, Option<Snapshot>) {
    match snap.state {
        CircuitState::Closed => {
            (Admission::Admit { generation: snap.generation, probe: false }, None)
        }
        CircuitState::Open => {
            let elapsed = now.saturating_sub(snap.opened_at);
            let break_ms = break_millis(config);
            if elapsed >= break_ms {
                let next = Snapshot {
                    state: CircuitState::HalfOpen,
                    window: snap.window.clone(),
                    opened_at: snap.opened_at,
                    probe_in_flight: true,
                    generation: snap.generation + 1,
                };
                (Admission::Admit { generation: next.generation, probe: true }, Some(next))
            } else {
                let retry_after = Duration::from_millis(break_ms - elapsed);
                (Admission::Reject { retry_after }, None)
            }
        }
        CircuitState::HalfOpen => {
            if snap.probe_in_flight {
                (Admission::Reject { retry_after: Duration::ZERO }, None)
            } else {
                let next = Snapshot { probe_in_flight: true, ..snap.clone() };
                (Admission::Admit { generation: snap.generation, probe: true }, Some(next))
            }
        }
    }
}

/// Apply one call outcome; `None` means the snapshot stays as it is.
fn record(
    snap: &Snapshot,
    config: &CircuitBreakerConfig,
    outcome: Outcome,
    generation: u64,
    now: u64,
) -> Option<Snapshot> {
    if snap.generation != generation {
        return None;
    }
    match (snap.state, outcome) {
        (CircuitState::Open, _) => None,
        (CircuitState::Closed, Outcome::Ignored) => None,
        (CircuitState::Closed, Outcome::Success) => match &snap.window {
            FailureWindow::Consecutive { failures: 0 } => None,
            FailureWindow::Consecutive { .. } => Some(Snapshot {
                window: FailureWindow::Consecutive { failures: 0 },
                ..snap.clone()
            }),
            FailureWindow::Sliding(w) => {
                let mut w = w.clone();
                w.record(now, false);
                Some(Snapshot { window: FailureWindow::Sliding(w), ..snap.clone() })
            }
        },
        (CircuitState::Closed, Outcome::Failure) => {
            let (window, trips) = match (&snap.window, config.mode) {
                (
                    FailureWindow::Consecutive { failures },
                    TripMode::Consecutive { failure_threshold },
                ) => {
                    let failures = failures.saturating_add(1);
                    (FailureWindow::Consecutive { failures }, failures >= failure_threshold)
                }
                (
                    FailureWindow::Sliding(w),
                    TripMode::Statistical { failure_rate_threshold, minimum_throughput, .. },
                ) => {
                    let mut w = w.clone();
                    w.record(now, true);
                    let (failed, total) = w.totals(now);
                    let trips = total >= minimum_throughput
                        && f64::from(failed) / f64::from(total) >= failure_rate_threshold;
                    (FailureWindow::Sliding(w), trips)
                }
                // window shape always follows the configured mode
                (window, _) => (window.clone(), false),
            };
            if trips {
                Some(snap.opened(&config.mode, now))
            } else {
                Some(Snapshot { window, ..snap.clone() })
            }
        }
        (CircuitState::HalfOpen, Outcome::Success) => {
            Some(Snapshot::closed(&config.mode, snap.generation + 1))
        }
        (CircuitState::HalfOpen, Outcome::Failure) => Some(snap.opened(&config.mode, now)),
        (CircuitState::HalfOpen, Outcome::Ignored) => {
            Some(Snapshot { probe_in_flight: false, ..snap.clone() })
        }
    }
}

type OpenHook = Arc<dyn Fn(&(dyn std::error::Error + 'static), Duration) + Send + Sync>;
type StateHook = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone, Default)]
struct BreakerHooks {
    on_open: Option<OpenHook>,
    on_close: Option<StateHook>,
    on_half_open: Option<StateHook>,
}

/// Point-in-time view of a breaker for health checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CircuitBreakerHealth {
    pub state: CircuitState,
    /// Consecutive failures, or failures inside the sliding window.
    pub failures: u32,
    /// Calls recorded in the sliding window (equals `failures` in consecutive mode).
    pub samples: u32,
    /// Time until an open breaker admits its probe.
    pub retry_after: Option<Duration>,
}

/// Circuit breaker policy guarding an async operation.
///
/// Clones share the same underlying state via `Arc`, so all handles observe and affect the
/// same circuit lifecycle. Create one per logical dependency and hand clones to callers.
#[derive(Clone)]
pub struct CircuitBreakerPolicy {
    state: Arc<ArcSwap<Snapshot>>,
    config: Arc<CircuitBreakerConfig>,
    clock: Arc<dyn Clock>,
    hooks: BreakerHooks,
    name: Arc<str>,
}

impl std::fmt::Debug for CircuitBreakerPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreakerPolicy")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("config", &self.config)
            .finish()
    }
}

impl CircuitBreakerPolicy {
    /// Consecutive-failure breaker.
    ///
    /// # Examples
    /// ```
    /// use bulwark::CircuitBreakerPolicy;
    /// use std::time::Duration;
    /// let breaker = CircuitBreakerPolicy::new(5, Duration::from_secs(30)).unwrap();
    /// ```
    pub fn new(failure_threshold: u32, break_duration: Duration) -> Result<Self, CircuitBreakerError> {
        Self::with_config(CircuitBreakerConfig::consecutive(failure_threshold, break_duration)?)
    }

    /// Create a breaker from an explicit config, validating the values.
    pub fn with_config(config: CircuitBreakerConfig) -> Result<Self, CircuitBreakerError> {
        config.validate()?;
        Ok(Self {
            state: Arc::new(ArcSwap::from_pointee(Snapshot::closed(&config.mode, 0))),
            config: Arc::new(config),
            clock: Arc::new(MonotonicClock::default()),
            hooks: BreakerHooks::default(),
            name: Arc::from("circuit_breaker"),
        })
    }

    /// Override the clock (useful for deterministic tests).
    pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Name reported in log events; usually the dependency being guarded.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Arc::from(name.into());
        self
    }

    /// Called with the tripping error and the break duration on every transition to Open.
    pub fn on_open<F>(mut self, f: F) -> Self
    where
        F: Fn(&(dyn std::error::Error + 'static), Duration) + Send + Sync + 'static,
    {
        self.hooks.on_open = Some(Arc::new(f));
        self
    }

    /// Called on every transition to Closed.
    pub fn on_close<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.hooks.on_close = Some(Arc::new(f));
        self
    }

    /// Called on every transition to HalfOpen.
    pub fn on_half_open<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.hooks.on_half_open = Some(Arc::new(f));
        self
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state. An open breaker whose break duration has elapsed still reports
    /// `Open` until the next call claims the probe.
    pub fn state(&self) -> CircuitState {
        self.state.load().state
    }

    pub fn health(&self) -> CircuitBreakerHealth {
        let snap = self.state.load();
        let now = self.clock.now_millis();
        let retry_after = match snap.state {
            CircuitState::Open => {
                let elapsed = now.saturating_sub(snap.opened_at);
                Some(Duration::from_millis(break_millis(&self.config).saturating_sub(elapsed)))
            }
            _ => None,
        };
        CircuitBreakerHealth {
            state: snap.state,
            failures: snap.window.failures(now),
            samples: snap.window.samples(now),
            retry_after,
        }
    }

    /// Force the breaker closed with an empty window.
    pub fn reset(&self) {
        let prev = self.state.rcu(|cur| Snapshot::closed(&self.config.mode, cur.generation + 1));
        if prev.state != CircuitState::Closed {
            tracing::info!(breaker = %self.name, "circuit breaker reset → closed");
            self.fire(self.hooks.on_close.as_ref(), "on_close");
        }
    }

    /// Executes the operation under circuit breaker protection.
    ///
    /// # Behavior
    /// - **Closed**: runs the operation and records its outcome.
    /// - **Open**: rejects with `ResilienceError::BrokenCircuit` until the break duration
    ///   elapses; then the next caller becomes the single half-open probe.
    /// - **HalfOpen**: rejects everyone except the probe. Probe success closes the circuit,
    ///   probe failure reopens it with a fresh break duration.
    pub async fn execute<T, E, Fut, Op>(
        &self,
        ctx: &ExecutionContext,
        operation: Op,
    ) -> Result<T, ResilienceError<E>>
    where
        E: std::error::Error + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ResilienceError<E>>>,
        Op: FnOnce(ExecutionContext) -> Fut,
    {
        ctx.check()?;
        let mut permit = self.acquire()?;
        let result = operation(ctx.clone()).await;
        permit.settle(&result);
        result
    }

    fn acquire<E>(&self) -> Result<CallPermit<'_>, ResilienceError<E>> {
        let now = self.clock.now_millis();
        let prev = self.state.rcu(|cur| match admit(cur, &self.config, now) {
            (_, Some(next)) => Arc::new(next),
            (_, None) => Arc::clone(cur),
        });
        let (admission, changed) = admit(&prev, &self.config, now);
        match admission {
            Admission::Reject { retry_after } => {
                tracing::trace!(breaker = %self.name, ?retry_after, "circuit breaker rejected call");
                Err(ResilienceError::BrokenCircuit { retry_after })
            }
            Admission::Admit { generation, probe } => {
                if prev.state == CircuitState::Open && changed.is_some() {
                    tracing::info!(breaker = %self.name, "circuit breaker → half-open");
                    self.fire(self.hooks.on_half_open.as_ref(), "on_half_open");
                }
                Ok(CallPermit { breaker: self, generation, probe, settled: false })
            }
        }
    }

    fn classify<T, E>(&self, result: &Result<T, ResilienceError<E>>) -> Outcome {
        match result {
            Ok(_) => Outcome::Success,
            Err(ResilienceError::Cancelled) => Outcome::Ignored,
            Err(ResilienceError::Timeout { .. }) if !self.config.count_timeouts => Outcome::Ignored,
            Err(ResilienceError::BulkheadRejected { .. }) if !self.config.count_rejections => {
                Outcome::Ignored
            }
            Err(_) => Outcome::Failure,
        }
    }

    fn report(
        &self,
        outcome: Outcome,
        generation: u64,
        cause: Option<&(dyn std::error::Error + 'static)>,
    ) {
        let now = self.clock.now_millis();
        let prev = self.state.rcu(|cur| match record(cur, &self.config, outcome, generation, now) {
            Some(next) => Arc::new(next),
            None => Arc::clone(cur),
        });
        let Some(next) = record(&prev, &self.config, outcome, generation, now) else {
            return;
        };
        match (prev.state, next.state) {
            (CircuitState::Closed, CircuitState::Open) => {
                tracing::error!(
                    breaker = %self.name,
                    failures = prev.window.failures(now) + 1,
                    break_duration = ?self.config.break_duration,
                    "circuit breaker → open"
                );
                self.fire_open(cause);
            }
            (CircuitState::HalfOpen, CircuitState::Open) => {
                tracing::warn!(breaker = %self.name, "circuit breaker probe failed → open");
                self.fire_open(cause);
            }
            (CircuitState::HalfOpen, CircuitState::Closed) => {
                tracing::info!(breaker = %self.name, "circuit breaker → closed");
                self.fire(self.hooks.on_close.as_ref(), "on_close");
            }
            _ => {}
        }
    }

    fn fire_open(&self, cause: Option<&(dyn std::error::Error + 'static)>) {
        let (Some(hook), Some(cause)) = (self.hooks.on_open.as_ref(), cause) else {
            return;
        };
        let duration = self.config.break_duration;
        if catch_unwind(AssertUnwindSafe(|| hook(cause, duration))).is_err() {
            tracing::warn!(breaker = %self.name, hook = "on_open", "circuit breaker hook panicked");
        }
    }

    fn fire(&self, hook: Option<&StateHook>, which: &'static str) {
        let Some(hook) = hook else {
            return;
        };
        if catch_unwind(AssertUnwindSafe(|| hook())).is_err() {
            tracing::warn!(breaker = %self.name, hook = which, "circuit breaker hook panicked");
        }
    }
}

/// Admission ticket for one call. A probe that is dropped without settling (its future was
/// cancelled) gives the probe slot back so the next caller can test recovery.
struct CallPermit<'a> {
    breaker: &'a CircuitBreakerPolicy,
    generation: u64,
    probe: bool,
    settled: bool,
}

impl CallPermit<'_> {
    fn settle<T, E>(&mut self, result: &Result<T, ResilienceError<E>>)
    where
        E: std::error::Error + 'static,
    {
        self.settled = true;
        let outcome = self.breaker.classify(result);
        let cause = result.as_ref().err().map(|e| e as &(dyn std::error::Error + 'static));
        self.breaker.report(outcome, self.generation, cause);
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if !self.settled && self.probe {
            self.breaker.report(Outcome::Ignored, self.generation, None);
        }
    }
}

#[async_trait]
impl<T, E> Policy<T, E> for CircuitBreakerPolicy
where
    T: Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    async fn call(
        &self,
        ctx: ExecutionContext,
        next: Operation<T, E>,
    ) -> Result<T, ResilienceError<E>> {
        self.execute(&ctx, |ctx| next(ctx)).await
    }

    fn name(&self) -> &'static str {
        "circuit_breaker"
    }
}
