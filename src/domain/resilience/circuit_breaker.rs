//! Circuit breaker with a rolling error-rate window
//!
//! Closed: calls pass and outcomes are counted in the rolling window. Once at
//! least `request_volume_threshold` calls were seen in the window and the error
//! percentage reaches `error_percent_threshold`, the circuit opens and calls are
//! rejected. After `sleep_window` one probe call is let through (half-open);
//! its success closes the circuit, its failure re-opens it.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use metrics::{counter, gauge};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tracing::{info, warn};

use crate::domain::DomainError;

/// Tunables of a circuit
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerConfig {
    /// Per-call budget for the guarded call
    pub timeout: Duration,
    /// Calls allowed in flight at once
    pub max_concurrent_requests: usize,
    /// Minimum calls in the window before the error rate is considered
    pub request_volume_threshold: u32,
    /// Cool-down before a probe is allowed
    pub sleep_window: Duration,
    /// Error percentage (0-100) that opens the circuit
    pub error_percent_threshold: u32,
    /// Length of the rolling statistics window
    pub rolling_window: Duration,
    /// Number of buckets the window is split into
    pub rolling_buckets: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(100),
            max_concurrent_requests: 100,
            request_volume_threshold: 20,
            sleep_window: Duration::from_secs(5),
            error_percent_threshold: 50,
            rolling_window: Duration::from_secs(10),
            rolling_buckets: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    start: Instant,
    successes: u32,
    failures: u32,
}

#[derive(Debug)]
struct RollingWindow {
    span: Duration,
    bucket_width: Duration,
    buckets: VecDeque<Bucket>,
}

impl RollingWindow {
    fn new(span: Duration, buckets: u32) -> Self {
        let buckets = buckets.max(1);

        Self {
            span,
            bucket_width: (span / buckets).max(Duration::from_millis(1)),
            buckets: VecDeque::with_capacity(buckets as usize),
        }
    }

    fn record(&mut self, now: Instant, success: bool) {
        self.prune(now);

        let stale = self
            .buckets
            .back()
            .is_none_or(|bucket| now.duration_since(bucket.start) >= self.bucket_width);

        if stale {
            self.buckets.push_back(Bucket {
                start: now,
                successes: 0,
                failures: 0,
            });
        }

        if let Some(current) = self.buckets.back_mut() {
            if success {
                current.successes += 1;
            } else {
                current.failures += 1;
            }
        }
    }

    /// (total calls, failed calls) still inside the window
    fn totals(&mut self, now: Instant) -> (u32, u32) {
        self.prune(now);

        self.buckets.iter().fold((0, 0), |(total, failed), b| {
            (total + b.successes + b.failures, failed + b.failures)
        })
    }

    fn prune(&mut self, now: Instant) {
        while let Some(front) = self.buckets.front() {
            if now.duration_since(front.start) >= self.span {
                self.buckets.pop_front();
            } else {
                break;
            }
        }
    }

    fn reset(&mut self) {
        self.buckets.clear();
    }
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
    window: RollingWindow,
}

/// Circuit breaker for one named backend route
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
    slots: Arc<Semaphore>,
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let window = RollingWindow::new(config.rolling_window, config.rolling_buckets);

        Self {
            name: name.into(),
            slots: Arc::new(Semaphore::new(config.max_concurrent_requests.max(1))),
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                opened_at: None,
                probe_in_flight: false,
                window,
            }),
            config,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Asks to run a guarded call.
    ///
    /// Returns a permit the caller must resolve with `success`/`failure`; a
    /// permit dropped unresolved counts as a failure. Rejections are
    /// `CircuitOpen` or a `Backend` error when the concurrency limit is hit.
    pub fn try_acquire(&self) -> Result<CircuitPermit<'_>, DomainError> {
        let slot = self.slots.clone().try_acquire_owned().map_err(|_| {
            DomainError::backend(format!("Circuit '{}' max concurrency reached", self.name))
        })?;

        let now = Instant::now();
        let mut inner = self.lock();

        let probe = match inner.state {
            CircuitState::Closed => false,
            CircuitState::Open => {
                let cooled_down = inner
                    .opened_at
                    .is_none_or(|opened| now.duration_since(opened) >= self.config.sleep_window);

                if !cooled_down || inner.probe_in_flight {
                    return Err(DomainError::circuit_open(&self.name));
                }

                self.transition(&mut inner, CircuitState::HalfOpen);
                inner.probe_in_flight = true;
                true
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    return Err(DomainError::circuit_open(&self.name));
                }

                inner.probe_in_flight = true;
                true
            }
        };

        Ok(CircuitPermit {
            breaker: self,
            probe,
            resolved: false,
            _slot: slot,
        })
    }

    fn record(&self, success: bool, probe: bool) {
        let now = Instant::now();
        let mut inner = self.lock();

        if probe {
            inner.probe_in_flight = false;

            if success {
                inner.window.reset();
                inner.opened_at = None;
                self.transition(&mut inner, CircuitState::Closed);
            } else {
                inner.opened_at = Some(now);
                self.transition(&mut inner, CircuitState::Open);
            }
            return;
        }

        inner.window.record(now, success);

        if inner.state != CircuitState::Closed || success {
            return;
        }

        let (total, failed) = inner.window.totals(now);
        let tripped = total >= self.config.request_volume_threshold
            && total > 0
            && u64::from(failed) * 100 >= u64::from(self.config.error_percent_threshold) * u64::from(total);

        if tripped {
            warn!(
                circuit = %self.name,
                total,
                failed,
                "Error threshold reached, opening circuit"
            );
            inner.opened_at = Some(now);
            self.transition(&mut inner, CircuitState::Open);
        }
    }

    fn transition(&self, inner: &mut Inner, to: CircuitState) {
        if inner.state == to {
            return;
        }

        info!(circuit = %self.name, from = inner.state.as_str(), to = to.as_str(), "Circuit state change");
        inner.state = to;

        counter!(
            "circuit_breaker_transitions_total",
            "circuit" => self.name.clone(),
            "to" => to.as_str()
        )
        .increment(1);
        gauge!("circuit_breaker_open", "circuit" => self.name.clone())
            .set(if to == CircuitState::Closed { 0.0 } else { 1.0 });
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Admission to run one guarded call
#[derive(Debug)]
pub struct CircuitPermit<'a> {
    breaker: &'a CircuitBreaker,
    probe: bool,
    resolved: bool,
    _slot: OwnedSemaphorePermit,
}

impl CircuitPermit<'_> {
    /// Whether this call is the half-open probe
    pub fn is_probe(&self) -> bool {
        self.probe
    }

    pub fn success(mut self) {
        self.resolved = true;
        self.breaker.record(true, self.probe);
    }

    pub fn failure(mut self) {
        self.resolved = true;
        self.breaker.record(false, self.probe);
    }
}

impl Drop for CircuitPermit<'_> {
    fn drop(&mut self) {
        if !self.resolved {
            self.breaker.record(false, self.probe);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            request_volume_threshold: 4,
            error_percent_threshold: 50,
            sleep_window: Duration::from_secs(5),
            rolling_window: Duration::from_secs(10),
            rolling_buckets: 10,
            max_concurrent_requests: 10,
            timeout: Duration::from_millis(100),
        }
    }

    fn fail(breaker: &CircuitBreaker, n: usize) {
        for _ in 0..n {
            breaker.try_acquire().unwrap().failure();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stays_closed_below_volume() {
        let breaker = CircuitBreaker::new("grpcServer", config());

        fail(&breaker, 3);

        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.try_acquire().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_at_threshold_and_rejects() {
        let breaker = CircuitBreaker::new("grpcServer", config());

        breaker.try_acquire().unwrap().success();
        breaker.try_acquire().unwrap().success();
        fail(&breaker, 2);

        assert_eq!(breaker.state(), CircuitState::Open);
        for _ in 0..5 {
            let err = breaker.try_acquire().unwrap_err();
            assert!(matches!(err, DomainError::CircuitOpen { .. }));
        }
    }

    #[tokio::test]
    async fn test_permit_debug_shows_probe_flag() {
        let breaker = CircuitBreaker::new("grpcServer", config());
        let permit = breaker.try_acquire().unwrap();

        assert!(format!("{:?}", permit).contains("probe: false"));
        permit.success();
    }

    #[tokio::test(start_paused = true)]
    async fn test_low_error_rate_stays_closed() {
        let breaker = CircuitBreaker::new("grpcServer", config());

        for _ in 0..7 {
            breaker.try_acquire().unwrap().success();
        }
        fail(&breaker, 3);

        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_probe_after_sleep_window() {
        let breaker = CircuitBreaker::new("grpcServer", config());
        fail(&breaker, 4);
        assert_eq!(breaker.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_secs(5)).await;

        let probe = breaker.try_acquire().unwrap();
        assert!(probe.is_probe());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        assert!(breaker.try_acquire().is_err());

        probe.success();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(!breaker.try_acquire().unwrap().is_probe());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_probe_reopens() {
        let breaker = CircuitBreaker::new("grpcServer", config());
        fail(&breaker, 4);

        tokio::time::advance(Duration::from_secs(6)).await;
        breaker.try_acquire().unwrap().failure();

        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(breaker.try_acquire().is_err());

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(breaker.try_acquire().unwrap().is_probe());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_probe_counts_as_failure() {
        let breaker = CircuitBreaker::new("grpcServer", config());
        fail(&breaker, 4);
        tokio::time::advance(Duration::from_secs(5)).await;

        drop(breaker.try_acquire().unwrap());

        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_old_failures_leave_the_window() {
        let breaker = CircuitBreaker::new("grpcServer", config());
        fail(&breaker, 3);

        tokio::time::advance(Duration::from_secs(11)).await;
        fail(&breaker, 1);

        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_limit() {
        let breaker = CircuitBreaker::new(
            "grpcServer",
            CircuitBreakerConfig {
                max_concurrent_requests: 1,
                ..config()
            },
        );

        let held = breaker.try_acquire().unwrap();
        let err = breaker.try_acquire().unwrap_err();
        assert!(err.to_string().contains("max concurrency"));

        held.success();
        assert!(breaker.try_acquire().is_ok());
    }
}
