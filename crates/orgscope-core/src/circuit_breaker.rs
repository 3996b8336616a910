use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::error::{UpstreamError, UpstreamErrorKind};
use crate::http_client::{HttpClient, HttpFuture, HttpRequest};
use crate::messages::ErrorMessage;

/// Runtime circuit state for upstream API calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

/// Circuit breaker thresholds and timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub open_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug)]
struct CircuitInner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
}

impl Default for CircuitInner {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            probe_in_flight: false,
        }
    }
}

/// Thread-safe circuit breaker.
///
/// Half-open admits exactly one trial call; everything else arriving while the trial
/// is outstanding is rejected as if the circuit were still open.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<CircuitInner>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(CircuitInner::default()),
        }
    }

    pub const fn config(&self) -> CircuitBreakerConfig {
        self.config
    }

    /// Admission without a permit; the caller must record an outcome or call
    /// [`release_probe`](Self::release_probe) itself.
    pub fn allow_request(&self) -> bool {
        self.admit().is_some()
    }

    /// Admits a call and returns the permit its outcome is reported through.
    ///
    /// A half-open trial slot held by the permit is given back when the permit is
    /// dropped without an outcome, so an abandoned trial never wedges the circuit.
    pub fn try_acquire(&self) -> Option<CircuitPermit<'_>> {
        self.admit().map(|probe| CircuitPermit {
            breaker: self,
            probe,
        })
    }

    /// `Some(true)` when the admitted call is the half-open trial.
    fn admit(&self) -> Option<bool> {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => Some(false),
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    None
                } else {
                    inner.probe_in_flight = true;
                    Some(true)
                }
            }
            CircuitState::Open => {
                let can_probe = inner
                    .opened_at
                    .map(|opened_at| opened_at.elapsed() >= self.config.open_timeout)
                    .unwrap_or(false);

                if can_probe {
                    inner.state = CircuitState::HalfOpen;
                    inner.opened_at = None;
                    inner.probe_in_flight = true;
                    tracing::info!("circuit.half_open");
                    Some(true)
                } else {
                    None
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.lock();
        if inner.state != CircuitState::Closed {
            tracing::info!(previous = inner.state.as_str(), "circuit.closed");
        }
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.probe_in_flight = false;
    }

    pub fn record_failure(&self) {
        let mut inner = self.lock();
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        inner.probe_in_flight = false;

        let reopen = inner.state == CircuitState::HalfOpen;
        let trip = inner.state == CircuitState::Closed
            && inner.consecutive_failures >= self.config.failure_threshold;

        if reopen || trip {
            inner.state = CircuitState::Open;
            inner.opened_at = Some(Instant::now());
            tracing::warn!(
                consecutive_failures = inner.consecutive_failures,
                open_for_ms = u64::try_from(self.config.open_timeout.as_millis()).unwrap_or(u64::MAX),
                "circuit.opened"
            );
        }
    }

    /// Gives back a half-open trial slot without judging the dependency.
    pub fn release_probe(&self) {
        self.lock().probe_in_flight = false;
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    fn lock(&self) -> MutexGuard<'_, CircuitInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One admitted call. Report the outcome with [`success`](Self::success) or
/// [`failure`](Self::failure); dropping it instead counts as neither.
#[must_use]
#[derive(Debug)]
pub struct CircuitPermit<'a> {
    breaker: &'a CircuitBreaker,
    probe: bool,
}

impl CircuitPermit<'_> {
    pub fn success(mut self) {
        self.probe = false;
        self.breaker.record_success();
    }

    pub fn failure(mut self) {
        self.probe = false;
        self.breaker.record_failure();
    }

    pub const fn is_probe(&self) -> bool {
        self.probe
    }
}

impl Drop for CircuitPermit<'_> {
    fn drop(&mut self) {
        if self.probe {
            tracing::debug!("circuit.probe_released");
            self.breaker.release_probe();
        }
    }
}

/// Gates an inner transport behind a [`CircuitBreaker`].
///
/// Server-class responses and retryable network errors count as failures.
/// Cancellation is neutral.
#[derive(Debug)]
pub struct CircuitBreakerHttpClient<C> {
    inner: C,
    breaker: CircuitBreaker,
}

impl<C> CircuitBreakerHttpClient<C> {
    pub fn new(inner: C, config: CircuitBreakerConfig) -> Self {
        Self {
            inner,
            breaker: CircuitBreaker::new(config),
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }
}

impl<C> HttpClient for CircuitBreakerHttpClient<C>
where
    C: HttpClient,
{
    fn execute<'a>(&'a self, request: HttpRequest, cancel: &'a CancellationToken) -> HttpFuture<'a> {
        Box::pin(async move {
            let Some(permit) = self.breaker.try_acquire() else {
                tracing::debug!(url = %request.url, "circuit.rejected");
                return Err(UpstreamError::unavailable(ErrorMessage::CircuitOpen.text()));
            };

            let outcome = self.inner.execute(request, cancel).await;
            match &outcome {
                Ok(response) if response.status >= 500 => permit.failure(),
                Ok(_) => permit.success(),
                Err(error)
                    if error.kind() == UpstreamErrorKind::Transient && error.retryable() =>
                {
                    permit.failure()
                }
                Err(_) => drop(permit),
            }
            outcome
        })
    }
}
