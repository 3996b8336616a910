//! Retry logic with exponential backoff and jitter.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{UpstreamError, UpstreamErrorKind};
use crate::http_client::{HttpClient, HttpFuture, HttpRequest};
use crate::messages::ErrorMessage;

/// Backoff strategy for retrying failed requests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Uses a fixed delay between retries.
    Fixed {
        /// Delay between retries.
        delay: Duration,
    },
    /// Uses an exponential delay between retries.
    ///
    /// The delay is calculated as `base * (factor ^ attempt)`.
    Exponential {
        /// The initial backoff duration.
        base: Duration,
        /// The multiplicative factor for each subsequent retry.
        factor: f64,
        /// The maximum duration to wait between retries.
        max: Duration,
        /// Whether to apply random jitter (+/- 50%) to the delay.
        jitter: bool,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_secs(2),
            factor: 2.0,
            max: Duration::from_secs(30),
            jitter: true,
        }
    }
}

impl Backoff {
    /// Delay before retry number `attempt` (0-based).
    pub fn delay(self, attempt: u32) -> Duration {
        match self {
            Self::Fixed { delay } => delay,
            Self::Exponential {
                base,
                factor,
                max,
                jitter,
            } => {
                let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
                let seconds = base.as_secs_f64() * factor.powi(exponent);
                let capped_seconds = seconds.min(max.as_secs_f64());

                let mut delay = Duration::from_secs_f64(capped_seconds);

                if jitter {
                    let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
                    let spread = millis / 2;
                    let offset = fastrand::u64(0..=spread.saturating_mul(2));
                    delay = Duration::from_millis((millis - spread).saturating_add(offset));
                }

                delay
            }
        }
    }
}

/// Configuration for the automatic retry mechanism.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Enables or disables the retry mechanism.
    pub enabled: bool,
    /// Total attempts = `max_retries + 1`.
    pub max_retries: u32,
    pub backoff: Backoff,
    /// Statuses below 500 that should trigger a retry.
    pub retry_on_status: Vec<u16>,
    /// Retry every server-class (5xx) status.
    pub retry_on_server_errors: bool,
    /// Retry network-level failures (connect, timeout, reset).
    pub retry_on_network: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 3,
            backoff: Backoff::default(),
            retry_on_status: vec![429],
            retry_on_server_errors: true,
            retry_on_network: true,
        }
    }
}

impl RetryConfig {
    pub fn exponential(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    pub fn fixed(delay: Duration, max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Fixed { delay },
            ..Self::default()
        }
    }

    pub fn no_retry() -> Self {
        Self {
            enabled: false,
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn should_retry_status(&self, status: u16) -> bool {
        (self.retry_on_server_errors && status >= 500) || self.retry_on_status.contains(&status)
    }

    pub fn should_retry_error(&self, error: &UpstreamError) -> bool {
        self.retry_on_network && error.kind() == UpstreamErrorKind::Transient && error.retryable()
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff.delay(attempt)
    }

    const fn attempt_budget(&self) -> u32 {
        if self.enabled {
            self.max_retries
        } else {
            0
        }
    }
}

/// Re-issues requests that fail transiently, sleeping between attempts.
///
/// Terminal responses (2xx, 4xx other than the configured statuses) and terminal
/// errors pass straight through. When the budget runs out the last retryable response
/// is returned unchanged so the caller can classify it; a last network failure becomes
/// a non-retryable `Transient` error.
#[derive(Debug)]
pub struct RetryingHttpClient<C> {
    inner: C,
    config: RetryConfig,
}

impl<C> RetryingHttpClient<C> {
    pub fn new(inner: C, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}

impl<C> HttpClient for RetryingHttpClient<C>
where
    C: HttpClient,
{
    fn execute<'a>(&'a self, request: HttpRequest, cancel: &'a CancellationToken) -> HttpFuture<'a> {
        Box::pin(async move {
            let budget = self.config.attempt_budget();
            let mut attempt = 0_u32;

            loop {
                if cancel.is_cancelled() {
                    return Err(UpstreamError::cancelled());
                }

                let outcome = self.inner.execute(request.clone(), cancel).await;
                let reason = match &outcome {
                    Ok(response) if self.config.should_retry_status(response.status) => {
                        Some(format!("status {}", response.status))
                    }
                    Err(error) if self.config.should_retry_error(error) => {
                        Some(error.message().to_owned())
                    }
                    _ => None,
                };
                let Some(reason) = reason else {
                    return outcome;
                };

                if attempt >= budget {
                    tracing::warn!(
                        url = %request.url,
                        attempts = attempt + 1,
                        reason = %reason,
                        "retry.exhausted"
                    );
                    return outcome.map_err(|error| {
                        UpstreamError::unavailable(format!(
                            "{}: {}",
                            ErrorMessage::RetriesExhausted.text(),
                            error.message()
                        ))
                        .with_source(error)
                    });
                }

                let delay = self.config.delay_for_attempt(attempt);
                tracing::debug!(
                    url = %request.url,
                    attempt = attempt + 1,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    reason = %reason,
                    "retry.scheduled"
                );
                drop(outcome);

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(UpstreamError::cancelled()),
                    _ = tokio::time::sleep(delay) => {}
                }
                attempt += 1;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedHttpClient, ScriptedReply};

    fn fast(max_retries: u32) -> RetryConfig {
        RetryConfig::fixed(Duration::from_millis(1), max_retries)
    }

    #[test]
    fn test_fixed_backoff() {
        let backoff = Backoff::Fixed {
            delay: Duration::from_millis(100),
        };

        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(10), Duration::from_millis(100));
    }

    #[test]
    fn test_exponential_backoff() {
        let backoff = Backoff::Exponential {
            base: Duration::from_secs(2),
            factor: 2.0,
            max: Duration::from_secs(10),
            jitter: false,
        };

        assert_eq!(backoff.delay(0), Duration::from_secs(2));
        assert_eq!(backoff.delay(1), Duration::from_secs(4));
        assert_eq!(backoff.delay(2), Duration::from_secs(8));
        assert_eq!(backoff.delay(3), Duration::from_secs(10)); // capped
    }

    #[test]
    fn test_exponential_backoff_with_jitter_stays_within_half() {
        let backoff = Backoff::Exponential {
            base: Duration::from_millis(100),
            factor: 2.0,
            max: Duration::from_secs(1),
            jitter: true,
        };

        for _ in 0..10 {
            for attempt in 0..5 {
                let expected = (100.0 * 2_f64.powi(attempt as i32)).min(1000.0);
                let delay_ms = backoff.delay(attempt).as_millis() as f64;

                assert!(delay_ms >= expected * 0.49, "attempt={attempt}, delay_ms={delay_ms}");
                assert!(delay_ms <= expected * 1.51, "attempt={attempt}, delay_ms={delay_ms}");
            }
        }
    }

    #[test]
    fn test_default_retry_predicates() {
        let config = RetryConfig::default();

        assert_eq!(config.max_retries, 3);
        assert!(config.should_retry_status(429));
        assert!(config.should_retry_status(500));
        assert!(config.should_retry_status(503));
        assert!(config.should_retry_status(599));
        assert!(!config.should_retry_status(400));
        assert!(!config.should_retry_status(401));
        assert!(!config.should_retry_status(404));
        assert!(config.should_retry_error(&UpstreamError::network("reset")));
        assert!(!config.should_retry_error(&UpstreamError::unavailable("circuit open")));
        assert!(!config.should_retry_error(&UpstreamError::cancelled()));
    }

    #[tokio::test]
    async fn retries_server_errors_until_success() {
        let transport = ScriptedHttpClient::new()
            .then(ScriptedReply::status(503))
            .then(ScriptedReply::status(500))
            .then(ScriptedReply::json(200, r#"{"ok":true}"#));
        let client = RetryingHttpClient::new(&transport, fast(3));

        let response = client
            .execute(HttpRequest::get("https://example.test"), &CancellationToken::new())
            .await
            .expect("third attempt succeeds");

        assert_eq!(response.status, 200);
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let transport = ScriptedHttpClient::always(ScriptedReply::status(400));
        let client = RetryingHttpClient::new(&transport, fast(3));

        let response = client
            .execute(HttpRequest::get("https://example.test"), &CancellationToken::new())
            .await
            .expect("400 is returned, not raised");

        assert_eq!(response.status, 400);
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn exhausted_server_errors_return_last_response() {
        let transport = ScriptedHttpClient::always(ScriptedReply::status(502));
        let client = RetryingHttpClient::new(&transport, fast(2));

        let response = client
            .execute(HttpRequest::get("https://example.test"), &CancellationToken::new())
            .await
            .expect("last response is handed back");

        assert_eq!(response.status, 502);
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test]
    async fn exhausted_network_errors_become_terminal_transient() {
        let transport = ScriptedHttpClient::always(ScriptedReply::network_error("connection reset"));
        let client = RetryingHttpClient::new(&transport, fast(1));

        let error = client
            .execute(HttpRequest::get("https://example.test"), &CancellationToken::new())
            .await
            .expect_err("network keeps failing");

        assert_eq!(error.kind(), UpstreamErrorKind::Transient);
        assert!(!error.retryable());
        assert!(error.message().contains("connection reset"));
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test]
    async fn disabled_retry_makes_a_single_attempt() {
        let transport = ScriptedHttpClient::always(ScriptedReply::status(500));
        let client = RetryingHttpClient::new(&transport, RetryConfig::no_retry());

        let response = client
            .execute(HttpRequest::get("https://example.test"), &CancellationToken::new())
            .await
            .expect("response is returned");

        assert_eq!(response.status, 500);
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn cancellation_during_backoff_stops_retrying() {
        let transport = ScriptedHttpClient::always(ScriptedReply::status(503));
        let client = RetryingHttpClient::new(
            &transport,
            RetryConfig::fixed(Duration::from_secs(60), 3),
        );
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let error = client
            .execute(HttpRequest::get("https://example.test"), &cancel)
            .await
            .expect_err("cancelled while sleeping");

        assert!(error.is_cancelled());
        assert_eq!(transport.call_count(), 1);
    }
}
