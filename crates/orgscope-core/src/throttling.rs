use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};
use tokio_util::sync::CancellationToken;

use crate::error::UpstreamError;
use crate::http_client::{HttpClient, HttpFuture, HttpRequest};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Client-side GCRA throttle in front of the network transport.
///
/// Callers over budget wait for a slot; the wait is abandoned on cancellation.
#[derive(Clone)]
pub struct RateLimitedHttpClient<C> {
    inner: C,
    limiter: Arc<DirectRateLimiter>,
}

impl<C> RateLimitedHttpClient<C> {
    pub fn new(inner: C, requests_per_minute: u32) -> Self {
        Self {
            inner,
            limiter: Arc::new(RateLimiter::direct(quota_from_window(
                Duration::from_secs(60),
                requests_per_minute,
            ))),
        }
    }

    /// Takes a slot if one is free right now.
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

impl<C> HttpClient for RateLimitedHttpClient<C>
where
    C: HttpClient,
{
    fn execute<'a>(&'a self, request: HttpRequest, cancel: &'a CancellationToken) -> HttpFuture<'a> {
        Box::pin(async move {
            if self.limiter.check().is_err() {
                tracing::debug!(url = %request.url, "throttle.waiting");
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(UpstreamError::cancelled()),
                    _ = self.limiter.until_ready() => {}
                }
            }
            self.inner.execute(request, cancel).await
        })
    }
}

fn quota_from_window(window: Duration, limit: u32) -> Quota {
    let burst = NonZeroU32::new(limit).unwrap_or(NonZeroU32::MIN);
    let seconds_per_cell = (window.as_secs_f64() / f64::from(burst.get())).max(0.001);

    Quota::with_period(Duration::from_secs_f64(seconds_per_cell))
        .unwrap_or_else(|| Quota::per_second(burst))
        .allow_burst(burst)
}
