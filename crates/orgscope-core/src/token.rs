//! Bearer token acquisition with single-flight refresh.
//!
//! The fast path is a plain cache read. On a miss, callers queue on one async refresh
//! lock; the first one through performs the authorization call and everybody behind it
//! re-reads the cache and returns without touching the network. The cache lock itself
//! is never held across an await point.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::UpstreamConfig;
use crate::credential::{Credential, CredentialCache};
use crate::error::{UpstreamError, UpstreamErrorKind};
use crate::http_client::{HttpClient, HttpRequest};
use crate::messages::ErrorMessage;

pub type TokenFuture<'a> = Pin<Box<dyn Future<Output = Result<String, UpstreamError>> + Send + 'a>>;

/// Source of bearer tokens for outbound calls.
pub trait TokenProvider: Send + Sync {
    fn token<'a>(&'a self, cancel: &'a CancellationToken) -> TokenFuture<'a>;

    /// Drops any cached credential so the next call re-authorizes.
    fn invalidate(&self);

    /// Drops the cached credential only if it is still `rejected`. A newer token
    /// cached since the rejected one was handed out stays in place.
    fn invalidate_if(&self, rejected: &str);
}

impl<T> TokenProvider for Arc<T>
where
    T: TokenProvider + ?Sized,
{
    fn token<'a>(&'a self, cancel: &'a CancellationToken) -> TokenFuture<'a> {
        (**self).token(cancel)
    }

    fn invalidate(&self) {
        (**self).invalidate();
    }

    fn invalidate_if(&self, rejected: &str) {
        (**self).invalidate_if(rejected);
    }
}

impl<T> TokenProvider for &T
where
    T: TokenProvider + ?Sized,
{
    fn token<'a>(&'a self, cancel: &'a CancellationToken) -> TokenFuture<'a> {
        (**self).token(cancel)
    }

    fn invalidate(&self) {
        (**self).invalidate();
    }

    fn invalidate_if(&self, rejected: &str) {
        (**self).invalidate_if(rejected);
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthorizeRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
}

#[derive(Deserialize)]
struct AuthorizeResponse {
    #[serde(default)]
    token: Option<String>,
}

/// Token provider backed by the upstream authorization endpoint.
pub struct UpstreamTokenProvider {
    cache: Arc<CredentialCache>,
    refresh_lock: Mutex<()>,
    http_client: Arc<dyn HttpClient>,
    authorize_url: String,
    client_id: String,
    client_secret: String,
    cache_duration: time::Duration,
    request_timeout: Option<Duration>,
}

impl UpstreamTokenProvider {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        cache: Arc<CredentialCache>,
        config: &UpstreamConfig,
    ) -> Self {
        Self {
            cache,
            refresh_lock: Mutex::new(()),
            http_client,
            authorize_url: config.authorize_url(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            cache_duration: config.token_cache_duration(),
            request_timeout: config.request_timeout(),
        }
    }

    pub fn cache(&self) -> &Arc<CredentialCache> {
        &self.cache
    }

    async fn acquire(&self, cancel: &CancellationToken) -> Result<String, UpstreamError> {
        if let Some(credential) = self.cache.get() {
            tracing::trace!("token.cache_hit");
            return Ok(credential.token().to_owned());
        }

        let _guard = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(UpstreamError::cancelled()),
            guard = self.refresh_lock.lock() => guard,
        };

        if let Some(credential) = self.cache.get() {
            tracing::trace!(after_wait = true, "token.cache_hit");
            return Ok(credential.token().to_owned());
        }

        tracing::debug!(url = %self.authorize_url, "token.refreshing");
        let started = Instant::now();

        let token = match self.fetch(cancel).await {
            Ok(token) => token,
            Err(error) => {
                if !error.is_cancelled() {
                    tracing::warn!(
                        error_kind = %error.kind(),
                        status = error.status(),
                        error = %error,
                        "token.acquisition_failed"
                    );
                }
                return Err(error);
            }
        };

        let expires_at = OffsetDateTime::now_utc() + self.cache_duration;
        self.cache.set(Credential::new(token.clone(), expires_at));
        tracing::info!(
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            cache_minutes = self.cache_duration.whole_minutes(),
            "token.refreshed"
        );

        Ok(token)
    }

    async fn fetch(&self, cancel: &CancellationToken) -> Result<String, UpstreamError> {
        let request = HttpRequest::post(self.authorize_url.as_str())
            .with_json_body(&AuthorizeRequest {
                client_id: &self.client_id,
                client_secret: &self.client_secret,
            })
            .map_err(into_auth_failure)?
            .with_timeout(self.request_timeout);

        let response = self
            .http_client
            .execute(request, cancel)
            .await
            .map_err(into_auth_failure)?;

        let status = response.status;
        if status != 200 {
            return Err(UpstreamError::auth_failure(format!(
                "{} {status}",
                ErrorMessage::AuthorizationRejected.text()
            ))
            .with_status(status));
        }

        let body = response.into_bytes().await.map_err(into_auth_failure)?;
        let parsed: AuthorizeResponse = serde_json::from_slice(&body).map_err(|error| {
            tracing::warn!(reason = "malformed", "token.response_invalid");
            UpstreamError::auth_failure(ErrorMessage::AuthorizationFailed.text()).with_source(error)
        })?;

        match parsed.token {
            Some(token) if !token.trim().is_empty() => Ok(token),
            _ => {
                tracing::warn!(reason = "missing_token", "token.response_invalid");
                Err(UpstreamError::auth_failure(
                    ErrorMessage::AuthorizationMissingToken.text(),
                ))
            }
        }
    }
}

impl TokenProvider for UpstreamTokenProvider {
    fn token<'a>(&'a self, cancel: &'a CancellationToken) -> TokenFuture<'a> {
        Box::pin(self.acquire(cancel))
    }

    fn invalidate(&self) {
        tracing::debug!("token.invalidated");
        self.cache.invalidate();
    }

    fn invalidate_if(&self, rejected: &str) {
        if self.cache.invalidate_if(rejected) {
            tracing::debug!("token.invalidated");
        } else {
            tracing::debug!("token.invalidation_skipped");
        }
    }
}

/// Cancellation and existing auth failures pass through; anything else is wrapped.
fn into_auth_failure(error: UpstreamError) -> UpstreamError {
    match error.kind() {
        UpstreamErrorKind::Cancelled | UpstreamErrorKind::AuthFailure => error,
        _ => UpstreamError::auth_failure(format!(
            "{}: {}",
            ErrorMessage::AuthorizationFailed.text(),
            error.message()
        ))
        .with_source(error),
    }
}
