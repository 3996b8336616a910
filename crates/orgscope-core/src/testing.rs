//! Deterministic transports and token providers for offline tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::error::UpstreamError;
use crate::http_client::{HttpClient, HttpFuture, HttpRequest, HttpResponse};
use crate::token::{TokenFuture, TokenProvider};

/// One scripted outcome of [`ScriptedHttpClient`].
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Response { status: u16, body: Bytes },
    Stream { status: u16, chunks: Vec<Bytes> },
    NetworkError(String),
    /// Never answers; resolves only once the caller cancels.
    Hang,
}

impl ScriptedReply {
    pub fn json(status: u16, body: &str) -> Self {
        Self::Response {
            status,
            body: Bytes::copy_from_slice(body.as_bytes()),
        }
    }

    pub fn status(status: u16) -> Self {
        Self::Response {
            status,
            body: Bytes::new(),
        }
    }

    pub fn stream(status: u16, chunks: &[&str]) -> Self {
        Self::Stream {
            status,
            chunks: chunks
                .iter()
                .map(|chunk| Bytes::copy_from_slice(chunk.as_bytes()))
                .collect(),
        }
    }

    pub fn network_error(message: impl Into<String>) -> Self {
        Self::NetworkError(message.into())
    }
}

/// Transport that replays a script of replies and records every request it sees.
#[derive(Debug, Default)]
pub struct ScriptedHttpClient {
    script: Mutex<VecDeque<ScriptedReply>>,
    fallback: Option<ScriptedReply>,
    latency: Duration,
    calls: AtomicUsize,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers every call with the same reply.
    pub fn always(reply: ScriptedReply) -> Self {
        Self {
            fallback: Some(reply),
            ..Self::default()
        }
    }

    /// Appends a reply consumed by the next unanswered call.
    pub fn then(self, reply: ScriptedReply) -> Self {
        lock(&self.script).push_back(reply);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        lock(&self.requests).clone()
    }

    pub fn last_request(&self) -> Option<HttpRequest> {
        lock(&self.requests).last().cloned()
    }

    fn next_reply(&self) -> Option<ScriptedReply> {
        lock(&self.script)
            .pop_front()
            .or_else(|| self.fallback.clone())
    }
}

impl HttpClient for ScriptedHttpClient {
    fn execute<'a>(&'a self, request: HttpRequest, cancel: &'a CancellationToken) -> HttpFuture<'a> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            lock(&self.requests).push(request);
            let reply = self.next_reply();

            if !self.latency.is_zero() {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(UpstreamError::cancelled()),
                    _ = tokio::time::sleep(self.latency) => {}
                }
            }

            match reply {
                Some(ScriptedReply::Response { status, body }) => Ok(HttpResponse::new(status, body)),
                Some(ScriptedReply::Stream { status, chunks }) => Ok(HttpResponse::streaming(
                    status,
                    stream::iter(chunks.into_iter().map(Ok)).boxed(),
                )),
                Some(ScriptedReply::NetworkError(message)) => Err(UpstreamError::network(message)),
                Some(ScriptedReply::Hang) => {
                    cancel.cancelled().await;
                    Err(UpstreamError::cancelled())
                }
                None => Err(UpstreamError::unexpected("scripted transport ran out of replies")),
            }
        })
    }
}

/// Token provider returning a fixed token, or a fixed failure.
#[derive(Debug)]
pub struct StaticTokenProvider {
    outcome: Result<String, UpstreamError>,
    calls: AtomicUsize,
    invalidations: AtomicUsize,
    rejected: Mutex<Vec<String>>,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            outcome: Ok(token.into()),
            calls: AtomicUsize::new(0),
            invalidations: AtomicUsize::new(0),
            rejected: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: UpstreamError) -> Self {
        Self {
            outcome: Err(error),
            calls: AtomicUsize::new(0),
            invalidations: AtomicUsize::new(0),
            rejected: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn invalidation_count(&self) -> usize {
        self.invalidations.load(Ordering::SeqCst)
    }

    /// Tokens passed to [`TokenProvider::invalidate_if`], oldest first.
    pub fn rejected_tokens(&self) -> Vec<String> {
        lock(&self.rejected).clone()
    }
}

impl TokenProvider for StaticTokenProvider {
    fn token<'a>(&'a self, cancel: &'a CancellationToken) -> TokenFuture<'a> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if cancel.is_cancelled() {
                return Err(UpstreamError::cancelled());
            }
            self.outcome.clone()
        })
    }

    fn invalidate(&self) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
    }

    fn invalidate_if(&self, rejected: &str) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
        lock(&self.rejected).push(rejected.to_owned());
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
