use std::collections::BTreeMap;
use std::fmt::{Debug, Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::UpstreamError;
use crate::messages::ErrorMessage;

/// Raw body chunks of a streaming response.
pub type ByteStream = BoxStream<'static, Result<Bytes, UpstreamError>>;

/// Boxed future returned by every [`HttpClient`] layer.
pub type HttpFuture<'a> = Pin<Box<dyn Future<Output = Result<HttpResponse, UpstreamError>> + Send + 'a>>;

/// HTTP methods used by the upstream API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

impl Display for HttpMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outbound request envelope flowing through the decorator chain.
#[derive(Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Bytes>,
    pub timeout: Option<Duration>,
    /// Hand back a live body stream instead of buffering a successful response.
    pub streaming: bool,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            body: None,
            timeout: None,
            streaming: false,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, url)
    }

    /// Inserts a header, replacing any existing value under the same (case-insensitive) name.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_bearer_token(self, token: &str) -> Self {
        self.with_header("authorization", format!("Bearer {token}"))
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_json_body<T>(self, payload: &T) -> Result<Self, UpstreamError>
    where
        T: Serialize + ?Sized,
    {
        let body = serde_json::to_vec(payload).map_err(|error| {
            UpstreamError::unexpected(ErrorMessage::RequestEncoding.text()).with_source(error)
        })?;
        Ok(self
            .with_header("content-type", "application/json")
            .with_body(body))
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn streaming(mut self) -> Self {
        self.streaming = true;
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

impl Debug for HttpRequest {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let headers: BTreeMap<&str, &str> = self
            .headers
            .iter()
            .map(|(name, value)| {
                let shown = if name == "authorization" { "<redacted>" } else { value.as_str() };
                (name.as_str(), shown)
            })
            .collect();

        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &headers)
            .field("body_len", &self.body.as_ref().map(Bytes::len))
            .field("timeout", &self.timeout)
            .field("streaming", &self.streaming)
            .finish()
    }
}

/// Response body: buffered for ordinary calls, live for streaming calls.
pub enum ResponseBody {
    Buffered(Bytes),
    Stream(ByteStream),
}

impl Debug for ResponseBody {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buffered(bytes) => f.debug_tuple("Buffered").field(&bytes.len()).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Inbound response envelope.
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub body: ResponseBody,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: ResponseBody::Buffered(body.into()),
        }
    }

    pub fn ok_json(body: impl Into<Bytes>) -> Self {
        Self::new(200, body)
    }

    pub fn streaming(status: u16, stream: ByteStream) -> Self {
        Self {
            status,
            body: ResponseBody::Stream(stream),
        }
    }

    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Buffered bytes, or an empty slice for streaming bodies.
    pub fn buffered(&self) -> &[u8] {
        match &self.body {
            ResponseBody::Buffered(bytes) => bytes,
            ResponseBody::Stream(_) => &[],
        }
    }

    /// Collects the whole body, draining the stream if there is one.
    pub async fn into_bytes(self) -> Result<Bytes, UpstreamError> {
        match self.body {
            ResponseBody::Buffered(bytes) => Ok(bytes),
            ResponseBody::Stream(stream) => {
                let collected = stream
                    .try_fold(BytesMut::new(), |mut buffer, chunk| async move {
                        buffer.extend_from_slice(&chunk);
                        Ok(buffer)
                    })
                    .await?;
                Ok(collected.freeze())
            }
        }
    }

    pub fn into_stream(self) -> ByteStream {
        match self.body {
            ResponseBody::Buffered(bytes) if bytes.is_empty() => stream::empty().boxed(),
            ResponseBody::Buffered(bytes) => stream::once(async move { Ok(bytes) }).boxed(),
            ResponseBody::Stream(stream) => stream,
        }
    }
}

/// Transport capability implemented by the network client and by every wrapping layer.
pub trait HttpClient: Send + Sync {
    fn execute<'a>(&'a self, request: HttpRequest, cancel: &'a CancellationToken) -> HttpFuture<'a>;
}

impl<T> HttpClient for Arc<T>
where
    T: HttpClient + ?Sized,
{
    fn execute<'a>(&'a self, request: HttpRequest, cancel: &'a CancellationToken) -> HttpFuture<'a> {
        (**self).execute(request, cancel)
    }
}

impl<T> HttpClient for &T
where
    T: HttpClient + ?Sized,
{
    fn execute<'a>(&'a self, request: HttpRequest, cancel: &'a CancellationToken) -> HttpFuture<'a> {
        (**self).execute(request, cancel)
    }
}

/// Production transport backed by reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: Arc<reqwest::Client>,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self {
            client: Arc::new(
                reqwest::Client::builder()
                    .user_agent(concat!("orgscope/", env!("CARGO_PKG_VERSION")))
                    .build()
                    .unwrap_or_else(|_| reqwest::Client::new()),
            ),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient for ReqwestHttpClient {
    fn execute<'a>(&'a self, request: HttpRequest, cancel: &'a CancellationToken) -> HttpFuture<'a> {
        Box::pin(async move {
            let mut builder = match request.method {
                HttpMethod::Get => self.client.get(&request.url),
                HttpMethod::Post => self.client.post(&request.url),
            };

            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }

            if let Some(timeout) = request.timeout {
                builder = builder.timeout(timeout);
            }

            if let Some(body) = request.body {
                builder = builder.body(body);
            }

            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(UpstreamError::cancelled()),
                result = builder.send() => result.map_err(map_transport_error)?,
            };

            let status = response.status().as_u16();
            if request.streaming && response.status().is_success() {
                let stream = response
                    .bytes_stream()
                    .map_err(map_transport_error)
                    .boxed();
                return Ok(HttpResponse::streaming(status, stream));
            }

            let body = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(UpstreamError::cancelled()),
                result = response.bytes() => result.map_err(map_transport_error)?,
            };

            Ok(HttpResponse::new(status, body))
        })
    }
}

fn map_transport_error(error: reqwest::Error) -> UpstreamError {
    let message = if error.is_timeout() {
        format!("request timeout: {error}")
    } else if error.is_connect() {
        format!("connection failed: {error}")
    } else if error.is_body() || error.is_decode() {
        format!("failed to read response body: {error}")
    } else {
        format!("request failed: {error}")
    };
    UpstreamError::network(message).with_source(error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_names_are_case_insensitive_and_overwrite() {
        let request = HttpRequest::get("https://example.test/v2/organizations")
            .with_header("Authorization", "Bearer stale")
            .with_bearer_token("fresh");

        assert_eq!(request.headers.len(), 1);
        assert_eq!(request.header("AUTHORIZATION"), Some("Bearer fresh"));
    }

    #[test]
    fn json_body_sets_content_type() {
        let request = HttpRequest::post("https://example.test/v2/authorize")
            .with_json_body(&serde_json::json!({"clientId": "id"}))
            .expect("json value always encodes");

        assert_eq!(request.header("content-type"), Some("application/json"));
        assert_eq!(
            request.body.as_deref(),
            Some(br#"{"clientId":"id"}"#.as_slice())
        );
    }

    #[test]
    fn debug_output_redacts_bearer_token() {
        let request = HttpRequest::get("https://example.test").with_bearer_token("secret-token");

        let rendered = format!("{request:?}");
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("<redacted>"));
    }

    #[tokio::test]
    async fn streaming_body_collects_into_bytes() {
        let chunks = vec![Ok(Bytes::from_static(b"{\"a\":")), Ok(Bytes::from_static(b"1}"))];
        let response = HttpResponse::streaming(200, stream::iter(chunks).boxed());

        let body = response.into_bytes().await.expect("stream should collect");
        assert_eq!(body.as_ref(), b"{\"a\":1}");
    }

    #[tokio::test]
    async fn empty_buffered_body_becomes_empty_stream() {
        let chunks: Vec<_> = HttpResponse::new(200, Bytes::new())
            .into_stream()
            .collect()
            .await;
        assert!(chunks.is_empty());
    }
}
