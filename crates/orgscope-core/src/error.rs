//! Classified error taxonomy shared by every layer of the client stack.
//!
//! Each layer only fixes what it can (a cache hit avoids a refresh, a retry absorbs a
//! network blip) and hands everything else up as an [`UpstreamError`]. Callers see a
//! small, stable set of outcomes regardless of which layer detected the problem.

use std::fmt::{Display, Formatter};
use std::sync::Arc;

use serde::Deserialize;

use crate::messages::ErrorMessage;

/// Outcome classification used by callers to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpstreamErrorKind {
    /// Caller supplied invalid input; rejected before any network call.
    Validation,
    /// Bearer credential could not be acquired.
    AuthFailure,
    /// Upstream answered with a structured error envelope or a terminal status.
    UpstreamRequestFailure,
    /// Circuit open, retries exhausted, or a network failure.
    Transient,
    /// The caller's cancellation token fired.
    Cancelled,
    /// Anything else, such as an undecodable success body.
    Unexpected,
}

impl UpstreamErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::AuthFailure => "auth_failure",
            Self::UpstreamRequestFailure => "upstream_request_failure",
            Self::Transient => "transient",
            Self::Cancelled => "cancelled",
            Self::Unexpected => "unexpected",
        }
    }
}

impl Display for UpstreamErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

type ErrorSource = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Structured error produced once at the boundary where an outcome becomes final.
#[derive(Debug, Clone)]
pub struct UpstreamError {
    kind: UpstreamErrorKind,
    message: String,
    status: Option<u16>,
    code: Option<String>,
    retryable: bool,
    source: Option<ErrorSource>,
}

impl UpstreamError {
    fn new(kind: UpstreamErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            code: None,
            retryable: false,
            source: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(UpstreamErrorKind::Validation, message)
    }

    pub fn auth_failure(message: impl Into<String>) -> Self {
        Self::new(UpstreamErrorKind::AuthFailure, message)
    }

    pub fn upstream_request(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            code: Some(code.into()),
            ..Self::new(UpstreamErrorKind::UpstreamRequestFailure, message)
        }
    }

    /// Network-level failure; eligible for retry and counted by the circuit breaker.
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            retryable: true,
            ..Self::new(UpstreamErrorKind::Transient, message)
        }
    }

    /// Terminal transient outcome, e.g. an open circuit or an exhausted retry budget.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(UpstreamErrorKind::Transient, message)
    }

    pub fn cancelled() -> Self {
        Self::new(UpstreamErrorKind::Cancelled, ErrorMessage::Cancelled.text())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::new(UpstreamErrorKind::Unexpected, message)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Arc::new(source));
        self
    }

    /// Classifies a non-success response once retries below have been spent.
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        if let Some(envelope) = ErrorEnvelope::parse(body) {
            let code = envelope.code().unwrap_or("Unknown").to_owned();
            let message = envelope
                .message
                .unwrap_or_else(|| format!("{} (status {status})", ErrorMessage::UpstreamRejected.text()));
            return Self::upstream_request(status, code, message);
        }

        if status == 429 || status >= 500 {
            return Self::unavailable(format!(
                "{} (status {status})",
                ErrorMessage::UpstreamUnavailable.text()
            ))
            .with_status(status);
        }

        Self::upstream_request(
            status,
            "Unknown",
            format!("{} (status {status})", ErrorMessage::UpstreamRejected.text()),
        )
    }

    pub const fn kind(&self) -> UpstreamErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn status(&self) -> Option<u16> {
        self.status
    }

    /// Application error code carried by an upstream error envelope.
    pub fn upstream_code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == UpstreamErrorKind::Cancelled
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            UpstreamErrorKind::Validation => "upstream.validation",
            UpstreamErrorKind::AuthFailure => "upstream.auth_failure",
            UpstreamErrorKind::UpstreamRequestFailure => "upstream.request_failure",
            UpstreamErrorKind::Transient => "upstream.unavailable",
            UpstreamErrorKind::Cancelled => "upstream.cancelled",
            UpstreamErrorKind::Unexpected => "upstream.unexpected",
        }
    }

    /// HTTP status an inbound controller should answer with for this outcome.
    pub fn suggested_status(&self) -> u16 {
        match self.kind {
            UpstreamErrorKind::Validation => 400,
            UpstreamErrorKind::AuthFailure => 502,
            UpstreamErrorKind::UpstreamRequestFailure => self.status.unwrap_or(502),
            UpstreamErrorKind::Transient => 503,
            UpstreamErrorKind::Cancelled => 499,
            UpstreamErrorKind::Unexpected => 500,
        }
    }
}

impl Display for UpstreamError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())?;
        if let Some(code) = &self.code {
            write!(f, " [upstream code {code}]")?;
        }
        Ok(())
    }
}

impl std::error::Error for UpstreamError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|source| source as &(dyn std::error::Error + 'static))
    }
}

/// Configuration loading and validation failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("environment variable {name} has invalid value '{value}'")]
    InvalidEnv { name: &'static str, value: String },
    #[error("{field} is required")]
    Missing { field: &'static str },
    #[error("{field} is invalid: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Error body returned by the upstream API alongside non-success statuses.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl ErrorEnvelope {
    fn parse(body: &[u8]) -> Option<Self> {
        let envelope: Self = serde_json::from_slice(body).ok()?;
        if envelope.error.is_none() && envelope.code.is_none() {
            return None;
        }
        Some(envelope)
    }

    fn code(&self) -> Option<&str> {
        self.error.as_deref().or(self.code.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_with_error_code_becomes_request_failure() {
        let error = UpstreamError::from_response(
            403,
            br#"{"error":"ORG_ACCESS_DENIED","message":"not entitled"}"#,
        );

        assert_eq!(error.kind(), UpstreamErrorKind::UpstreamRequestFailure);
        assert_eq!(error.status(), Some(403));
        assert_eq!(error.upstream_code(), Some("ORG_ACCESS_DENIED"));
        assert_eq!(error.message(), "not entitled");
        assert_eq!(error.suggested_status(), 403);
    }

    #[test]
    fn server_error_without_envelope_is_transient() {
        let error = UpstreamError::from_response(503, b"<html>busy</html>");

        assert_eq!(error.kind(), UpstreamErrorKind::Transient);
        assert_eq!(error.status(), Some(503));
        assert!(!error.retryable());
        assert_eq!(error.suggested_status(), 503);
    }

    #[test]
    fn server_error_with_envelope_keeps_code() {
        let error = UpstreamError::from_response(500, br#"{"code":"INTERNAL"}"#);

        assert_eq!(error.kind(), UpstreamErrorKind::UpstreamRequestFailure);
        assert_eq!(error.upstream_code(), Some("INTERNAL"));
    }

    #[test]
    fn client_error_without_envelope_uses_unknown_code() {
        let error = UpstreamError::from_response(404, b"");

        assert_eq!(error.kind(), UpstreamErrorKind::UpstreamRequestFailure);
        assert_eq!(error.upstream_code(), Some("Unknown"));
    }

    #[test]
    fn network_errors_are_retryable_but_unavailable_is_not() {
        assert!(UpstreamError::network("connection reset").retryable());
        assert!(!UpstreamError::unavailable("circuit open").retryable());
    }

    #[test]
    fn source_is_exposed_through_error_trait() {
        use std::error::Error;

        let inner = UpstreamError::network("dns failure");
        let outer = UpstreamError::auth_failure("token fetch failed").with_source(inner);

        let source = outer.source().expect("source should be present");
        assert!(source.to_string().contains("dns failure"));
    }
}
