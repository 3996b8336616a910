//! Static message catalog for errors and log lines.
//!
//! Every human-readable message the library emits is resolved from this table at the
//! call site, so a missing entry is a compile error rather than an empty string.

/// Message kinds emitted by the client stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorMessage {
    InvalidOrganizationId,
    MissingPayload,
    AuthorizationRejected,
    AuthorizationMissingToken,
    AuthorizationFailed,
    CircuitOpen,
    RetriesExhausted,
    UpstreamUnavailable,
    UpstreamRejected,
    UndecodableResponse,
    RequestEncoding,
    Cancelled,
}

impl ErrorMessage {
    pub const fn text(self) -> &'static str {
        match self {
            Self::InvalidOrganizationId => "The organization identifier must be a positive integer.",
            Self::MissingPayload => "The request payload is required.",
            Self::AuthorizationRejected => "authorization failed with status code",
            Self::AuthorizationMissingToken => "authorization response did not include a token",
            Self::AuthorizationFailed => "authorization request failed",
            Self::CircuitOpen => "upstream circuit is open; calls are failing fast",
            Self::RetriesExhausted => "upstream call failed after exhausting retries",
            Self::UpstreamUnavailable => "upstream service is unavailable",
            Self::UpstreamRejected => "upstream rejected the request",
            Self::UndecodableResponse => "upstream response could not be decoded",
            Self::RequestEncoding => "request payload could not be encoded",
            Self::Cancelled => "operation was cancelled",
        }
    }
}
