//! # Orgscope Core
//!
//! Token lifecycle, resilient transport and typed client for the organization
//! intelligence API.
//!
//! ## Overview
//!
//! Outbound calls flow through a stack of small [`HttpClient`] layers:
//!
//! - **Authentication** attaches a bearer token from a [`TokenProvider`]
//! - **Retry** re-issues network failures, 5xx and 429 with jittered backoff
//! - **Circuit breaker** fails fast after repeated server-class failures
//! - **Throttle** (optional) keeps the request rate under a per-minute budget
//! - **Network** sends the request with reqwest
//!
//! [`UpstreamClient`] exposes one call per upstream operation on top of that stack
//! and [`OrganizationCommands`] validates commands before delegating to it.
//!
//! ## Feature Flags
//!
//! | Flag | Description |
//! |------|-------------|
//! | `default` | Standard feature set |
//! | `test-utils` | Scripted transports and token providers for tests |
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`auth`] | Bearer token decorator |
//! | [`circuit_breaker`] | Circuit breaker and its transport layer |
//! | [`client`] | Upstream client facade and stack builder |
//! | [`config`] | Connection settings and validation |
//! | [`credential`] | Single-slot credential cache |
//! | [`dispatch`] | Command handlers |
//! | [`error`] | Classified error taxonomy |
//! | [`http_client`] | Transport contract and reqwest implementation |
//! | [`messages`] | Static message catalog |
//! | [`models`] | Request and response payloads |
//! | [`operation`] | Operation identifiers and structured events |
//! | [`retry`] | Backoff policy and retrying transport |
//! | [`throttling`] | Client-side rate limiting |
//! | [`token`] | Single-flight token provider |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use orgscope_core::{OrganizationApi, UpstreamClient, UpstreamConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let config = UpstreamConfig::from_env()?;
//! let client = UpstreamClient::builder(config).build()?;
//! let outlook = client.outlook(42, &CancellationToken::new()).await?;
//! ```

pub mod auth;
pub mod circuit_breaker;
pub mod client;
pub mod config;
pub mod credential;
pub mod dispatch;
pub mod error;
pub mod http_client;
pub mod messages;
pub mod models;
pub mod operation;
pub mod retry;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
pub mod throttling;
pub mod token;

pub use auth::AuthenticatingHttpClient;
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerHttpClient, CircuitPermit, CircuitState,
};
pub use client::{ApiFuture, OrganizationApi, UpstreamClient, UpstreamClientBuilder};
pub use config::UpstreamConfig;
pub use credential::{Credential, CredentialCache};
pub use dispatch::{CommandHandler, OrganizationCommands};
pub use error::{ConfigError, UpstreamError, UpstreamErrorKind};
pub use http_client::{
    ByteStream, HttpClient, HttpFuture, HttpMethod, HttpRequest, HttpResponse, ReqwestHttpClient,
    ResponseBody,
};
pub use operation::Operation;
pub use retry::{Backoff, RetryConfig, RetryingHttpClient};
pub use throttling::RateLimitedHttpClient;
pub use token::{TokenFuture, TokenProvider, UpstreamTokenProvider};
