//! Upstream connection settings.
//!
//! Values resolve with the following precedence (highest first):
//! 1. Environment variables
//! 2. JSON config file
//! 3. Built-in defaults
//!
//! ## Environment Variables
//!
//! - `ORGSCOPE_BASE_URL`: upstream API root
//! - `ORGSCOPE_AUTHORIZE_PATH`: path of the authorization endpoint
//! - `ORGSCOPE_ORGANIZATIONS_PATH`: path of the organization resources
//! - `ORGSCOPE_CLIENT_ID` / `ORGSCOPE_CLIENT_SECRET`: API credentials
//! - `ORGSCOPE_TOKEN_CACHE_MINUTES`: how long an acquired token is served from cache
//! - `ORGSCOPE_REQUEST_TIMEOUT_MS`: per-request timeout
//! - `ORGSCOPE_MAX_RETRIES`: retries after the first attempt
//! - `ORGSCOPE_CIRCUIT_FAILURE_THRESHOLD`: consecutive failures that open the circuit
//! - `ORGSCOPE_CIRCUIT_OPEN_SECS`: how long an open circuit fails fast
//! - `ORGSCOPE_REQUESTS_PER_MINUTE`: client-side request budget

use std::fmt::{Debug, Formatter};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::error::ConfigError;
use crate::retry::RetryConfig;

pub const ENV_BASE_URL: &str = "ORGSCOPE_BASE_URL";
pub const ENV_AUTHORIZE_PATH: &str = "ORGSCOPE_AUTHORIZE_PATH";
pub const ENV_ORGANIZATIONS_PATH: &str = "ORGSCOPE_ORGANIZATIONS_PATH";
pub const ENV_CLIENT_ID: &str = "ORGSCOPE_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "ORGSCOPE_CLIENT_SECRET";
pub const ENV_TOKEN_CACHE_MINUTES: &str = "ORGSCOPE_TOKEN_CACHE_MINUTES";
pub const ENV_REQUEST_TIMEOUT_MS: &str = "ORGSCOPE_REQUEST_TIMEOUT_MS";
pub const ENV_MAX_RETRIES: &str = "ORGSCOPE_MAX_RETRIES";
pub const ENV_CIRCUIT_FAILURE_THRESHOLD: &str = "ORGSCOPE_CIRCUIT_FAILURE_THRESHOLD";
pub const ENV_CIRCUIT_OPEN_SECS: &str = "ORGSCOPE_CIRCUIT_OPEN_SECS";
pub const ENV_REQUESTS_PER_MINUTE: &str = "ORGSCOPE_REQUESTS_PER_MINUTE";

/// Lifetime of tokens issued by the upstream authorization endpoint.
pub const UPSTREAM_TOKEN_LIFETIME_MINUTES: u32 = 60;

pub const MIN_TOKEN_CACHE_MINUTES: u32 = 1;
pub const MAX_TOKEN_CACHE_MINUTES: u32 = 240;
pub const MAX_RETRIES_LIMIT: u32 = 10;

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub authorize_path: String,
    pub organizations_path: String,
    pub client_id: String,
    pub client_secret: String,
    pub token_cache_minutes: u32,
    pub request_timeout_ms: Option<u64>,
    pub max_retries: u32,
    pub circuit_failure_threshold: u32,
    pub circuit_open_secs: u64,
    pub requests_per_minute: Option<u32>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: String::from("https://api.cbinsights.com"),
            authorize_path: String::from("v2/authorize"),
            organizations_path: String::from("v2/organizations"),
            client_id: String::new(),
            client_secret: String::new(),
            token_cache_minutes: 55,
            request_timeout_ms: None,
            max_retries: 3,
            circuit_failure_threshold: 5,
            circuit_open_secs: 30,
            requests_per_minute: None,
        }
    }
}

impl Debug for UpstreamConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("base_url", &self.base_url)
            .field("authorize_path", &self.authorize_path)
            .field("organizations_path", &self.organizations_path)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("token_cache_minutes", &self.token_cache_minutes)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("max_retries", &self.max_retries)
            .field("circuit_failure_threshold", &self.circuit_failure_threshold)
            .field("circuit_open_secs", &self.circuit_open_secs)
            .field("requests_per_minute", &self.requests_per_minute)
            .finish()
    }
}

impl UpstreamConfig {
    pub fn new(
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            ..Self::default()
        }
    }

    /// Loads a JSON config file; absent fields keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })
    }

    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides(|name| std::env::var(name).ok())
    }

    /// Overlays values from `lookup`, which maps variable names to values.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(value) = text(ENV_BASE_URL) {
            self.base_url = value;
        }
        if let Some(value) = text(ENV_AUTHORIZE_PATH) {
            self.authorize_path = value;
        }
        if let Some(value) = text(ENV_ORGANIZATIONS_PATH) {
            self.organizations_path = value;
        }
        if let Some(value) = text(ENV_CLIENT_ID) {
            self.client_id = value;
        }
        if let Some(value) = text(ENV_CLIENT_SECRET) {
            self.client_secret = value;
        }
        if let Some(value) = text(ENV_TOKEN_CACHE_MINUTES) {
            self.token_cache_minutes = parse_env(ENV_TOKEN_CACHE_MINUTES, value)?;
        }
        if let Some(value) = text(ENV_REQUEST_TIMEOUT_MS) {
            self.request_timeout_ms = Some(parse_env(ENV_REQUEST_TIMEOUT_MS, value)?);
        }
        if let Some(value) = text(ENV_MAX_RETRIES) {
            self.max_retries = parse_env(ENV_MAX_RETRIES, value)?;
        }
        if let Some(value) = text(ENV_CIRCUIT_FAILURE_THRESHOLD) {
            self.circuit_failure_threshold = parse_env(ENV_CIRCUIT_FAILURE_THRESHOLD, value)?;
        }
        if let Some(value) = text(ENV_CIRCUIT_OPEN_SECS) {
            self.circuit_open_secs = parse_env(ENV_CIRCUIT_OPEN_SECS, value)?;
        }
        if let Some(value) = text(ENV_REQUESTS_PER_MINUTE) {
            self.requests_per_minute = Some(parse_env(ENV_REQUESTS_PER_MINUTE, value)?);
        }

        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let base_url = self.base_url.trim();
        if base_url.is_empty() {
            return Err(ConfigError::Missing { field: "baseUrl" });
        }
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                field: "baseUrl",
                reason: String::from("must be an absolute http(s) URL"),
            });
        }
        if self.authorize_path.trim().is_empty() {
            return Err(ConfigError::Missing {
                field: "authorizePath",
            });
        }
        if self.organizations_path.trim().is_empty() {
            return Err(ConfigError::Missing {
                field: "organizationsPath",
            });
        }
        if self.client_id.trim().is_empty() {
            return Err(ConfigError::Missing { field: "clientId" });
        }
        if self.client_secret.trim().is_empty() {
            return Err(ConfigError::Missing {
                field: "clientSecret",
            });
        }
        if !(MIN_TOKEN_CACHE_MINUTES..=MAX_TOKEN_CACHE_MINUTES).contains(&self.token_cache_minutes) {
            return Err(ConfigError::Invalid {
                field: "tokenCacheMinutes",
                reason: format!(
                    "must be between {MIN_TOKEN_CACHE_MINUTES} and {MAX_TOKEN_CACHE_MINUTES}"
                ),
            });
        }
        if self.max_retries > MAX_RETRIES_LIMIT {
            return Err(ConfigError::Invalid {
                field: "maxRetries",
                reason: format!("must be at most {MAX_RETRIES_LIMIT}"),
            });
        }
        if self.circuit_failure_threshold == 0 {
            return Err(ConfigError::Invalid {
                field: "circuitFailureThreshold",
                reason: String::from("must be at least 1"),
            });
        }
        if self.circuit_open_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "circuitOpenSecs",
                reason: String::from("must be at least 1"),
            });
        }
        if self.requests_per_minute == Some(0) {
            return Err(ConfigError::Invalid {
                field: "requestsPerMinute",
                reason: String::from("must be at least 1 when set"),
            });
        }

        if self.token_cache_minutes >= UPSTREAM_TOKEN_LIFETIME_MINUTES {
            tracing::warn!(
                token_cache_minutes = self.token_cache_minutes,
                upstream_lifetime_minutes = UPSTREAM_TOKEN_LIFETIME_MINUTES,
                "config.token_cache_exceeds_lifetime"
            );
        }

        Ok(())
    }

    pub fn authorize_url(&self) -> String {
        join_url(&self.base_url, &self.authorize_path)
    }

    pub fn organizations_url(&self) -> String {
        join_url(&self.base_url, &self.organizations_path)
    }

    /// Resource URL below the organizations path, e.g. `firmographics` or `42/outlook`.
    pub fn organization_resource_url(&self, suffix: &str) -> String {
        join_url(&self.organizations_url(), suffix)
    }

    /// URL of a resource that sits next to the organizations path, e.g. `chatcbi`.
    pub fn sibling_resource_url(&self, resource: &str) -> String {
        let parent = self
            .organizations_path
            .trim_matches('/')
            .rsplit_once('/')
            .map(|(parent, _)| parent)
            .unwrap_or("");
        join_url(&join_url(&self.base_url, parent), resource)
    }

    pub fn token_cache_duration(&self) -> time::Duration {
        time::Duration::minutes(i64::from(self.token_cache_minutes))
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::exponential(self.max_retries)
    }

    pub fn circuit_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.circuit_failure_threshold,
            open_timeout: Duration::from_secs(self.circuit_open_secs),
        }
    }
}

fn parse_env<T: FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    match value.trim().parse() {
        Ok(parsed) => Ok(parsed),
        Err(_) => Err(ConfigError::InvalidEnv { name, value }),
    }
}

fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_matches('/');
    if path.is_empty() {
        base.to_owned()
    } else {
        format!("{base}/{path}")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    fn valid() -> UpstreamConfig {
        UpstreamConfig::new("https://api.example.test/", "client", "secret")
    }

    #[test]
    fn defaults_match_upstream_conventions() {
        let config = UpstreamConfig::default();

        assert_eq!(config.token_cache_minutes, 55);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.circuit_failure_threshold, 5);
        assert_eq!(config.circuit_open_secs, 30);
        assert_eq!(config.authorize_url(), "https://api.cbinsights.com/v2/authorize");
    }

    #[test]
    fn urls_join_without_duplicate_slashes() {
        let config = valid();

        assert_eq!(
            config.organization_resource_url("42/outlook"),
            "https://api.example.test/v2/organizations/42/outlook"
        );
        assert_eq!(
            config.sibling_resource_url("chatcbi"),
            "https://api.example.test/v2/chatcbi"
        );
    }

    #[test]
    fn missing_credentials_are_rejected() {
        let config = UpstreamConfig::default();

        let error = config.validate().expect_err("client id is required");
        assert!(matches!(error, ConfigError::Missing { field: "clientId" }));
    }

    #[test]
    fn token_cache_bounds_are_enforced() {
        for minutes in [0, 241] {
            let config = UpstreamConfig {
                token_cache_minutes: minutes,
                ..valid()
            };
            assert!(config.validate().is_err(), "{minutes} should be rejected");
        }
        for minutes in [1, 55, 120, 240] {
            let config = UpstreamConfig {
                token_cache_minutes: minutes,
                ..valid()
            };
            assert!(config.validate().is_ok(), "{minutes} should be accepted");
        }
    }

    #[test]
    fn relative_base_url_is_rejected() {
        let config = UpstreamConfig {
            base_url: String::from("api.example.test"),
            ..valid()
        };

        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "baseUrl", .. })
        ));
    }

    #[test]
    fn environment_overrides_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_CLIENT_ID, "env-client"),
            (ENV_TOKEN_CACHE_MINUTES, "30"),
            (ENV_CLIENT_SECRET, "  "),
        ]);

        let config = valid()
            .with_env_overrides(|name| env.get(name).map(|value| (*value).to_owned()))
            .expect("overrides should apply");

        assert_eq!(config.client_id, "env-client");
        assert_eq!(config.token_cache_minutes, 30);
        assert_eq!(config.client_secret, "secret");
    }

    #[test]
    fn transport_tuning_can_come_from_environment() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_REQUEST_TIMEOUT_MS, "2500"),
            (ENV_MAX_RETRIES, "1"),
            (ENV_CIRCUIT_FAILURE_THRESHOLD, " 8 "),
            (ENV_CIRCUIT_OPEN_SECS, "90"),
            (ENV_REQUESTS_PER_MINUTE, "120"),
        ]);

        let config = valid()
            .with_env_overrides(|name| env.get(name).map(|value| (*value).to_owned()))
            .expect("overrides should apply");

        assert_eq!(config.request_timeout(), Some(Duration::from_millis(2500)));
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.circuit_failure_threshold, 8);
        assert_eq!(config.circuit_open_secs, 90);
        assert_eq!(config.requests_per_minute, Some(120));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn negative_retry_count_in_env_is_an_error() {
        let error = valid()
            .with_env_overrides(|name| (name == ENV_MAX_RETRIES).then(|| String::from("-1")))
            .expect_err("retries are unsigned");

        assert!(matches!(
            error,
            ConfigError::InvalidEnv {
                name: ENV_MAX_RETRIES,
                ..
            }
        ));
    }

    #[test]
    fn non_numeric_cache_minutes_in_env_is_an_error() {
        let error = valid()
            .with_env_overrides(|name| {
                (name == ENV_TOKEN_CACHE_MINUTES).then(|| String::from("soon"))
            })
            .expect_err("value is not a number");

        assert!(matches!(
            error,
            ConfigError::InvalidEnv {
                name: ENV_TOKEN_CACHE_MINUTES,
                ..
            }
        ));
    }

    #[test]
    fn json_file_fills_missing_fields_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"{{"clientId":"file-client","clientSecret":"file-secret","maxRetries":5}}"#
        )
        .expect("write config");

        let config = UpstreamConfig::from_json_file(file.path()).expect("config should parse");

        assert_eq!(config.client_id, "file-client");
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.token_cache_minutes, 55);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn debug_output_redacts_secret() {
        let config = UpstreamConfig::new("https://api.example.test", "client", "s3cr3t-value");
        assert!(!format!("{config:?}").contains("s3cr3t-value"));
    }
}
