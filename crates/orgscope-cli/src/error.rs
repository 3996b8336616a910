use orgscope_core::{ConfigError, UpstreamError, UpstreamErrorKind};
use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            Self::Upstream(error) => match error.kind() {
                UpstreamErrorKind::Validation => 2,
                UpstreamErrorKind::AuthFailure => 4,
                UpstreamErrorKind::UpstreamRequestFailure => 5,
                UpstreamErrorKind::Transient => 6,
                UpstreamErrorKind::Unexpected => 7,
                UpstreamErrorKind::Cancelled => 130,
            },
            Self::Serialization(_) => 7,
            Self::Io(_) => 10,
        }
    }
}
