use nftel_protocol::Endpoint;
use std::path::PathBuf;
use thiserror::Error;

/// Why a single fetch against the aggregation service failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The request could not be sent or the response could not be read.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The service answered with a non-success status.
    #[error("API error {status}: {status_text}")]
    Http { status: u16, status_text: String },

    /// The body did not match the shape the endpoint promises.
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl GatewayError {
    /// Decode failures are terminal for an attempt; everything else may be
    /// retried once.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, GatewayError::Decode(_))
    }
}

/// Errors surfaced by the query cache to its consumers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error(transparent)]
    Fetch(#[from] GatewayError),

    #[error("cached payload for `{actual}` cannot be read as `{expected}`")]
    PayloadMismatch { expected: Endpoint, actual: Endpoint },

    #[error("fetch for `{0}` ended without a result")]
    Interrupted(Endpoint),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type Result<T, E = CacheError> = std::result::Result<T, E>;
