use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// A single calendar record that cannot be aggregated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("interval has no person id")]
    MissingPersonId,
    #[error("interval end is not after its start")]
    EndNotAfterStart,
}

/// Failure talking to a vendor API. Passed through to the presentation layer unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("rate limited: {message}")]
    RateLimit {
        message: String,
        retry_after: Option<u64>,
    },
    #[error("network error: {0}")]
    Network(String),
}

impl UpstreamError {
    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamError::Auth(_) => "auth",
            UpstreamError::RateLimit { .. } => "rate_limit",
            UpstreamError::Network(_) => "network",
        }
    }

    pub fn remediation(&self) -> String {
        match self {
            UpstreamError::Auth(_) => {
                "Check the API credentials in your config file and restart the dashboard."
                    .to_string()
            }
            UpstreamError::RateLimit {
                retry_after: Some(secs),
                ..
            } => format!("The API is throttling requests. Try again in {} seconds.", secs),
            UpstreamError::RateLimit { .. } => {
                "The API is throttling requests. Try again in a few minutes.".to_string()
            }
            UpstreamError::Network(_) => {
                "The API could not be reached. Refresh to try again.".to_string()
            }
        }
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        UpstreamError::Network(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Calendar,
    TimeBudget,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Calendar => write!(f, "Outlook calendar"),
            DataSource::TimeBudget => write!(f, "BigTime"),
        }
    }
}

/// Run-level failure of a dashboard refresh.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunError {
    #[error("{origin} error: {error}")]
    Upstream {
        origin: DataSource,
        error: UpstreamError,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing configuration: {0}")]
    Missing(String),
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config line {line}: {content}")]
    Parse { line: usize, content: String },
    #[error("failed to load calendar fixture: {0}")]
    Fixture(String),
}
