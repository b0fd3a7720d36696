//! Error types for the upstream status client.

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid status query url '{url}'")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("status query timed out after {}ms", timeout.as_millis())]
    Timeout { url: String, timeout: Duration },
    #[error("status query to {url} failed")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("upstream returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("failed to parse status payload")]
    Parse {
        url: String,
        #[source]
        source: anyhow::Error,
    },
}

impl FetchError {
    /// The URL the failed request was aimed at.
    pub fn url(&self) -> &str {
        match self {
            Self::InvalidUrl { url, .. }
            | Self::Timeout { url, .. }
            | Self::Request { url, .. }
            | Self::Status { url, .. }
            | Self::Parse { url, .. } => url,
        }
    }

    /// Short machine-readable tag, used in logs and skip reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidUrl { .. } => "invalid_url",
            Self::Timeout { .. } => "timeout",
            Self::Request { .. } => "request",
            Self::Status { .. } => "status",
            Self::Parse { .. } => "parse",
        }
    }
}
