//! Upstream refresh error types.

use crate::errors::BridgeError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpstreamError {
    /// 429: upstream could not keep up and dropped the request.
    #[error("Upstream overloaded (429) accessing {url}")]
    Overloaded { url: String },

    #[error("Status code {status} accessing {url}")]
    Status { status: u16, url: String },

    #[error("Timed out after {timeout_ms}ms accessing {url}")]
    Timeout { url: String, timeout_ms: u64 },

    #[error("Connection refused accessing {url}")]
    ConnectionRefused { url: String },

    #[error("Connection failed accessing {url}: {message}")]
    Connect { url: String, message: String },

    #[error("Transport error accessing {url}: {message}")]
    Transport { url: String, message: String },

    #[error("Invalid JSON body from {url}: {message}")]
    InvalidBody { url: String, message: String },
}

impl UpstreamError {
    pub fn url(&self) -> &str {
        match self {
            UpstreamError::Overloaded { url }
            | UpstreamError::Status { url, .. }
            | UpstreamError::Timeout { url, .. }
            | UpstreamError::ConnectionRefused { url }
            | UpstreamError::Connect { url, .. }
            | UpstreamError::Transport { url, .. }
            | UpstreamError::InvalidBody { url, .. } => url,
        }
    }

    /// HTTP status, when the upstream answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            UpstreamError::Overloaded { .. } => Some(429),
            UpstreamError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Failures where no HTTP response was received.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            UpstreamError::Timeout { .. }
                | UpstreamError::ConnectionRefused { .. }
                | UpstreamError::Connect { .. }
                | UpstreamError::Transport { .. }
        )
    }

    /// Short, human-friendly failure class used in alerts.
    pub fn label(&self) -> &'static str {
        match self {
            UpstreamError::Timeout { .. } => "TimeoutError",
            UpstreamError::ConnectionRefused { .. } => "ConnectionRefusedError",
            UpstreamError::Connect { .. } => "ConnectionError",
            UpstreamError::Transport { .. } => "TransportError",
            UpstreamError::InvalidBody { .. } => "InvalidBodyError",
            UpstreamError::Overloaded { .. } | UpstreamError::Status { .. } => "UpstreamError",
        }
    }
}

impl BridgeError for UpstreamError {
    fn error_code(&self) -> &'static str {
        match self {
            UpstreamError::Overloaded { .. } => "UPSTREAM_OVERLOADED",
            UpstreamError::Status { .. } => "UPSTREAM_HTTP_ERROR",
            UpstreamError::Timeout { .. } => "UPSTREAM_TIMEOUT",
            UpstreamError::ConnectionRefused { .. } => "UPSTREAM_CONNECTION_REFUSED",
            UpstreamError::Connect { .. } => "UPSTREAM_CONNECT_FAILED",
            UpstreamError::Transport { .. } => "UPSTREAM_TRANSPORT_ERROR",
            UpstreamError::InvalidBody { .. } => "UPSTREAM_INVALID_BODY",
        }
    }
}
