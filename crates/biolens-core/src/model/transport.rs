//! The seam between the resilience layer and the network.

use async_trait::async_trait;

use super::request::{ModelRequest, ModelResponse};

/// Failure of a single attempt against the model endpoint.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out after {limit_ms}ms")]
    Timeout { limit_ms: u64 },

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("model endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The endpoint answered 2xx but the envelope was unusable.
    #[error("unexpected response from model endpoint: {0}")]
    Protocol(String),
}

impl TransportError {
    /// Timeouts, connection failures, server errors and rate limiting are
    /// worth retrying; everything else is not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Connection(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429 || *status == 408,
            Self::Protocol(_) => false,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// One network round-trip to the model. Implementations perform a single
/// attempt and never retry; that is the caller's job.
#[async_trait]
pub trait ModelTransport: Send + Sync {
    async fn send(&self, request: &ModelRequest) -> TransportResult<ModelResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> TransportError {
        TransportError::Status {
            status: code,
            body: String::new(),
        }
    }

    #[test]
    fn test_transient_classification() {
        assert!(TransportError::Timeout { limit_ms: 1 }.is_transient());
        assert!(TransportError::Connection("reset".into()).is_transient());
        assert!(status(500).is_transient());
        assert!(status(503).is_transient());
        assert!(status(429).is_transient());

        assert!(!status(400).is_transient());
        assert!(!status(401).is_transient());
        assert!(!status(404).is_transient());
        assert!(!TransportError::Protocol("no candidates".into()).is_transient());
    }
}
