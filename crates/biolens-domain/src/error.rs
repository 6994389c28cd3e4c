//! Domain-level error taxonomy for BioLens.

use crate::case::CaseStatus;

/// Errors produced by case aggregate operations.
///
/// Every variant is recoverable: the aggregate is left exactly as it was
/// before the failing call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    #[error("capacity exceeded: at most {limit} images per case")]
    ImageCapacity { limit: usize },

    #[error("state violation: cannot {operation} while case is {status}")]
    StateViolation {
        operation: &'static str,
        status: CaseStatus,
    },

    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
}

/// Errors produced by the persistence collaborators.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("case not found: {case_id}")]
    CaseNotFound { case_id: String },

    #[error("media not found: {digest}")]
    MediaNotFound { digest: String },

    #[error("invalid content digest: {digest}")]
    InvalidDigest { digest: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage task failed: {0}")]
    Task(String),
}

/// Result type for case aggregate operations.
pub type DomainResult<T> = std::result::Result<T, DomainError>;

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
