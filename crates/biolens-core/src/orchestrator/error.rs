//! Error types for pipeline runs.

use biolens_domain::{CaseId, DomainError, StorageError};

use crate::resilience::CallError;
use crate::stages::StageKind;

/// Every way a pipeline run can fail. The case record is never modified
/// when one of these is returned.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("case {case_id} not found")]
    CaseNotFound { case_id: CaseId },

    /// A required stage failed; the trace holds every message accumulated
    /// up to and including the failure, for human review.
    #[error("{stage} stage failed: {source}")]
    StageFailed {
        stage: StageKind,
        #[source]
        source: CallError,
        trace: Vec<String>,
    },

    #[error("pipeline run cancelled")]
    Cancelled,

    #[error("case cannot be diagnosed: {0}")]
    State(#[from] DomainError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl PipelineError {
    /// Partial trace for a stage failure, empty otherwise.
    pub fn trace(&self) -> &[String] {
        match self {
            Self::StageFailed { trace, .. } => trace,
            _ => &[],
        }
    }

    /// The model is unavailable right now; callers may take an offline path
    /// instead of retrying.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::StageFailed { source, .. } if source.is_circuit_open())
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
