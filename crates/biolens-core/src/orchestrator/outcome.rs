use serde::{Deserialize, Serialize};

use biolens_domain::{CaseId, DifferentialDiagnosis, TreatmentProtocol};

/// Consolidated result of a fully successful pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineOutcome {
    pub case_id: CaseId,
    pub primary_diagnosis: DifferentialDiagnosis,
    pub alternative_diagnoses: Vec<DifferentialDiagnosis>,
    pub treatment_protocol: TreatmentProtocol,
    /// The model's chain of reasoning, empty when its output was unstructured.
    pub reasoning_steps: Vec<String>,
    /// One message per stage, in execution order.
    pub trace: Vec<String>,
    pub duration_ms: u64,
}

impl PipelineOutcome {
    /// Whether any part of the outcome came from unparseable model output
    /// and needs clinician review.
    pub fn needs_review(&self) -> bool {
        self.primary_diagnosis.is_unstructured() || self.treatment_protocol.is_unstructured()
    }
}
