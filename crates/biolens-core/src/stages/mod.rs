//! The four stage agents of the diagnostic pipeline.
//!
//! Every stage has the same shape: build a deterministic request from its
//! inputs and the case, make exactly one call through the shared
//! [`ResilientCaller`], and interpret the reply as a [`StagePayload`].
//! Stages never retry on their own.

pub mod audio;
pub mod image;
pub mod payload;
pub mod reasoning;
pub mod treatment;

use std::fmt;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use biolens_domain::DiagnosticCase;

use crate::model::ModelRequest;
use crate::resilience::{CallError, ResilientCaller};

pub use audio::{ResolvedAudio, Symptom, SymptomExtractionStage, SymptomFindings};
pub use image::{ImageAnalysisStage, ImageFinding, ImageFindings, ResolvedImage};
pub use payload::StagePayload;
pub use reasoning::{DiagnosisReport, ReasoningInput, ReasoningStage};
pub use treatment::TreatmentPlanningStage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    ImageAnalysis,
    SymptomExtraction,
    Reasoning,
    TreatmentPlanning,
}

impl StageKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::ImageAnalysis => "image analysis",
            Self::SymptomExtraction => "symptom extraction",
            Self::Reasoning => "reasoning",
            Self::TreatmentPlanning => "treatment planning",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of one stage run. Never persisted.
#[derive(Debug, Clone)]
pub struct StageResult<T> {
    pub stage: StageKind,
    pub payload: Option<StagePayload<T>>,
    pub messages: Vec<String>,
    pub error: Option<CallError>,
}

impl<T> StageResult<T> {
    pub fn succeeded(stage: StageKind, payload: StagePayload<T>, message: String) -> Self {
        Self {
            stage,
            payload: Some(payload),
            messages: vec![message],
            error: None,
        }
    }

    pub fn failed(stage: StageKind, error: CallError) -> Self {
        Self {
            stage,
            payload: None,
            messages: vec![format!("{stage} failed: {error}")],
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.payload.is_some()
    }

    /// The model call was abandoned on cancellation.
    pub fn is_cancelled(&self) -> bool {
        self.error.as_ref().is_some_and(CallError::is_cancelled)
    }
}

#[async_trait]
pub trait StageAgent: Send + Sync {
    type Input: Send + Sync;
    type Output: DeserializeOwned + Send;

    fn kind(&self) -> StageKind;

    fn caller(&self) -> &ResilientCaller;

    /// Output to report without calling the model, for an absent
    /// modality. `None` means the stage must run.
    fn skip(&self, _input: &Self::Input) -> Option<(Self::Output, String)> {
        None
    }

    fn build_request(&self, input: &Self::Input, case: &DiagnosticCase) -> ModelRequest;

    fn completion_message(&self, input: &Self::Input, output: &Self::Output) -> String;

    async fn run(
        &self,
        input: &Self::Input,
        case: &DiagnosticCase,
        cancel: &CancellationToken,
    ) -> StageResult<Self::Output> {
        let kind = self.kind();
        if let Some((output, message)) = self.skip(input) {
            return StageResult::succeeded(kind, StagePayload::Structured(output), message);
        }

        let request = self.build_request(input, case);
        match self.caller().call(&request, cancel).await {
            Ok(response) => match StagePayload::parse(&response.text) {
                StagePayload::Structured(output) => {
                    let message = self.completion_message(input, &output);
                    StageResult::succeeded(kind, StagePayload::Structured(output), message)
                }
                StagePayload::RawText(raw) => {
                    warn!(stage = %kind, "keeping unstructured model output");
                    let message = format!("{kind} completed with unstructured output");
                    StageResult::succeeded(kind, StagePayload::RawText(raw), message)
                }
            },
            Err(err) => StageResult::failed(kind, err),
        }
    }
}

/// Render a list for a prompt, or `fallback` when empty.
pub(crate) fn join_or(items: &[String], fallback: &str) -> String {
    if items.is_empty() {
        fallback.to_string()
    } else {
        items.join(", ")
    }
}
