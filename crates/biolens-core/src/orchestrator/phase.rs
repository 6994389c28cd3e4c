//! Progress of one pipeline run.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::stages::StageKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelinePhase {
    NotStarted,
    ImageDone,
    AudioDone,
    ReasoningDone,
    TreatmentDone,
    Completed,
    Failed,
}

impl PipelinePhase {
    /// The stage this phase waits on, if any.
    pub fn next_stage(&self) -> Option<StageKind> {
        match self {
            Self::NotStarted => Some(StageKind::ImageAnalysis),
            Self::ImageDone => Some(StageKind::SymptomExtraction),
            Self::AudioDone => Some(StageKind::Reasoning),
            Self::ReasoningDone => Some(StageKind::TreatmentPlanning),
            Self::TreatmentDone | Self::Completed | Self::Failed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Phase after `stage` succeeds, or `None` if `stage` is not the one
    /// this phase is waiting for.
    pub fn advance(self, stage: StageKind) -> Option<Self> {
        if self.next_stage() != Some(stage) {
            return None;
        }
        Some(match stage {
            StageKind::ImageAnalysis => Self::ImageDone,
            StageKind::SymptomExtraction => Self::AudioDone,
            StageKind::Reasoning => Self::ReasoningDone,
            StageKind::TreatmentPlanning => Self::TreatmentDone,
        })
    }

    /// Phase after the case has been annotated.
    pub fn complete(self) -> Option<Self> {
        (self == Self::TreatmentDone).then_some(Self::Completed)
    }
}

impl fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotStarted => "not_started",
            Self::ImageDone => "image_done",
            Self::AudioDone => "audio_done",
            Self::ReasoningDone => "reasoning_done",
            Self::TreatmentDone => "treatment_done",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phases_follow_dependency_order() {
        let mut phase = PipelinePhase::NotStarted;
        for stage in [
            StageKind::ImageAnalysis,
            StageKind::SymptomExtraction,
            StageKind::Reasoning,
            StageKind::TreatmentPlanning,
        ] {
            phase = phase.advance(stage).unwrap();
        }
        assert_eq!(phase, PipelinePhase::TreatmentDone);
        assert_eq!(phase.complete(), Some(PipelinePhase::Completed));
    }

    #[test]
    fn test_out_of_order_stage_is_rejected() {
        assert_eq!(
            PipelinePhase::NotStarted.advance(StageKind::Reasoning),
            None
        );
        assert_eq!(
            PipelinePhase::ImageDone.advance(StageKind::ImageAnalysis),
            None
        );
        assert_eq!(PipelinePhase::AudioDone.complete(), None);
    }

    #[test]
    fn test_terminal_phases() {
        assert!(PipelinePhase::Failed.is_terminal());
        assert!(PipelinePhase::Completed.is_terminal());
        assert!(PipelinePhase::Failed.next_stage().is_none());
        assert!(!PipelinePhase::TreatmentDone.is_terminal());
    }
}
