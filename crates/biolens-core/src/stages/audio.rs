//! Symptom extraction from the health worker's spoken description.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use biolens_domain::{AudioSymptomDescription, DiagnosticCase};

use super::{StageAgent, StageKind};
use crate::model::{GenerationConfig, MediaPart, ModelRequest};
use crate::resilience::ResilientCaller;

/// The case's audio description with its recording bytes, if any.
#[derive(Debug, Clone)]
pub struct ResolvedAudio {
    pub description: AudioSymptomDescription,
    pub recording: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Symptom {
    pub symptom: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub onset: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymptomFindings {
    #[serde(default)]
    pub symptoms: Vec<Symptom>,
    #[serde(default)]
    pub emergency_flags: Vec<String>,
    #[serde(default)]
    pub additional_info: String,
}

pub struct SymptomExtractionStage {
    caller: Arc<ResilientCaller>,
    generation: GenerationConfig,
}

impl SymptomExtractionStage {
    pub fn new(caller: Arc<ResilientCaller>, generation: GenerationConfig) -> Self {
        Self { caller, generation }
    }
}

fn prompt(audio: &ResolvedAudio) -> String {
    let d = &audio.description;
    let transcript = d
        .transcribed_text
        .as_deref()
        .unwrap_or("[not transcribed; use the attached recording]");
    format!(
        r#"You are a medical scribe. A health worker described the patient's symptoms aloud.

Language: {language}
Duration: {duration} seconds
Transcript: {transcript}

1. Extract every symptom mentioned, with severity, duration and onset.
2. Flag anything that indicates an emergency.

Respond with JSON only:
{{
  "symptoms": [
    {{"symptom": "...", "severity": "Mild|Moderate|Severe", "duration": "...", "onset": "..."}}
  ],
  "emergencyFlags": ["..."],
  "additionalInfo": "..."
}}"#,
        language = d.language_code,
        duration = d.duration_seconds,
    )
}

impl StageAgent for SymptomExtractionStage {
    type Input = Option<ResolvedAudio>;
    type Output = SymptomFindings;

    fn kind(&self) -> StageKind {
        StageKind::SymptomExtraction
    }

    fn caller(&self) -> &ResilientCaller {
        &self.caller
    }

    fn skip(&self, input: &Self::Input) -> Option<(SymptomFindings, String)> {
        input.is_none().then(|| {
            (
                SymptomFindings {
                    additional_info: "No audio description was provided.".to_string(),
                    ..SymptomFindings::default()
                },
                "No audio attached; symptom extraction skipped".to_string(),
            )
        })
    }

    fn build_request(&self, input: &Self::Input, _case: &DiagnosticCase) -> ModelRequest {
        let Some(audio) = input else {
            return ModelRequest::new(String::new(), self.generation.json());
        };
        let request = ModelRequest::new(prompt(audio), self.generation.json());
        match &audio.recording {
            Some(bytes) => request.with_media(MediaPart::wav(bytes.clone())),
            None => request,
        }
    }

    fn completion_message(&self, _input: &Self::Input, output: &SymptomFindings) -> String {
        format!(
            "Extracted {} symptom(s) from audio description; {} emergency flag(s)",
            output.symptoms.len(),
            output.emergency_flags.len()
        )
    }
}
