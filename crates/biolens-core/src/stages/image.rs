//! Image analysis: describe visible findings in every case image.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use biolens_domain::{ConfidenceLevel, DiagnosticCase, MedicalImage};

use super::{StageAgent, StageKind};
use crate::model::{GenerationConfig, MediaPart, ModelRequest};
use crate::resilience::ResilientCaller;

/// A case image together with its bytes from the media store.
#[derive(Debug, Clone)]
pub struct ResolvedImage {
    pub image: MedicalImage,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageFinding {
    #[serde(default)]
    pub image_id: String,
    #[serde(default)]
    pub observations: Vec<String>,
    #[serde(default)]
    pub suspected_conditions: Vec<String>,
    #[serde(default)]
    pub red_flags: Vec<String>,
    #[serde(default)]
    pub confidence: ConfidenceLevel,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageFindings {
    #[serde(default)]
    pub findings: Vec<ImageFinding>,
    #[serde(default)]
    pub overall_assessment: String,
}

pub struct ImageAnalysisStage {
    caller: Arc<ResilientCaller>,
    generation: GenerationConfig,
}

impl ImageAnalysisStage {
    pub fn new(caller: Arc<ResilientCaller>, generation: GenerationConfig) -> Self {
        Self { caller, generation }
    }
}

fn prompt(images: &[ResolvedImage]) -> String {
    let listing: String = images
        .iter()
        .enumerate()
        .map(|(i, r)| format!("{}. id {} ({})\n", i + 1, r.image.id, r.image.image_type))
        .collect();
    format!(
        r#"You are a medical image analyst. {count} image(s) are attached, in this order:
{listing}
For each image:
1. Describe visible symptoms, lesions or abnormalities (colour, texture, size, location).
2. Note any red flags.
3. Suggest conditions consistent with the findings. Do not diagnose.

Respond with JSON only:
{{
  "findings": [
    {{
      "imageId": "<id from the list above>",
      "observations": ["..."],
      "suspectedConditions": ["..."],
      "redFlags": ["..."],
      "confidence": "Low|Medium|High"
    }}
  ],
  "overallAssessment": "..."
}}"#,
        count = images.len(),
    )
}

impl StageAgent for ImageAnalysisStage {
    type Input = Vec<ResolvedImage>;
    type Output = ImageFindings;

    fn kind(&self) -> StageKind {
        StageKind::ImageAnalysis
    }

    fn caller(&self) -> &ResilientCaller {
        &self.caller
    }

    fn skip(&self, input: &Self::Input) -> Option<(ImageFindings, String)> {
        input.is_empty().then(|| {
            (
                ImageFindings {
                    findings: Vec::new(),
                    overall_assessment: "No images were provided.".to_string(),
                },
                "No images attached; image analysis skipped".to_string(),
            )
        })
    }

    fn build_request(&self, input: &Self::Input, _case: &DiagnosticCase) -> ModelRequest {
        input.iter().fold(
            ModelRequest::new(prompt(input), self.generation.json()),
            |req, r| req.with_media(MediaPart::jpeg(r.bytes.clone())),
        )
    }

    fn completion_message(&self, input: &Self::Input, output: &ImageFindings) -> String {
        let red_flags: usize = output.findings.iter().map(|f| f.red_flags.len()).sum();
        format!(
            "Analyzed {} image(s); {} red flag(s) noted",
            input.len(),
            red_flags
        )
    }
}
