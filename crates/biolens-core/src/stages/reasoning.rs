//! Differential diagnosis from the intake findings plus patient and
//! regional context.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use biolens_domain::{DiagnosticCase, DifferentialDiagnosis};

use super::audio::SymptomFindings;
use super::image::ImageFindings;
use super::{join_or, StageAgent, StageKind, StagePayload};
use crate::model::{GenerationConfig, ModelRequest};
use crate::resilience::ResilientCaller;

/// Both intake stages' outputs; reasoning cannot start without them.
#[derive(Debug, Clone)]
pub struct ReasoningInput {
    pub image_findings: StagePayload<ImageFindings>,
    pub symptom_findings: StagePayload<SymptomFindings>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisReport {
    #[serde(default)]
    pub reasoning_steps: Vec<String>,
    pub primary_diagnosis: DifferentialDiagnosis,
    #[serde(default)]
    pub alternative_diagnoses: Vec<DifferentialDiagnosis>,
}

pub struct ReasoningStage {
    caller: Arc<ResilientCaller>,
    generation: GenerationConfig,
}

impl ReasoningStage {
    pub fn new(caller: Arc<ResilientCaller>, generation: GenerationConfig) -> Self {
        Self { caller, generation }
    }
}

fn prompt(input: &ReasoningInput, case: &DiagnosticCase) -> String {
    let patient = case.patient();
    let context = case.context();
    let conditions: Vec<String> = patient
        .medical_history
        .iter()
        .filter(|c| c.is_active)
        .map(|c| c.condition_name.clone())
        .collect();
    let allergies: Vec<String> = patient
        .known_allergies
        .iter()
        .map(|a| format!("{} ({})", a.allergen_name, a.reaction))
        .collect();

    format!(
        r#"You are a diagnostic physician. Reason step by step.

PATIENT
- Age: {age}
- Sex: {sex}
- Active conditions: {conditions}
- Allergies: {allergies}

SETTING
- Region: {country}, {region}
- Endemic diseases: {endemic}
- Facility level: {facility}

IMAGE FINDINGS
{images}

SYMPTOMS
{symptoms}

List the findings, group them by body system, weigh at least three
differential diagnoses against local epidemiology, and assign each a
confidence and urgency. Lower the confidence when evidence is thin.

Respond with JSON only:
{{
  "reasoningSteps": ["..."],
  "primaryDiagnosis": {{
    "conditionName": "...",
    "icd10Code": "...",
    "confidence": "Low|Medium|High",
    "supportingEvidence": ["..."],
    "warningFlags": ["..."],
    "urgency": "Routine|Urgent|Emergency|Critical"
  }},
  "alternativeDiagnoses": [ {{ same shape as primaryDiagnosis }} ]
}}"#,
        age = patient.age_label(),
        sex = patient.sex,
        conditions = join_or(&conditions, "none recorded"),
        allergies = join_or(&allergies, "none recorded"),
        country = context.region.country,
        region = context.region.region,
        endemic = join_or(&context.local_endemic_diseases, "none listed"),
        facility = context.facility_level,
        images = input.image_findings.to_prompt_text(),
        symptoms = input.symptom_findings.to_prompt_text(),
    )
}

impl StageAgent for ReasoningStage {
    type Input = ReasoningInput;
    type Output = DiagnosisReport;

    fn kind(&self) -> StageKind {
        StageKind::Reasoning
    }

    fn caller(&self) -> &ResilientCaller {
        &self.caller
    }

    fn build_request(&self, input: &ReasoningInput, case: &DiagnosticCase) -> ModelRequest {
        ModelRequest::new(prompt(input, case), self.generation.json())
    }

    fn completion_message(&self, _input: &ReasoningInput, output: &DiagnosisReport) -> String {
        format!(
            "Differential diagnosis generated: {} ({} alternative(s))",
            output.primary_diagnosis.condition_name,
            output.alternative_diagnoses.len()
        )
    }
}
