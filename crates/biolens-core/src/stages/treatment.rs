//! Treatment planning constrained to what the facility actually has.

use std::sync::Arc;

use biolens_domain::{DiagnosticCase, TreatmentProtocol};

use super::reasoning::DiagnosisReport;
use super::{join_or, StageAgent, StageKind, StagePayload};
use crate::model::{GenerationConfig, ModelRequest};
use crate::resilience::ResilientCaller;

pub struct TreatmentPlanningStage {
    caller: Arc<ResilientCaller>,
    generation: GenerationConfig,
}

impl TreatmentPlanningStage {
    pub fn new(caller: Arc<ResilientCaller>, generation: GenerationConfig) -> Self {
        Self { caller, generation }
    }
}

fn prompt(diagnosis: &StagePayload<DiagnosisReport>, case: &DiagnosticCase) -> String {
    let context = case.context();
    let language = match context.cultural_context.primary_language.as_str() {
        "" => "not specified",
        lang => lang,
    };
    format!(
        r#"You are writing a treatment protocol for a resource-constrained setting.

DIAGNOSIS
{diagnosis}

PATIENT AGE: {age}

AVAILABLE RESOURCES
- Medications: {medications}
- Facility: {facility}
- Primary language: {language}

Prescribe ONLY from the medications listed above; if none fit, say so in the
steps and escalate. Give step-by-step instructions, age-appropriate dosing,
contraindications, follow-up signs and escalation triggers.

Respond with JSON only:
{{
  "protocolName": "...",
  "steps": [{{"stepNumber": 1, "instruction": "...", "durationMinutes": 0, "requiredMaterials": ["..."]}}],
  "medications": [{{"medicationName": "...", "dosage": "...", "frequency": "...", "durationDays": 0, "contraindications": ["..."]}}],
  "contraindications": ["..."],
  "followUp": {{"improvementSigns": ["..."], "worseningSigns": ["..."], "followUpDays": 0}},
  "escalationCriteria": {{"escalationCriteria": ["..."], "escalationUrgency": "Urgent|Emergency", "recommendedFacility": "..."}}
}}"#,
        diagnosis = diagnosis.to_prompt_text(),
        age = case.patient().age_label(),
        medications = join_or(&context.available_medications, "none"),
        facility = context.facility_level,
    )
}

impl StageAgent for TreatmentPlanningStage {
    type Input = StagePayload<DiagnosisReport>;
    type Output = TreatmentProtocol;

    fn kind(&self) -> StageKind {
        StageKind::TreatmentPlanning
    }

    fn caller(&self) -> &ResilientCaller {
        &self.caller
    }

    fn build_request(&self, input: &Self::Input, case: &DiagnosticCase) -> ModelRequest {
        ModelRequest::new(prompt(input, case), self.generation.json())
    }

    fn completion_message(&self, _input: &Self::Input, output: &TreatmentProtocol) -> String {
        format!(
            "Treatment protocol created: {} ({} medication(s))",
            output.protocol_name,
            output.medications.len()
        )
    }
}
