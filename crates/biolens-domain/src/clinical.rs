//! Clinical record types: labelled enums, differential diagnoses, and
//! treatment protocols.
//!
//! These types double as the structured schemas the stage agents ask the
//! model to return, so field names follow the model's camelCase JSON and
//! enum labels parse case-insensitively ("high", "HIGH", "High" are equal).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Lowercased alphanumerics only, so "Basic_Health-Post" matches "BasicHealthPost".
fn normalize_label(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

macro_rules! labelled_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$( $name::$variant ),+];

            /// Canonical label.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $label ),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let key = normalize_label(s);
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| normalize_label(v.as_str()) == key)
                    .ok_or_else(|| DomainError::InvalidValue {
                        field: stringify!($name),
                        value: s.to_string(),
                    })
            }
        }

        impl TryFrom<String> for $name {
            type Error = DomainError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                s.parse()
            }
        }

        impl From<$name> for String {
            fn from(v: $name) -> String {
                v.as_str().to_string()
            }
        }
    };
}

labelled_enum! {
    /// How strongly the evidence supports a finding.
    ConfidenceLevel {
        Low => "Low",
        Medium => "Medium",
        High => "High",
        VeryHigh => "VeryHigh",
    }
}

labelled_enum! {
    /// How quickly a condition must be acted on.
    UrgencyLevel {
        Routine => "Routine",
        Urgent => "Urgent",
        Emergency => "Emergency",
        Critical => "Critical",
    }
}

labelled_enum! {
    /// Anatomical subject of a captured image.
    ImageType {
        Skin => "Skin",
        Wound => "Wound",
        Rash => "Rash",
        Eyes => "Eyes",
        Throat => "Throat",
        Limb => "Limb",
        Other => "Other",
    }
}

labelled_enum! {
    BiologicalSex {
        Male => "Male",
        Female => "Female",
        Intersex => "Intersex",
        Unknown => "Unknown",
    }
}

labelled_enum! {
    AgeUnit {
        Days => "Days",
        Weeks => "Weeks",
        Months => "Months",
        Years => "Years",
    }
}

labelled_enum! {
    /// Capability tier of the facility where the case is handled.
    FacilityLevel {
        BasicHealthPost => "BasicHealthPost",
        RuralClinic => "RuralClinic",
        DistrictHospital => "DistrictHospital",
        ReferralHospital => "ReferralHospital",
    }
}

impl Default for ConfidenceLevel {
    fn default() -> Self {
        ConfidenceLevel::Low
    }
}

impl Default for UrgencyLevel {
    fn default() -> Self {
        UrgencyLevel::Routine
    }
}

/// Warning attached to records synthesized from unparseable model output.
pub const UNSTRUCTURED_REVIEW_FLAG: &str =
    "model output could not be parsed; clinician review of the raw text is required";

/// One candidate condition in a differential diagnosis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DifferentialDiagnosis {
    pub condition_name: String,
    #[serde(default)]
    pub icd10_code: String,
    #[serde(default)]
    pub confidence: ConfidenceLevel,
    #[serde(default)]
    pub supporting_evidence: Vec<String>,
    #[serde(default)]
    pub warning_flags: Vec<String>,
    #[serde(default)]
    pub urgency: UrgencyLevel,
}

impl DifferentialDiagnosis {
    /// Wrap raw model text that did not match the diagnosis schema.
    ///
    /// Confidence is pinned to `Low` and the review flag is always present.
    pub fn unstructured(raw_text: &str) -> Self {
        Self {
            condition_name: "Unstructured assessment".to_string(),
            icd10_code: String::new(),
            confidence: ConfidenceLevel::Low,
            supporting_evidence: vec![raw_text.to_string()],
            warning_flags: vec![UNSTRUCTURED_REVIEW_FLAG.to_string()],
            urgency: UrgencyLevel::Routine,
        }
    }

    pub fn is_unstructured(&self) -> bool {
        self.warning_flags
            .iter()
            .any(|f| f == UNSTRUCTURED_REVIEW_FLAG)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreatmentStep {
    pub step_number: u32,
    pub instruction: String,
    #[serde(default)]
    pub duration_minutes: u32,
    #[serde(default)]
    pub required_materials: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicationRecommendation {
    pub medication_name: String,
    #[serde(default)]
    pub dosage: String,
    #[serde(default)]
    pub frequency: String,
    #[serde(default)]
    pub duration_days: u32,
    #[serde(default)]
    pub contraindications: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpGuidance {
    #[serde(default)]
    pub improvement_signs: Vec<String>,
    #[serde(default)]
    pub worsening_signs: Vec<String>,
    #[serde(default)]
    pub follow_up_days: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyEscalation {
    #[serde(default)]
    pub escalation_criteria: Vec<String>,
    #[serde(default = "default_escalation_urgency")]
    pub escalation_urgency: UrgencyLevel,
    #[serde(default)]
    pub recommended_facility: String,
}

fn default_escalation_urgency() -> UrgencyLevel {
    UrgencyLevel::Urgent
}

impl Default for EmergencyEscalation {
    fn default() -> Self {
        Self {
            escalation_criteria: Vec::new(),
            escalation_urgency: default_escalation_urgency(),
            recommended_facility: String::new(),
        }
    }
}

/// Resource-aware treatment plan for one diagnosis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreatmentProtocol {
    pub protocol_name: String,
    #[serde(default)]
    pub steps: Vec<TreatmentStep>,
    #[serde(default)]
    pub medications: Vec<MedicationRecommendation>,
    #[serde(default)]
    pub contraindications: Vec<String>,
    #[serde(default)]
    pub follow_up: FollowUpGuidance,
    #[serde(default)]
    pub escalation_criteria: EmergencyEscalation,
}

impl TreatmentProtocol {
    /// Wrap raw model text that did not match the protocol schema as a
    /// single instruction step.
    pub fn unstructured(raw_text: &str) -> Self {
        Self {
            protocol_name: "Unstructured protocol".to_string(),
            steps: vec![TreatmentStep {
                step_number: 1,
                instruction: raw_text.to_string(),
                duration_minutes: 0,
                required_materials: Vec::new(),
            }],
            medications: Vec::new(),
            contraindications: vec![UNSTRUCTURED_REVIEW_FLAG.to_string()],
            follow_up: FollowUpGuidance::default(),
            escalation_criteria: EmergencyEscalation::default(),
        }
    }

    pub fn is_unstructured(&self) -> bool {
        self.contraindications
            .iter()
            .any(|c| c == UNSTRUCTURED_REVIEW_FLAG)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_parse_case_insensitively() {
        assert_eq!("high".parse::<ConfidenceLevel>().unwrap(), ConfidenceLevel::High);
        assert_eq!("VERY_HIGH".parse::<ConfidenceLevel>().unwrap(), ConfidenceLevel::VeryHigh);
        assert_eq!(
            "rural-clinic".parse::<FacilityLevel>().unwrap(),
            FacilityLevel::RuralClinic
        );
        assert!("sideways".parse::<UrgencyLevel>().is_err());
    }

    #[test]
    fn test_enum_serializes_as_canonical_label() {
        let json = serde_json::to_string(&UrgencyLevel::Emergency).unwrap();
        assert_eq!(json, "\"Emergency\"");
        let back: UrgencyLevel = serde_json::from_str("\"emergency\"").unwrap();
        assert_eq!(back, UrgencyLevel::Emergency);
    }

    #[test]
    fn test_diagnosis_parses_model_schema_with_defaults() {
        let json = r#"{
            "conditionName": "Malaria",
            "icd10Code": "B54",
            "confidence": "medium",
            "supportingEvidence": ["fever", "endemic region"]
        }"#;
        let dx: DifferentialDiagnosis = serde_json::from_str(json).unwrap();
        assert_eq!(dx.condition_name, "Malaria");
        assert_eq!(dx.confidence, ConfidenceLevel::Medium);
        assert_eq!(dx.urgency, UrgencyLevel::Routine);
        assert!(dx.warning_flags.is_empty());
        assert!(!dx.is_unstructured());
    }

    #[test]
    fn test_protocol_parses_nested_escalation() {
        let json = r#"{
            "protocolName": "Uncomplicated malaria",
            "escalationCriteria": {
                "escalationCriteria": ["convulsions"],
                "escalationUrgency": "Emergency",
                "recommendedFacility": "District hospital"
            }
        }"#;
        let protocol: TreatmentProtocol = serde_json::from_str(json).unwrap();
        assert_eq!(
            protocol.escalation_criteria.escalation_urgency,
            UrgencyLevel::Emergency
        );
        assert_eq!(protocol.follow_up.follow_up_days, 0);
    }

    #[test]
    fn test_unstructured_records_carry_raw_text_and_flag() {
        let dx = DifferentialDiagnosis::unstructured("probably a rash");
        assert!(dx.is_unstructured());
        assert_eq!(dx.supporting_evidence, vec!["probably a rash".to_string()]);

        let protocol = TreatmentProtocol::unstructured("keep clean");
        assert!(protocol.is_unstructured());
        assert_eq!(protocol.steps[0].instruction, "keep clean");
    }
}
