//! Patient record referenced by diagnostic cases.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clinical::{AgeUnit, BiologicalSex};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnownCondition {
    pub condition_name: String,
    pub icd10_code: String,
    pub diagnosed_date: DateTime<Utc>,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allergy {
    pub allergen_name: String,
    pub severity: String,
    pub reaction: String,
}

/// A patient, identified externally only by an anonymised id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub anonymized_id: String,
    pub age: Option<u32>,
    pub age_unit: AgeUnit,
    pub sex: BiologicalSex,
    #[serde(default)]
    pub medical_history: Vec<KnownCondition>,
    #[serde(default)]
    pub known_allergies: Vec<Allergy>,
    pub created_at: DateTime<Utc>,
}

impl Patient {
    pub fn new(
        anonymized_id: impl Into<String>,
        age: Option<u32>,
        age_unit: AgeUnit,
        sex: BiologicalSex,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            anonymized_id: anonymized_id.into(),
            age,
            age_unit,
            sex,
            medical_history: Vec::new(),
            known_allergies: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn add_medical_condition(&mut self, condition: KnownCondition) {
        self.medical_history.push(condition);
    }

    pub fn add_allergy(&mut self, allergy: Allergy) {
        self.known_allergies.push(allergy);
    }

    /// "34 Years", or "unknown age" when no age was recorded.
    pub fn age_label(&self) -> String {
        match self.age {
            Some(age) => format!("{age} {}", self.age_unit),
            None => "unknown age".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_age_label() {
        let p = Patient::new("PAT-1", Some(34), AgeUnit::Years, BiologicalSex::Female);
        assert_eq!(p.age_label(), "34 Years");

        let p = Patient::new("PAT-2", None, AgeUnit::Months, BiologicalSex::Unknown);
        assert_eq!(p.age_label(), "unknown age");
    }

    #[test]
    fn test_history_and_allergies_append() {
        let mut p = Patient::new("PAT-3", Some(6), AgeUnit::Months, BiologicalSex::Male);
        p.add_allergy(Allergy {
            allergen_name: "Penicillin".to_string(),
            severity: "Severe".to_string(),
            reaction: "Anaphylaxis".to_string(),
        });
        assert_eq!(p.known_allergies.len(), 1);
        assert!(p.medical_history.is_empty());
    }
}
