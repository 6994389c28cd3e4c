//! Case aggregate lifecycle: media bounds, diagnosis completion, and
//! status transitions.

use biolens_domain::{
    AgeUnit, AudioSymptomDescription, BiologicalSex, CaseStatus, ConfidenceLevel, ContentDigest,
    ContextualInformation, DiagnosticCase, DifferentialDiagnosis, DomainError, FacilityLevel,
    GeographicRegion, ImageMetadata, ImageType, MedicalImage, Patient, TreatmentProtocol,
    UrgencyLevel, MAX_IMAGES_PER_CASE,
};
use uuid::Uuid;

fn new_case() -> DiagnosticCase {
    let patient = Patient::new("PAT_TEST_001", Some(30), AgeUnit::Years, BiologicalSex::Male);
    let context = ContextualInformation::new(
        GeographicRegion::new("Uganda", "Gulu"),
        FacilityLevel::RuralClinic,
    )
    .with_medications(["Paracetamol", "Artemether-lumefantrine"])
    .with_endemic_diseases(["Malaria"]);
    DiagnosticCase::new(patient, Uuid::new_v4(), context)
}

fn image(n: u8) -> MedicalImage {
    MedicalImage::new(
        ContentDigest::from_bytes(&[n]),
        ImageType::Skin,
        ImageMetadata {
            width: 1920,
            height: 1080,
            file_size_bytes: 100_000,
            device_model: "test-phone".to_string(),
        },
    )
}

fn diagnosis(name: &str) -> DifferentialDiagnosis {
    DifferentialDiagnosis {
        condition_name: name.to_string(),
        icd10_code: "B54".to_string(),
        confidence: ConfidenceLevel::Medium,
        supporting_evidence: vec!["fever".to_string()],
        warning_flags: Vec::new(),
        urgency: UrgencyLevel::Urgent,
    }
}

fn protocol() -> TreatmentProtocol {
    serde_json::from_value(serde_json::json!({ "protocolName": "First-line" })).unwrap()
}

#[test]
fn eleventh_image_is_rejected_and_count_stays_at_ten() {
    let mut case = new_case();
    for n in 0..MAX_IMAGES_PER_CASE as u8 {
        case.add_medical_image(image(n)).unwrap();
    }
    assert_eq!(case.images().len(), 10);

    let before = case.clone();
    let err = case.add_medical_image(image(99)).unwrap_err();

    assert_eq!(err, DomainError::ImageCapacity { limit: 10 });
    assert_eq!(case.images().len(), 10);
    assert_eq!(case, before);
}

#[test]
fn images_and_audio_attach_in_any_status() {
    let mut case = new_case();
    case.complete_diagnosis(diagnosis("Malaria"), vec![], protocol())
        .unwrap();
    case.resolve().unwrap();

    case.add_medical_image(image(1)).unwrap();
    case.set_audio_description(AudioSymptomDescription::from_transcript(
        "en",
        "rash spreading",
    ));

    assert_eq!(case.images().len(), 1);
    assert!(case.audio_description().is_some());
    assert_eq!(case.status(), CaseStatus::Resolved);
}

#[test]
fn complete_diagnosis_sets_all_fields_together() {
    let mut case = new_case();
    assert!(case.start_diagnosis());

    case.complete_diagnosis(
        diagnosis("Malaria"),
        vec![diagnosis("Typhoid"), diagnosis("Dengue")],
        protocol(),
    )
    .unwrap();

    assert_eq!(case.status(), CaseStatus::DiagnosisCompleted);
    assert_eq!(case.primary_diagnosis().unwrap().condition_name, "Malaria");
    assert_eq!(case.alternative_diagnoses().len(), 2);
    assert_eq!(case.recommended_protocol().unwrap().protocol_name, "First-line");
    assert!(case.completed_at().is_some());
    assert_eq!(
        case.status_history(),
        vec![
            CaseStatus::Created,
            CaseStatus::InProgress,
            CaseStatus::DiagnosisCompleted
        ]
    );
}

#[test]
fn complete_diagnosis_is_allowed_directly_from_created() {
    let mut case = new_case();
    case.complete_diagnosis(diagnosis("Scabies"), vec![], protocol())
        .unwrap();
    assert_eq!(case.status(), CaseStatus::DiagnosisCompleted);
}

#[test]
fn complete_diagnosis_on_resolved_case_is_a_state_violation() {
    let mut case = new_case();
    case.complete_diagnosis(diagnosis("Malaria"), vec![], protocol())
        .unwrap();
    case.resolve().unwrap();
    let before = case.clone();

    let err = case
        .complete_diagnosis(diagnosis("Typhoid"), vec![diagnosis("Dengue")], protocol())
        .unwrap_err();

    assert_eq!(
        err,
        DomainError::StateViolation {
            operation: "complete diagnosis",
            status: CaseStatus::Resolved,
        }
    );
    assert_eq!(case.primary_diagnosis().unwrap().condition_name, "Malaria");
    assert!(case.alternative_diagnoses().is_empty());
    assert_eq!(case, before);
}

#[test]
fn start_diagnosis_from_terminal_state_is_a_no_op() {
    let mut case = new_case();
    case.escalate().unwrap();
    assert!(!case.start_diagnosis());
    assert_eq!(case.status(), CaseStatus::Escalated);
}

#[test]
fn post_diagnosis_transitions_are_guarded() {
    let mut case = new_case();
    assert!(case.assign_treatment().is_err());

    case.complete_diagnosis(diagnosis("Malaria"), vec![], protocol())
        .unwrap();
    case.assign_treatment().unwrap();
    case.require_follow_up().unwrap();
    case.resolve().unwrap();

    assert_eq!(case.status(), CaseStatus::Resolved);
    assert!(case.escalate().is_err());
}

#[test]
fn case_survives_json_roundtrip() {
    let mut case = new_case();
    case.add_medical_image(image(7)).unwrap();
    case.mark_synced();

    let json = serde_json::to_string(&case).unwrap();
    let back: DiagnosticCase = serde_json::from_str(&json).unwrap();

    assert_eq!(case, back);
    assert!(back.is_synced_to_cloud());
}
