//! BioLens Domain: case records and persistence traits
//!
//! This crate holds the clinical record aggregate the diagnostic pipeline
//! operates on, and the persistence boundary it loads from and saves to.
//!
//! ## Key Components
//!
//! - `DiagnosticCase`: the case aggregate and its `CaseStatus` state machine
//! - `Patient`, `ContextualInformation`, `MedicalImage`, `AudioSymptomDescription`
//! - `DifferentialDiagnosis`, `TreatmentProtocol`: structured clinical output
//! - `CaseRepository`, `MediaStore`: async persistence traits, with in-memory
//!   fakes and filesystem-backed implementations

pub mod case;
pub mod clinical;
mod error;
pub mod fakes;
pub mod fs_store;
pub mod patient;
pub mod storage_traits;
pub mod values;

pub use case::{CaseEvent, CaseEventKind, CaseId, CaseStatus, DiagnosticCase, MAX_IMAGES_PER_CASE};
pub use clinical::{
    AgeUnit, BiologicalSex, ConfidenceLevel, DifferentialDiagnosis, EmergencyEscalation,
    FacilityLevel, FollowUpGuidance, ImageType, MedicationRecommendation, TreatmentProtocol,
    TreatmentStep, UrgencyLevel, UNSTRUCTURED_REVIEW_FLAG,
};
pub use error::{DomainError, DomainResult, StorageError, StorageResult};
pub use fs_store::{FsCaseRepository, FsMediaStore};
pub use patient::{Allergy, KnownCondition, Patient};
pub use storage_traits::{CaseRepository, ContentDigest, MediaStore};
pub use values::{
    AudioSymptomDescription, ContextualInformation, CulturalConsiderations, GeographicRegion,
    ImageMetadata, MedicalImage,
};
