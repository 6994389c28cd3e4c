//! The diagnostic case aggregate and its lifecycle state machine.
//!
//! All mutation goes through methods on [`DiagnosticCase`]. Failing
//! operations return a [`DomainError`] and leave the aggregate untouched;
//! in particular the diagnosis fields are only ever written together by
//! [`DiagnosticCase::complete_diagnosis`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::clinical::{DifferentialDiagnosis, TreatmentProtocol};
use crate::error::{DomainError, DomainResult};
use crate::patient::Patient;
use crate::values::{AudioSymptomDescription, ContextualInformation, MedicalImage};

/// Maximum number of images attached to one case.
pub const MAX_IMAGES_PER_CASE: usize = 10;

/// Unique identifier of a diagnostic case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CaseId(pub Uuid);

impl CaseId {
    pub fn new() -> Self {
        CaseId(Uuid::new_v4())
    }
}

impl Default for CaseId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CaseId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(CaseId)
            .map_err(|_| DomainError::InvalidValue {
                field: "case_id",
                value: s.to_string(),
            })
    }
}

/// Lifecycle status of a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaseStatus {
    Created,
    InProgress,
    DiagnosisCompleted,
    TreatmentAssigned,
    FollowUpRequired,
    Resolved,
    Escalated,
}

impl CaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::Created => "CREATED",
            CaseStatus::InProgress => "IN_PROGRESS",
            CaseStatus::DiagnosisCompleted => "DIAGNOSIS_COMPLETED",
            CaseStatus::TreatmentAssigned => "TREATMENT_ASSIGNED",
            CaseStatus::FollowUpRequired => "FOLLOW_UP_REQUIRED",
            CaseStatus::Resolved => "RESOLVED",
            CaseStatus::Escalated => "ESCALATED",
        }
    }

    /// Whether a diagnosis may be recorded from this status.
    pub fn accepts_diagnosis(&self) -> bool {
        matches!(self, CaseStatus::Created | CaseStatus::InProgress)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CaseStatus::Resolved | CaseStatus::Escalated)
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of something that happened to a case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CaseEventKind {
    Created { patient_id: Uuid },
    ImageAdded { image_id: Uuid },
    AudioDescriptionAdded,
    StatusChanged { from: CaseStatus, to: CaseStatus },
    DiagnosisCompleted { primary_condition: String },
    Synced,
}

/// A single entry in the case's event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseEvent {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub kind: CaseEventKind,
}

impl CaseEvent {
    fn new(kind: CaseEventKind) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            kind,
        }
    }
}

/// The clinical record the pipeline operates on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticCase {
    id: CaseId,
    patient: Patient,
    healthcare_worker_id: Uuid,
    context: ContextualInformation,
    images: Vec<MedicalImage>,
    audio_description: Option<AudioSymptomDescription>,
    primary_diagnosis: Option<DifferentialDiagnosis>,
    alternative_diagnoses: Vec<DifferentialDiagnosis>,
    recommended_protocol: Option<TreatmentProtocol>,
    status: CaseStatus,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    synced_to_cloud: bool,
    events: Vec<CaseEvent>,
}

impl DiagnosticCase {
    /// Open a new case in `Created` status.
    pub fn new(
        patient: Patient,
        healthcare_worker_id: Uuid,
        context: ContextualInformation,
    ) -> Self {
        let created = CaseEvent::new(CaseEventKind::Created {
            patient_id: patient.id,
        });
        Self {
            id: CaseId::new(),
            patient,
            healthcare_worker_id,
            context,
            images: Vec::new(),
            audio_description: None,
            primary_diagnosis: None,
            alternative_diagnoses: Vec::new(),
            recommended_protocol: None,
            status: CaseStatus::Created,
            created_at: Utc::now(),
            completed_at: None,
            synced_to_cloud: false,
            events: vec![created],
        }
    }

    pub fn id(&self) -> CaseId {
        self.id
    }

    pub fn patient(&self) -> &Patient {
        &self.patient
    }

    pub fn healthcare_worker_id(&self) -> Uuid {
        self.healthcare_worker_id
    }

    pub fn context(&self) -> &ContextualInformation {
        &self.context
    }

    pub fn images(&self) -> &[MedicalImage] {
        &self.images
    }

    pub fn audio_description(&self) -> Option<&AudioSymptomDescription> {
        self.audio_description.as_ref()
    }

    pub fn primary_diagnosis(&self) -> Option<&DifferentialDiagnosis> {
        self.primary_diagnosis.as_ref()
    }

    pub fn alternative_diagnoses(&self) -> &[DifferentialDiagnosis] {
        &self.alternative_diagnoses
    }

    pub fn recommended_protocol(&self) -> Option<&TreatmentProtocol> {
        self.recommended_protocol.as_ref()
    }

    pub fn status(&self) -> CaseStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn is_synced_to_cloud(&self) -> bool {
        self.synced_to_cloud
    }

    pub fn events(&self) -> &[CaseEvent] {
        &self.events
    }

    /// Every status the case has been in, oldest first.
    pub fn status_history(&self) -> Vec<CaseStatus> {
        let mut history = vec![CaseStatus::Created];
        history.extend(self.events.iter().filter_map(|e| match e.kind {
            CaseEventKind::StatusChanged { to, .. } => Some(to),
            _ => None,
        }));
        history
    }

    /// Attach an image. Allowed in any status; fails once the case holds
    /// [`MAX_IMAGES_PER_CASE`] images.
    pub fn add_medical_image(&mut self, image: MedicalImage) -> DomainResult<()> {
        if self.images.len() >= MAX_IMAGES_PER_CASE {
            return Err(DomainError::ImageCapacity {
                limit: MAX_IMAGES_PER_CASE,
            });
        }
        let image_id = image.id;
        self.images.push(image);
        self.record(CaseEventKind::ImageAdded { image_id });
        Ok(())
    }

    /// Attach or replace the audio symptom description. Allowed in any status.
    pub fn set_audio_description(&mut self, audio: AudioSymptomDescription) {
        self.audio_description = Some(audio);
        self.record(CaseEventKind::AudioDescriptionAdded);
    }

    /// Move `Created -> InProgress`.
    ///
    /// From any other status this is a no-op; the return value tells the
    /// caller whether a transition happened.
    pub fn start_diagnosis(&mut self) -> bool {
        if self.status != CaseStatus::Created {
            warn!(
                case_id = %self.id,
                status = %self.status,
                "start_diagnosis ignored: case is not in CREATED status"
            );
            return false;
        }
        self.transition(CaseStatus::InProgress);
        true
    }

    /// Record the diagnosis and treatment protocol in one step and move to
    /// `DiagnosisCompleted`.
    ///
    /// Allowed only from `Created` or `InProgress`.
    pub fn complete_diagnosis(
        &mut self,
        primary: DifferentialDiagnosis,
        alternatives: Vec<DifferentialDiagnosis>,
        protocol: TreatmentProtocol,
    ) -> DomainResult<()> {
        if !self.status.accepts_diagnosis() {
            return Err(DomainError::StateViolation {
                operation: "complete diagnosis",
                status: self.status,
            });
        }
        let primary_condition = primary.condition_name.clone();
        self.primary_diagnosis = Some(primary);
        self.alternative_diagnoses = alternatives;
        self.recommended_protocol = Some(protocol);
        self.completed_at = Some(Utc::now());
        self.transition(CaseStatus::DiagnosisCompleted);
        self.record(CaseEventKind::DiagnosisCompleted { primary_condition });
        Ok(())
    }

    /// `DiagnosisCompleted -> TreatmentAssigned`.
    pub fn assign_treatment(&mut self) -> DomainResult<()> {
        self.guarded_transition(
            "assign treatment",
            &[CaseStatus::DiagnosisCompleted],
            CaseStatus::TreatmentAssigned,
        )
    }

    /// `TreatmentAssigned -> FollowUpRequired`.
    pub fn require_follow_up(&mut self) -> DomainResult<()> {
        self.guarded_transition(
            "require follow-up",
            &[CaseStatus::TreatmentAssigned],
            CaseStatus::FollowUpRequired,
        )
    }

    /// Close the case once a diagnosis exists.
    pub fn resolve(&mut self) -> DomainResult<()> {
        self.guarded_transition(
            "resolve",
            &[
                CaseStatus::DiagnosisCompleted,
                CaseStatus::TreatmentAssigned,
                CaseStatus::FollowUpRequired,
            ],
            CaseStatus::Resolved,
        )
    }

    /// Refer the case to a higher-level facility. Allowed from any
    /// non-terminal status.
    pub fn escalate(&mut self) -> DomainResult<()> {
        if self.status.is_terminal() {
            return Err(DomainError::StateViolation {
                operation: "escalate",
                status: self.status,
            });
        }
        self.transition(CaseStatus::Escalated);
        Ok(())
    }

    pub fn mark_synced(&mut self) {
        self.synced_to_cloud = true;
        self.record(CaseEventKind::Synced);
    }

    fn guarded_transition(
        &mut self,
        operation: &'static str,
        allowed_from: &[CaseStatus],
        to: CaseStatus,
    ) -> DomainResult<()> {
        if !allowed_from.contains(&self.status) {
            return Err(DomainError::StateViolation {
                operation,
                status: self.status,
            });
        }
        self.transition(to);
        Ok(())
    }

    fn transition(&mut self, to: CaseStatus) {
        let from = self.status;
        self.status = to;
        self.record(CaseEventKind::StatusChanged { from, to });
    }

    fn record(&mut self, kind: CaseEventKind) {
        self.events.push(CaseEvent::new(kind));
    }
}
