//! Command layer behind the CLI: create a case, attach media, request a
//! diagnosis, read a case back.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};
use uuid::Uuid;

use biolens_domain::{
    AgeUnit, AudioSymptomDescription, BiologicalSex, CaseId, CaseRepository, ContentDigest,
    ContextualInformation, DiagnosticCase, DomainError, ImageMetadata, ImageType, MediaStore,
    MedicalImage, Patient, StorageError,
};

use crate::orchestrator::{DiagnosticOrchestrator, PipelineError, PipelineOutcome};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("case {case_id} not found")]
    CaseNotFound { case_id: CaseId },

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// Everything needed to open a case.
#[derive(Debug, Clone)]
pub struct NewCase {
    pub patient_anonymized_id: String,
    pub age: Option<u32>,
    pub age_unit: AgeUnit,
    pub sex: BiologicalSex,
    pub healthcare_worker_id: Uuid,
    pub context: ContextualInformation,
}

#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    pub image_type: ImageType,
    pub width: u32,
    pub height: u32,
    pub device_model: String,
}

/// A spoken description: a transcript, a recording, or both.
#[derive(Debug, Clone)]
pub struct AudioUpload {
    pub language_code: String,
    pub transcript: Option<String>,
    pub recording: Option<Vec<u8>>,
    pub duration_seconds: u32,
}

pub struct CaseService {
    cases: Arc<dyn CaseRepository>,
    media: Arc<dyn MediaStore>,
    orchestrator: DiagnosticOrchestrator,
}

impl CaseService {
    pub fn new(
        cases: Arc<dyn CaseRepository>,
        media: Arc<dyn MediaStore>,
        orchestrator: DiagnosticOrchestrator,
    ) -> Self {
        Self {
            cases,
            media,
            orchestrator,
        }
    }

    async fn load(&self, case_id: CaseId) -> ServiceResult<DiagnosticCase> {
        self.cases
            .load(case_id)
            .await?
            .ok_or(ServiceError::CaseNotFound { case_id })
    }

    /// Open a case, reusing the stored patient when the anonymised id is
    /// already known.
    #[instrument(skip_all, fields(patient = %new_case.patient_anonymized_id))]
    pub async fn create_case(&self, new_case: NewCase) -> ServiceResult<DiagnosticCase> {
        let patient = match self
            .cases
            .load_patient_by_anonymized_id(&new_case.patient_anonymized_id)
            .await?
        {
            Some(existing) => existing,
            None => {
                let patient = Patient::new(
                    new_case.patient_anonymized_id,
                    new_case.age,
                    new_case.age_unit,
                    new_case.sex,
                );
                self.cases.save_patient(&patient).await?;
                patient
            }
        };

        let case = DiagnosticCase::new(patient, new_case.healthcare_worker_id, new_case.context);
        self.cases.save(&case).await?;
        info!(case_id = %case.id(), "case created");
        Ok(case)
    }

    /// Add an image. At capacity the case is left unchanged and no bytes are
    /// stored.
    #[instrument(skip(self, upload), fields(bytes = upload.bytes.len()))]
    pub async fn attach_image(
        &self,
        case_id: CaseId,
        upload: ImageUpload,
    ) -> ServiceResult<MedicalImage> {
        let mut case = self.load(case_id).await?;
        let image = MedicalImage::new(
            ContentDigest::from_bytes(&upload.bytes),
            upload.image_type,
            ImageMetadata {
                width: upload.width,
                height: upload.height,
                file_size_bytes: upload.bytes.len() as u64,
                device_model: upload.device_model,
            },
        );
        case.add_medical_image(image.clone())?;

        self.media.put(&upload.bytes).await?;
        self.cases.save(&case).await?;
        info!(image_id = %image.id, images = case.images().len(), "image attached");
        Ok(image)
    }

    /// Set (or replace) the case's audio description.
    #[instrument(skip(self, upload), fields(language = %upload.language_code))]
    pub async fn attach_audio(
        &self,
        case_id: CaseId,
        upload: AudioUpload,
    ) -> ServiceResult<AudioSymptomDescription> {
        let mut case = self.load(case_id).await?;
        let content = match &upload.recording {
            Some(bytes) => Some(self.media.put(bytes).await?),
            None => None,
        };
        let description = AudioSymptomDescription {
            id: Uuid::new_v4(),
            content,
            language_code: upload.language_code,
            duration_seconds: upload.duration_seconds,
            transcribed_text: upload.transcript,
            recorded_at: Utc::now(),
        };
        case.set_audio_description(description.clone());
        self.cases.save(&case).await?;
        Ok(description)
    }

    pub async fn request_diagnosis(
        &self,
        case_id: CaseId,
        cancel: &CancellationToken,
    ) -> ServiceResult<PipelineOutcome> {
        Ok(self.orchestrator.run(case_id, cancel).await?)
    }

    pub async fn get_case(&self, case_id: CaseId) -> ServiceResult<DiagnosticCase> {
        self.load(case_id).await
    }

    /// Cases not yet pushed to the cloud, oldest first.
    pub async fn unsynced_cases(&self) -> ServiceResult<Vec<DiagnosticCase>> {
        Ok(self.cases.list_unsynced().await?)
    }
}
