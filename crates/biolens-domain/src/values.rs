//! Value objects attached to a diagnostic case: clinical context and
//! captured media.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clinical::{FacilityLevel, ImageType};
use crate::storage_traits::ContentDigest;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeographicRegion {
    pub country: String,
    pub region: String,
    pub district: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

impl GeographicRegion {
    pub fn new(country: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            country: country.into(),
            region: region.into(),
            district: None,
            latitude: 0.0,
            longitude: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CulturalConsiderations {
    pub primary_language: String,
    #[serde(default)]
    pub common_beliefs: Vec<String>,
    #[serde(default)]
    pub treatment_preferences: Vec<String>,
}

/// Where the case is being handled and what the clinician has to work with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextualInformation {
    pub region: GeographicRegion,
    /// Medications on hand. The treatment stage may only prescribe from this list.
    #[serde(default)]
    pub available_medications: Vec<String>,
    #[serde(default)]
    pub local_endemic_diseases: Vec<String>,
    pub facility_level: FacilityLevel,
    #[serde(default)]
    pub cultural_context: CulturalConsiderations,
}

impl ContextualInformation {
    pub fn new(region: GeographicRegion, facility_level: FacilityLevel) -> Self {
        Self {
            region,
            available_medications: Vec::new(),
            local_endemic_diseases: Vec::new(),
            facility_level,
            cultural_context: CulturalConsiderations::default(),
        }
    }

    pub fn with_medications<I, S>(mut self, medications: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.available_medications = medications.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_endemic_diseases<I, S>(mut self, diseases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.local_endemic_diseases = diseases.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.cultural_context.primary_language = language.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub file_size_bytes: u64,
    pub device_model: String,
}

/// A captured photo. The bytes live in a [`crate::MediaStore`]; the case
/// only keeps the content digest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicalImage {
    pub id: Uuid,
    pub content: ContentDigest,
    pub image_type: ImageType,
    pub metadata: ImageMetadata,
    pub captured_at: DateTime<Utc>,
}

impl MedicalImage {
    pub fn new(content: ContentDigest, image_type: ImageType, metadata: ImageMetadata) -> Self {
        Self {
            id: Uuid::new_v4(),
            content,
            image_type,
            metadata,
            captured_at: Utc::now(),
        }
    }
}

/// Spoken symptom description recorded by the health worker.
///
/// Either the recording, the transcript, or both may be present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioSymptomDescription {
    pub id: Uuid,
    pub content: Option<ContentDigest>,
    pub language_code: String,
    pub duration_seconds: u32,
    pub transcribed_text: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl AudioSymptomDescription {
    /// A transcript-only description with no stored recording.
    pub fn from_transcript(
        language_code: impl Into<String>,
        transcript: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: None,
            language_code: language_code.into(),
            duration_seconds: 0,
            transcribed_text: Some(transcript.into()),
            recorded_at: Utc::now(),
        }
    }

    pub fn with_recording(mut self, content: ContentDigest, duration_seconds: u32) -> Self {
        self.content = Some(content);
        self.duration_seconds = duration_seconds;
        self
    }
}
