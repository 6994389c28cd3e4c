//! Persistence collaborators consumed by the diagnostic pipeline.
//!
//! - `CaseRepository`: case and patient persistence (load / save)
//! - `MediaStore`: content-addressed storage for image and audio bytes
//!
//! Both traits are async and backend-agnostic. In-memory fakes live in
//! [`crate::fakes`], filesystem-backed stores in [`crate::fs_store`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::case::{CaseId, DiagnosticCase};
use crate::error::{StorageError, StorageResult};
use crate::patient::Patient;

/// Content digest (SHA-256 hex string).
///
/// The inner field is private so the string is always lowercase hex
/// produced by `from_bytes` or validated via `TryFrom<String>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Compute the SHA-256 digest of the given bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        use sha2::Digest;
        let mut hasher = Sha256::new();
        hasher.update(data);
        ContentDigest(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form (first 12 hex chars).
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl TryFrom<String> for ContentDigest {
    type Error = StorageError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        if s.len() != 64 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(StorageError::InvalidDigest { digest: s });
        }
        Ok(ContentDigest(s.to_ascii_lowercase()))
    }
}

impl From<ContentDigest> for String {
    fn from(d: ContentDigest) -> String {
        d.0
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Case and patient persistence.
///
/// The pipeline loads a case once before a run and saves it once after a
/// successful run; intermediate stage state is never persisted.
#[async_trait]
pub trait CaseRepository: Send + Sync {
    /// Load a case by id. `Ok(None)` when absent.
    async fn load(&self, case_id: CaseId) -> StorageResult<Option<DiagnosticCase>>;

    /// Insert or replace a case.
    async fn save(&self, case: &DiagnosticCase) -> StorageResult<()>;

    /// Cases not yet synced to the cloud.
    async fn list_unsynced(&self) -> StorageResult<Vec<DiagnosticCase>>;

    /// Find a patient by anonymised id. `Ok(None)` when absent.
    async fn load_patient_by_anonymized_id(&self, anonymized_id: &str)
        -> StorageResult<Option<Patient>>;

    /// Insert or replace a patient, keyed by anonymised id.
    async fn save_patient(&self, patient: &Patient) -> StorageResult<()>;
}

/// Content-addressed blob store for captured media.
///
/// Guarantees:
/// - `put(data)` always returns the SHA-256 digest of `data`.
/// - `get(digest)` returns the exact bytes previously stored.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn put(&self, data: &[u8]) -> StorageResult<ContentDigest>;

    /// Returns `StorageError::MediaNotFound` if absent.
    async fn get(&self, digest: &ContentDigest) -> StorageResult<Vec<u8>>;

    async fn contains(&self, digest: &ContentDigest) -> StorageResult<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_is_sha256_hex() {
        let d = ContentDigest::from_bytes(b"hello");
        assert_eq!(d.as_str().len(), 64);
        assert_eq!(d.short().len(), 12);
        assert_eq!(d, ContentDigest::from_bytes(b"hello"));
    }

    #[test]
    fn test_digest_try_from_validates() {
        assert!(ContentDigest::try_from("xyz".to_string()).is_err());
        let upper = ContentDigest::from_bytes(b"a").as_str().to_ascii_uppercase();
        let parsed = ContentDigest::try_from(upper).unwrap();
        assert_eq!(parsed, ContentDigest::from_bytes(b"a"));
    }

    #[test]
    fn test_digest_serde_rejects_garbage() {
        let bad: Result<ContentDigest, _> = serde_json::from_str("\"not-hex\"");
        assert!(bad.is_err());
    }
}
