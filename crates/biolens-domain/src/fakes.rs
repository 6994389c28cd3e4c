//! In-memory fakes for the storage traits.
//!
//! `MemoryCaseRepository` and `MemoryMediaStore` satisfy the trait contracts
//! without touching disk, for tests here and in downstream crates.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::case::{CaseId, DiagnosticCase};
use crate::error::{StorageError, StorageResult};
use crate::patient::Patient;
use crate::storage_traits::{CaseRepository, ContentDigest, MediaStore};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// MemoryCaseRepository
// ---------------------------------------------------------------------------

/// In-memory case repository backed by `HashMap`s.
#[derive(Debug, Default)]
pub struct MemoryCaseRepository {
    cases: Mutex<HashMap<CaseId, DiagnosticCase>>,
    patients: Mutex<HashMap<String, Patient>>,
    saves: AtomicUsize,
}

impl MemoryCaseRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `save` calls so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl CaseRepository for MemoryCaseRepository {
    async fn load(&self, case_id: CaseId) -> StorageResult<Option<DiagnosticCase>> {
        Ok(lock(&self.cases).get(&case_id).cloned())
    }

    async fn save(&self, case: &DiagnosticCase) -> StorageResult<()> {
        lock(&self.cases).insert(case.id(), case.clone());
        self.saves.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn list_unsynced(&self) -> StorageResult<Vec<DiagnosticCase>> {
        let mut unsynced: Vec<DiagnosticCase> = lock(&self.cases)
            .values()
            .filter(|c| !c.is_synced_to_cloud())
            .cloned()
            .collect();
        unsynced.sort_by_key(|c| c.created_at());
        Ok(unsynced)
    }

    async fn load_patient_by_anonymized_id(
        &self,
        anonymized_id: &str,
    ) -> StorageResult<Option<Patient>> {
        Ok(lock(&self.patients).get(anonymized_id).cloned())
    }

    async fn save_patient(&self, patient: &Patient) -> StorageResult<()> {
        lock(&self.patients).insert(patient.anonymized_id.clone(), patient.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryMediaStore
// ---------------------------------------------------------------------------

/// In-memory content-addressed store backed by a `HashMap<digest, bytes>`.
#[derive(Debug, Default)]
pub struct MemoryMediaStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryMediaStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MediaStore for MemoryMediaStore {
    async fn put(&self, data: &[u8]) -> StorageResult<ContentDigest> {
        let digest = ContentDigest::from_bytes(data);
        lock(&self.blobs).insert(digest.as_str().to_string(), data.to_vec());
        Ok(digest)
    }

    async fn get(&self, digest: &ContentDigest) -> StorageResult<Vec<u8>> {
        lock(&self.blobs)
            .get(digest.as_str())
            .cloned()
            .ok_or_else(|| StorageError::MediaNotFound {
                digest: digest.as_str().to_string(),
            })
    }

    async fn contains(&self, digest: &ContentDigest) -> StorageResult<bool> {
        Ok(lock(&self.blobs).contains_key(digest.as_str()))
    }
}
