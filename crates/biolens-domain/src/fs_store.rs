//! Filesystem-backed stores.
//!
//! Layout under the data root:
//!
//! ```text
//! <root>/cases/<case-id>.json
//! <root>/patients/<sha256(anonymized-id)>.json
//! <root>/media/objects/<first 2 hex chars>/<remaining hex chars>
//! ```
//!
//! Every write goes to a temp file in the target directory and is renamed
//! into place, so readers never observe a half-written record. Blocking
//! filesystem work runs on the tokio blocking pool.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::case::{CaseId, DiagnosticCase};
use crate::error::{StorageError, StorageResult};
use crate::patient::Patient;
use crate::storage_traits::{CaseRepository, ContentDigest, MediaStore};

fn write_atomic(path: &Path, data: &[u8]) -> StorageResult<()> {
    let dir = path.parent().ok_or_else(|| {
        StorageError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("path has no parent: {}", path.display()),
        ))
    })?;
    fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> StorageResult<Option<T>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StorageError::Io(e)),
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> StorageResult<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &bytes)
}

async fn blocking<T, F>(f: F) -> StorageResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> StorageResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StorageError::Task(e.to_string()))?
}

// ---------------------------------------------------------------------------
// FsCaseRepository
// ---------------------------------------------------------------------------

/// JSON-file case repository.
#[derive(Debug, Clone)]
pub struct FsCaseRepository {
    cases_dir: PathBuf,
    patients_dir: PathBuf,
}

impl FsCaseRepository {
    /// Open (and create if needed) a repository rooted at `root`.
    pub fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let cases_dir = root.as_ref().join("cases");
        let patients_dir = root.as_ref().join("patients");
        fs::create_dir_all(&cases_dir)?;
        fs::create_dir_all(&patients_dir)?;
        Ok(Self {
            cases_dir,
            patients_dir,
        })
    }

    fn case_path(&self, case_id: CaseId) -> PathBuf {
        self.cases_dir.join(format!("{case_id}.json"))
    }

    /// Anonymised ids are caller-supplied, so they are hashed rather than
    /// used as file names directly.
    fn patient_path(&self, anonymized_id: &str) -> PathBuf {
        let key = ContentDigest::from_bytes(anonymized_id.as_bytes());
        self.patients_dir.join(format!("{key}.json"))
    }
}

#[async_trait]
impl CaseRepository for FsCaseRepository {
    async fn load(&self, case_id: CaseId) -> StorageResult<Option<DiagnosticCase>> {
        let path = self.case_path(case_id);
        blocking(move || read_json(&path)).await
    }

    async fn save(&self, case: &DiagnosticCase) -> StorageResult<()> {
        let path = self.case_path(case.id());
        let case = case.clone();
        blocking(move || write_json(&path, &case)).await
    }

    async fn list_unsynced(&self) -> StorageResult<Vec<DiagnosticCase>> {
        let dir = self.cases_dir.clone();
        blocking(move || {
            let mut unsynced = Vec::new();
            for entry in fs::read_dir(&dir)? {
                let path = entry?.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                if let Some(case) = read_json::<DiagnosticCase>(&path)? {
                    if !case.is_synced_to_cloud() {
                        unsynced.push(case);
                    }
                }
            }
            unsynced.sort_by_key(|c| c.created_at());
            Ok(unsynced)
        })
        .await
    }

    async fn load_patient_by_anonymized_id(
        &self,
        anonymized_id: &str,
    ) -> StorageResult<Option<Patient>> {
        let path = self.patient_path(anonymized_id);
        blocking(move || read_json(&path)).await
    }

    async fn save_patient(&self, patient: &Patient) -> StorageResult<()> {
        let path = self.patient_path(&patient.anonymized_id);
        let patient = patient.clone();
        blocking(move || write_json(&path, &patient)).await
    }
}

// ---------------------------------------------------------------------------
// FsMediaStore
// ---------------------------------------------------------------------------

/// Filesystem-backed content-addressed media store with git-style 2-char
/// sharding.
#[derive(Debug, Clone)]
pub struct FsMediaStore {
    objects_dir: PathBuf,
}

impl FsMediaStore {
    /// Create a store rooted at `root`. Creates `root/media/objects/` if needed.
    pub fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let objects_dir = root.as_ref().join("media").join("objects");
        fs::create_dir_all(&objects_dir)?;
        Ok(Self { objects_dir })
    }

    fn blob_path(&self, digest: &ContentDigest) -> PathBuf {
        let hex = digest.as_str();
        self.objects_dir.join(&hex[..2]).join(&hex[2..])
    }
}

#[async_trait]
impl MediaStore for FsMediaStore {
    async fn put(&self, data: &[u8]) -> StorageResult<ContentDigest> {
        let digest = ContentDigest::from_bytes(data);
        let path = self.blob_path(&digest);
        let data = data.to_vec();
        blocking(move || {
            if !path.exists() {
                write_atomic(&path, &data)?;
            }
            Ok(())
        })
        .await?;
        Ok(digest)
    }

    async fn get(&self, digest: &ContentDigest) -> StorageResult<Vec<u8>> {
        let path = self.blob_path(digest);
        let missing = digest.as_str().to_string();
        blocking(move || {
            fs::read(&path).map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    StorageError::MediaNotFound { digest: missing }
                } else {
                    StorageError::Io(e)
                }
            })
        })
        .await
    }

    async fn contains(&self, digest: &ContentDigest) -> StorageResult<bool> {
        let path = self.blob_path(digest);
        blocking(move || Ok(path.exists())).await
    }
}
