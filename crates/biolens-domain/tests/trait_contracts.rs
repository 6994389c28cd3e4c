//! Trait contract tests for CaseRepository and MediaStore.
//!
//! Every conforming implementation must pass these; they run against both
//! the in-memory fakes and the filesystem stores.

use biolens_domain::fakes::{MemoryCaseRepository, MemoryMediaStore};
use biolens_domain::{
    AgeUnit, BiologicalSex, CaseId, CaseRepository, ContentDigest, ContextualInformation,
    DiagnosticCase, FacilityLevel, FsCaseRepository, FsMediaStore, GeographicRegion, MediaStore,
    Patient, StorageError,
};
use uuid::Uuid;

fn new_case(anonymized_id: &str) -> DiagnosticCase {
    let patient = Patient::new(anonymized_id, Some(4), AgeUnit::Years, BiologicalSex::Female);
    let context = ContextualInformation::new(
        GeographicRegion::new("Malawi", "Zomba"),
        FacilityLevel::BasicHealthPost,
    );
    DiagnosticCase::new(patient, Uuid::new_v4(), context)
}

// ===========================================================================
// CaseRepository contract
// ===========================================================================

async fn case_repository_contract(repo: &dyn CaseRepository) {
    assert!(repo.load(CaseId::new()).await.unwrap().is_none());

    let mut case = new_case("PAT-A");
    repo.save(&case).await.unwrap();
    assert_eq!(repo.load(case.id()).await.unwrap().unwrap(), case);

    case.start_diagnosis();
    repo.save(&case).await.unwrap();
    let loaded = repo.load(case.id()).await.unwrap().unwrap();
    assert_eq!(loaded.status(), case.status());

    let mut synced = new_case("PAT-B");
    synced.mark_synced();
    repo.save(&synced).await.unwrap();
    let unsynced = repo.list_unsynced().await.unwrap();
    assert_eq!(unsynced.len(), 1);
    assert_eq!(unsynced[0].id(), case.id());

    assert!(repo
        .load_patient_by_anonymized_id("PAT-A")
        .await
        .unwrap()
        .is_none());
    repo.save_patient(case.patient()).await.unwrap();
    let patient = repo
        .load_patient_by_anonymized_id("PAT-A")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&patient, case.patient());
}

#[tokio::test]
async fn memory_case_repository_satisfies_contract() {
    let repo = MemoryCaseRepository::new();
    case_repository_contract(&repo).await;
    assert_eq!(repo.save_count(), 3);
}

#[tokio::test]
async fn fs_case_repository_satisfies_contract() {
    let dir = tempfile::tempdir().unwrap();
    let repo = FsCaseRepository::new(dir.path()).unwrap();
    case_repository_contract(&repo).await;
}

#[tokio::test]
async fn fs_case_repository_persists_across_instances() {
    let dir = tempfile::tempdir().unwrap();
    let case = new_case("PAT-C");
    FsCaseRepository::new(dir.path())
        .unwrap()
        .save(&case)
        .await
        .unwrap();

    let reopened = FsCaseRepository::new(dir.path()).unwrap();
    assert_eq!(reopened.load(case.id()).await.unwrap().unwrap(), case);
}

// ===========================================================================
// MediaStore contract
// ===========================================================================

async fn media_store_contract(store: &dyn MediaStore) {
    let data = b"jpeg bytes";
    let digest = store.put(data).await.unwrap();
    assert_eq!(digest, ContentDigest::from_bytes(data));
    assert_eq!(store.get(&digest).await.unwrap(), data);
    assert!(store.contains(&digest).await.unwrap());

    let missing = ContentDigest::from_bytes(b"never stored");
    assert!(!store.contains(&missing).await.unwrap());
    let err = store.get(&missing).await.unwrap_err();
    assert!(matches!(err, StorageError::MediaNotFound { .. }));

    assert_eq!(store.put(data).await.unwrap(), digest);
}

#[tokio::test]
async fn memory_media_store_satisfies_contract() {
    media_store_contract(&MemoryMediaStore::new()).await;
}

#[tokio::test]
async fn fs_media_store_satisfies_contract() {
    let dir = tempfile::tempdir().unwrap();
    media_store_contract(&FsMediaStore::new(dir.path()).unwrap()).await;
}
