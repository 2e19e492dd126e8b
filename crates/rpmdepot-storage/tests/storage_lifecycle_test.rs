//! Lifecycle scenarios for the storage service: deletion marks, purging,
//! overwrite reconciliation and corrupt-record repair, exercised against
//! the in-memory backend.

use bson::{Bson, DateTime};
use chrono::{TimeZone, Utc};

use rpmdepot_core::FileDescriptor;
use rpmdepot_storage::schema::{MARKED_AS_DELETED_FIELD, METADATA_KEY};
use rpmdepot_storage::{FileStorage, MemoryFileStorage};

const TESTING_ARCH: &str = "noarch";

/// Store three packages and one metadata file, the smallest repository
/// shape the original service generates.
async fn prime_repository(storage: &MemoryFileStorage, repo: &str) {
    for name in ["alpha-1.0-1", "beta-2.3-1", "gamma-0.9-4"] {
        let descriptor =
            FileDescriptor::new(repo, TESTING_ARCH, format!("{}.{}.rpm", name, TESTING_ARCH));
        storage
            .store(name.as_bytes().to_vec(), &descriptor, false)
            .await
            .unwrap();
    }
    let repomd = FileDescriptor::new(repo, "repodata", "repomd.xml");
    storage
        .store(b"<repomd/>".to_vec(), &repomd, false)
        .await
        .unwrap();
}

/// Out-of-band equivalent of a past or future deletion mark.
async fn set_mark(storage: &MemoryFileStorage, id: bson::oid::ObjectId, at: chrono::DateTime<Utc>) {
    let updated = storage
        .update_document(id, |document| {
            document
                .get_document_mut(METADATA_KEY)
                .unwrap()
                .insert(MARKED_AS_DELETED_FIELD, DateTime::from_chrono(at));
        })
        .await;
    assert!(updated);
}

#[tokio::test]
async fn purge_honors_cutoff_and_leaves_other_repositories_alone() {
    let storage = MemoryFileStorage::new().await;
    let cutoff = Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap();

    prime_repository(&storage, "steady-repo").await;

    let past = Utc.with_ymd_and_hms(2026, 5, 31, 12, 0, 0).unwrap();
    let future = Utc.with_ymd_and_hms(2026, 6, 2, 12, 0, 0).unwrap();
    for (name, at) in [
        ("to-delete-past-1", past),
        ("to-delete-past-2", past),
        ("to-delete-future", future),
    ] {
        let descriptor = FileDescriptor::new("cleanup-repo", TESTING_ARCH, name);
        let stored = storage.store(vec![1], &descriptor, false).await.unwrap();
        set_mark(&storage, stored.id, at).await;
    }

    let removed = storage
        .remove_files_marked_as_deleted_before(cutoff)
        .await
        .unwrap();
    assert_eq!(removed, 2);

    let remaining = storage.find_by_prefix("cleanup-repo/").await.unwrap();
    let still_marked: Vec<_> = remaining
        .iter()
        .filter(|item| item.marked_as_deleted().is_some())
        .collect();
    assert_eq!(still_marked.len(), 1);
    assert_eq!(still_marked[0].marked_as_deleted(), Some(future));

    // The parallel repository was never touched.
    assert_eq!(storage.find_by_prefix("steady-repo/").await.unwrap().len(), 4);

    // Purging again with the same cutoff is a no-op.
    let removed = storage
        .remove_files_marked_as_deleted_before(cutoff)
        .await
        .unwrap();
    assert_eq!(removed, 0);
}

#[tokio::test]
async fn deletion_mark_is_set_only_once() {
    let storage = MemoryFileStorage::new().await;
    let descriptor = FileDescriptor::new("mark-repo", TESTING_ARCH, "a-file-to-be-deleted");
    let stored = storage.store(vec![1], &descriptor, false).await.unwrap();

    let yesterday = Utc.with_ymd_and_hms(2026, 8, 5, 0, 0, 0).unwrap();
    set_mark(&storage, stored.id, yesterday).await;

    let newly_marked = storage
        .mark_for_deletion_by_path(&descriptor.path())
        .await
        .unwrap();
    assert_eq!(newly_marked, 0);

    let item = storage.find_by_id(stored.id).await.unwrap().unwrap();
    assert_eq!(item.marked_as_deleted(), Some(yesterday));
}

#[tokio::test]
async fn marking_is_idempotent_under_retries() {
    let storage = MemoryFileStorage::new().await;
    let descriptor = FileDescriptor::new("mark-repo", TESTING_ARCH, "retried");
    let stored = storage.store(vec![1], &descriptor, false).await.unwrap();

    assert_eq!(
        storage.mark_for_deletion_by_path(&descriptor.path()).await.unwrap(),
        1
    );
    let first = storage
        .find_by_id(stored.id)
        .await
        .unwrap()
        .unwrap()
        .marked_as_deleted()
        .unwrap();

    assert_eq!(
        storage.mark_for_deletion_by_path(&descriptor.path()).await.unwrap(),
        0
    );
    let second = storage
        .find_by_id(stored.id)
        .await
        .unwrap()
        .unwrap()
        .marked_as_deleted()
        .unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn overwrite_collapses_accumulated_duplicates() {
    let storage = MemoryFileStorage::new().await;
    let descriptor = FileDescriptor::new("dup-repo", "repodata", "repomd.xml");

    for payload in [vec![1], vec![2], vec![3]] {
        storage.store(payload, &descriptor, false).await.unwrap();
    }
    let last = storage
        .store(b"latest".to_vec(), &descriptor, true)
        .await
        .unwrap();

    let remaining = storage.find_by_prefix(&descriptor.path()).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, last.id);
    assert_eq!(storage.read_content(last.id).await.unwrap(), b"latest");
}

#[tokio::test]
async fn stored_length_round_trips() {
    let storage = MemoryFileStorage::new().await;
    let descriptor = FileDescriptor::new("len-repo", TESTING_ARCH, "sized.rpm");
    let data = vec![7_u8; 300 * 1024];

    storage.store(data.clone(), &descriptor, true).await.unwrap();

    let found = storage.find_by_descriptor(&descriptor).await.unwrap().unwrap();
    assert_eq!(found.length, data.len() as i64);
}

#[tokio::test]
async fn corrupt_records_are_detected_and_repaired() {
    let storage = MemoryFileStorage::new().await;
    prime_repository(&storage, "corrupt-repo-a").await;
    prime_repository(&storage, "corrupt-repo-b").await;

    let victim_a = storage.get_all_rpms("corrupt-repo-a").await.unwrap()[0].clone();
    let victim_b = storage.get_all_rpms("corrupt-repo-b").await.unwrap()[0].clone();
    storage
        .update_document(victim_a.id, |document| {
            document.insert("filename", Bson::Null);
        })
        .await;
    storage
        .update_document(victim_b.id, |document| {
            document.insert(METADATA_KEY, Bson::Null);
        })
        .await;

    let corrupt = storage.get_corrupt_files().await.unwrap();
    assert_eq!(corrupt.len(), 2);
    assert!(corrupt.iter().all(|item| item.is_corrupt()));

    // Repair access works by id even for corrupt records.
    let by_id = storage.find_by_id(victim_b.id).await.unwrap().unwrap();
    assert_eq!(by_id.repo(), None);

    // Ordinary lookups never observe them.
    for item in storage.find_by_prefix("corrupt-repo-").await.unwrap() {
        assert!(!item.is_corrupt());
    }
    for item in storage.get_all_rpms("corrupt-repo-a").await.unwrap() {
        assert!(!item.is_corrupt());
    }

    let removed = storage.delete_corrupt_files().await.unwrap();
    assert_eq!(removed, 2);
    assert!(storage.get_corrupt_files().await.unwrap().is_empty());
}

#[tokio::test]
async fn index_provisioning_is_stable_across_constructions() {
    let storage = MemoryFileStorage::new().await;
    assert_eq!(storage.index_names().await.len(), 6);

    // A second service handle over the same store re-provisions; the
    // count must not change.
    let second = storage.clone();
    second.ensure_indexes().await;
    second.ensure_indexes().await;
    assert_eq!(second.index_names().await.len(), 6);
}
