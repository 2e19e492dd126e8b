//! Storage abstraction trait
//!
//! This module defines the `FileStorage` trait that all storage backends
//! must implement, together with the storage error surface.

use std::pin::Pin;

use async_trait::async_trait;
use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

use rpmdepot_core::{FileDescriptor, FileStorageItem};

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("store failed: {0}")]
    StoreFailed(String),

    #[error("read failed: {0}")]
    ReadFailed(String),

    #[error("delete failed: {0}")]
    DeleteFailed(String),

    #[error("query failed: {0}")]
    QueryFailed(String),

    #[error("file not found: {0}")]
    NotFound(String),

    #[error("corrupt record {id}: {reason}")]
    CorruptRecord { id: ObjectId, reason: String },

    #[error("index provisioning failed: {0}")]
    IndexProvisioning(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// File storage abstraction over a GridFS-style document store.
///
/// The service is a long-lived shared instance invoked concurrently from
/// many request-handler threads; all shared state lives in the backing
/// store. Single-document writes are atomic. The multi-document overwrite
/// path (write new, then drop duplicates) is deliberately not: a crash in
/// between leaves duplicates behind, which the next overwriting store
/// reconciles. Readers always observe at least one live copy.
///
/// Lookups that find nothing return `Ok(None)` / an empty `Vec`, never an
/// error. Mark and remove operations are idempotent and safe to retry.
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Install `data` under the descriptor's canonical path.
    ///
    /// With `overwrite_all`, every pre-existing record with the same
    /// filename (live or stale) is removed once the new record is written,
    /// leaving exactly one. Otherwise prior records are marked for deletion
    /// with the current time, first mark winning.
    async fn store(
        &self,
        data: Vec<u8>,
        descriptor: &FileDescriptor,
        overwrite_all: bool,
    ) -> StorageResult<FileStorageItem>;

    /// Streaming variant of [`store`](FileStorage::store); same semantics.
    async fn store_stream(
        &self,
        mut reader: Pin<Box<dyn AsyncRead + Send + Unpin>>,
        descriptor: &FileDescriptor,
        overwrite_all: bool,
    ) -> StorageResult<FileStorageItem> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data).await?;
        self.store(data, descriptor, overwrite_all).await
    }

    /// The single live item at the descriptor's path. When duplicates
    /// exist, the most recent upload wins; corrupt records never surface.
    async fn find_by_descriptor(
        &self,
        descriptor: &FileDescriptor,
    ) -> StorageResult<Option<FileStorageItem>>;

    /// Lookup by id, regardless of lifecycle or corruption state.
    async fn find_by_id(&self, id: ObjectId) -> StorageResult<Option<FileStorageItem>>;

    /// All non-corrupt items whose filename starts with `prefix`.
    async fn find_by_prefix(&self, prefix: &str) -> StorageResult<Vec<FileStorageItem>>;

    /// Items of `repo` whose filename ends with `.rpm` (case-sensitive).
    async fn get_all_rpms(&self, repo: &str) -> StorageResult<Vec<FileStorageItem>>;

    /// Reassemble the blob for `id` from the chunk sub-collection.
    async fn read_content(&self, id: ObjectId) -> StorageResult<Vec<u8>>;

    /// Set the deletion mark on every record at `path` that has none yet.
    /// Existing marks are preserved verbatim. Returns the number of records
    /// newly marked; zero when nothing matched or all were marked already.
    async fn mark_for_deletion_by_path(&self, path: &str) -> StorageResult<u64>;

    /// Permanently remove every record whose deletion mark is strictly
    /// older than `cutoff`. Records marked at or after `cutoff`, and
    /// unmarked records, are untouched.
    async fn remove_files_marked_as_deleted_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> StorageResult<u64>;

    /// Records whose structural invariants were violated out-of-band:
    /// filename or metadata lost.
    async fn get_corrupt_files(&self) -> StorageResult<Vec<FileStorageItem>>;

    /// Permanently remove every corrupt record. Afterwards
    /// [`get_corrupt_files`](FileStorage::get_corrupt_files) is empty.
    async fn delete_corrupt_files(&self) -> StorageResult<u64>;

    /// Live packages of `repo` as `(architecture, path)` pairs, skipping
    /// the `repodata` pseudo-architecture.
    async fn list_packages(&self, repo: &str) -> StorageResult<Vec<(String, String)>>;

    /// Move the package to `target_repo`, keeping architecture and
    /// filename. A live item already at the target path is marked for
    /// deletion first. Fails with `NotFound` when the source is absent.
    async fn propagate(
        &self,
        descriptor: &FileDescriptor,
        target_repo: &str,
    ) -> StorageResult<FileStorageItem>;
}
