//! In-memory storage backend.
//!
//! Implements the same observable semantics as the GridFS backend over a
//! process-local map of raw documents: path identity, overwrite, the
//! deletion lifecycle, corruption handling and the index registry. Used by
//! the test suites and by single-process deployments that do not need a
//! remote store.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{Bson, DateTime, Document};
use chrono::{DateTime as UtcDateTime, Utc};
use tokio::sync::RwLock;

use rpmdepot_core::{content_type_for, FileDescriptor, FileStorageItem};

use crate::schema::{
    doc_arch, doc_filename, doc_is_corrupt, doc_is_live_at, doc_marked_as_deleted, doc_repo,
    doc_upload_date, CHUNK_SIZE_BYTES, FILENAME_KEY, MARKED_AS_DELETED_FIELD, METADATA_KEY,
    REPODATA_ARCH, REPO_FIELD, RPM_SUFFIX,
};
use crate::traits::{FileStorage, StorageError, StorageResult};

/// Index created with every collection.
const ID_INDEX: &str = "_id_";

/// The five domain indexes the storage engine depends on, named the way
/// the store names single-field ascending indexes.
const DOMAIN_INDEXES: [&str; 5] = [
    "metadata.repo_1",
    "metadata.arch_1",
    "metadata.markedAsDeleted_1",
    "filename_1",
    "uploadDate_1",
];

struct Store {
    files: HashMap<ObjectId, Document>,
    chunks: HashMap<ObjectId, Vec<u8>>,
    indexes: BTreeSet<String>,
}

impl Default for Store {
    fn default() -> Self {
        Store {
            files: HashMap::new(),
            chunks: HashMap::new(),
            indexes: BTreeSet::from([ID_INDEX.to_string()]),
        }
    }
}

/// In-memory file storage. Cloning yields another service handle over the
/// same store, the way two service instances share one database.
#[derive(Clone)]
pub struct MemoryFileStorage {
    inner: Arc<RwLock<Store>>,
}

impl MemoryFileStorage {
    pub async fn new() -> Self {
        let storage = MemoryFileStorage {
            inner: Arc::new(RwLock::new(Store::default())),
        };
        storage.ensure_indexes().await;
        storage
    }

    /// Provision the domain indexes. Idempotent: creating an
    /// already-present index is a no-op.
    pub async fn ensure_indexes(&self) {
        let mut store = self.inner.write().await;
        for name in DOMAIN_INDEXES {
            store.indexes.insert(name.to_string());
        }
    }

    /// Names of all indexes on the files collection, `_id_` included.
    pub async fn index_names(&self) -> Vec<String> {
        let store = self.inner.read().await;
        store.indexes.iter().cloned().collect()
    }

    /// Apply an out-of-band mutation to a raw record, bypassing every
    /// invariant the service maintains. This is the only way a record
    /// becomes corrupt; tests use it to damage records the way a partial
    /// write or a misbehaving client would. Returns false when the id is
    /// unknown.
    pub async fn update_document<F>(&self, id: ObjectId, mutate: F) -> bool
    where
        F: FnOnce(&mut Document),
    {
        let mut store = self.inner.write().await;
        match store.files.get_mut(&id) {
            Some(document) => {
                mutate(document);
                true
            }
            None => false,
        }
    }

    fn item_from_document(document: &Document) -> StorageResult<FileStorageItem> {
        bson::from_document(document.clone()).map_err(|e| StorageError::QueryFailed(e.to_string()))
    }

    /// Conditional deletion mark: refuses records that are corrupt or
    /// already marked, preserving the first mark verbatim.
    fn mark_document(document: &mut Document, at: DateTime) -> bool {
        let Some(Bson::Document(metadata)) = document.get_mut(METADATA_KEY) else {
            return false;
        };
        if metadata.get(MARKED_AS_DELETED_FIELD).is_some() {
            return false;
        }
        metadata.insert(MARKED_AS_DELETED_FIELD, at);
        true
    }
}

#[async_trait]
impl FileStorage for MemoryFileStorage {
    async fn store(
        &self,
        data: Vec<u8>,
        descriptor: &FileDescriptor,
        overwrite_all: bool,
    ) -> StorageResult<FileStorageItem> {
        let path = descriptor.path();
        let id = ObjectId::new();
        let digest = format!("{:x}", md5::compute(&data));
        let size = data.len();

        let item = FileStorageItem::new(
            id,
            descriptor,
            size as i64,
            CHUNK_SIZE_BYTES,
            content_type_for(descriptor.filename()),
            digest,
            DateTime::now(),
        );
        let document =
            bson::to_document(&item).map_err(|e| StorageError::StoreFailed(e.to_string()))?;

        let mut store = self.inner.write().await;
        store.chunks.insert(id, data);
        store.files.insert(id, document);

        // The filename is non-unique; reconcile whatever accumulated there.
        let duplicates: Vec<ObjectId> = store
            .files
            .iter()
            .filter(|(other, d)| **other != id && doc_filename(d) == Some(path.as_str()))
            .map(|(other, _)| *other)
            .collect();

        if overwrite_all {
            for duplicate in &duplicates {
                store.files.remove(duplicate);
                store.chunks.remove(duplicate);
            }
        } else {
            let now = DateTime::now();
            for duplicate in &duplicates {
                if let Some(document) = store.files.get_mut(duplicate) {
                    Self::mark_document(document, now);
                }
            }
        }

        tracing::info!(
            path = %path,
            size_bytes = size,
            overwrite_all,
            duplicates = duplicates.len(),
            "stored file"
        );

        Ok(item)
    }

    async fn find_by_descriptor(
        &self,
        descriptor: &FileDescriptor,
    ) -> StorageResult<Option<FileStorageItem>> {
        let path = descriptor.path();
        let store = self.inner.read().await;
        store
            .files
            .iter()
            .filter(|(_, d)| doc_is_live_at(d, &path))
            .max_by_key(|(id, d)| (doc_upload_date(d), **id))
            .map(|(_, d)| Self::item_from_document(d))
            .transpose()
    }

    async fn find_by_id(&self, id: ObjectId) -> StorageResult<Option<FileStorageItem>> {
        let store = self.inner.read().await;
        store
            .files
            .get(&id)
            .map(Self::item_from_document)
            .transpose()
    }

    async fn find_by_prefix(&self, prefix: &str) -> StorageResult<Vec<FileStorageItem>> {
        let store = self.inner.read().await;
        let mut items = store
            .files
            .values()
            .filter(|d| {
                doc_filename(d).is_some_and(|f| f.starts_with(prefix)) && !doc_is_corrupt(d)
            })
            .map(Self::item_from_document)
            .collect::<StorageResult<Vec<_>>>()?;
        items.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(items)
    }

    async fn get_all_rpms(&self, repo: &str) -> StorageResult<Vec<FileStorageItem>> {
        let store = self.inner.read().await;
        let mut items = store
            .files
            .values()
            .filter(|d| {
                doc_repo(d) == Some(repo)
                    && doc_filename(d).is_some_and(|f| f.ends_with(RPM_SUFFIX))
            })
            .map(Self::item_from_document)
            .collect::<StorageResult<Vec<_>>>()?;
        items.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(items)
    }

    async fn read_content(&self, id: ObjectId) -> StorageResult<Vec<u8>> {
        let store = self.inner.read().await;
        if !store.files.contains_key(&id) {
            return Err(StorageError::NotFound(id.to_hex()));
        }
        store
            .chunks
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::CorruptRecord {
                id,
                reason: "blob chunks missing".to_string(),
            })
    }

    async fn mark_for_deletion_by_path(&self, path: &str) -> StorageResult<u64> {
        let now = DateTime::now();
        let mut store = self.inner.write().await;
        let candidates: Vec<ObjectId> = store
            .files
            .iter()
            .filter(|(_, d)| doc_filename(d) == Some(path))
            .map(|(id, _)| *id)
            .collect();

        let mut marked = 0;
        for id in candidates {
            if let Some(document) = store.files.get_mut(&id) {
                if Self::mark_document(document, now) {
                    marked += 1;
                }
            }
        }
        tracing::debug!(path = %path, marked, "marked for deletion");
        Ok(marked)
    }

    async fn remove_files_marked_as_deleted_before(
        &self,
        cutoff: UtcDateTime<Utc>,
    ) -> StorageResult<u64> {
        let cutoff = DateTime::from_chrono(cutoff);
        let mut store = self.inner.write().await;
        let expired: Vec<ObjectId> = store
            .files
            .iter()
            .filter(|(_, d)| doc_marked_as_deleted(d).is_some_and(|at| at < cutoff))
            .map(|(id, _)| *id)
            .collect();

        for id in &expired {
            store.files.remove(id);
            store.chunks.remove(id);
        }
        tracing::info!(removed = expired.len(), "purged files marked as deleted");
        Ok(expired.len() as u64)
    }

    async fn get_corrupt_files(&self) -> StorageResult<Vec<FileStorageItem>> {
        let store = self.inner.read().await;
        let mut items = store
            .files
            .values()
            .filter(|d| doc_is_corrupt(d))
            .map(Self::item_from_document)
            .collect::<StorageResult<Vec<_>>>()?;
        items.sort_by_key(|item| item.id);
        Ok(items)
    }

    async fn delete_corrupt_files(&self) -> StorageResult<u64> {
        let mut store = self.inner.write().await;
        let corrupt: Vec<ObjectId> = store
            .files
            .iter()
            .filter(|(_, d)| doc_is_corrupt(d))
            .map(|(id, _)| *id)
            .collect();

        for id in &corrupt {
            store.files.remove(id);
            store.chunks.remove(id);
        }
        tracing::info!(removed = corrupt.len(), "deleted corrupt files");
        Ok(corrupt.len() as u64)
    }

    async fn list_packages(&self, repo: &str) -> StorageResult<Vec<(String, String)>> {
        let store = self.inner.read().await;
        let mut packages: Vec<(String, String)> = store
            .files
            .values()
            .filter(|d| {
                doc_repo(d) == Some(repo)
                    && doc_arch(d).is_some_and(|arch| arch != REPODATA_ARCH)
                    && doc_filename(d)
                        .is_some_and(|path| doc_is_live_at(d, path))
            })
            .filter_map(|d| {
                let arch = doc_arch(d)?.to_string();
                let path = doc_filename(d)?.to_string();
                Some((arch, path))
            })
            .collect();
        packages.sort();
        Ok(packages)
    }

    async fn propagate(
        &self,
        descriptor: &FileDescriptor,
        target_repo: &str,
    ) -> StorageResult<FileStorageItem> {
        let source_path = descriptor.path();
        let target = descriptor.in_repo(target_repo);
        let target_path = target.path();

        let mut store = self.inner.write().await;
        let source_id = store
            .files
            .iter()
            .filter(|(_, d)| doc_is_live_at(d, &source_path))
            .max_by_key(|(id, d)| (doc_upload_date(d), **id))
            .map(|(id, _)| *id)
            .ok_or_else(|| StorageError::NotFound(source_path.clone()))?;

        // Make room: the displaced live item enters the deletion lifecycle.
        let now = DateTime::now();
        let displaced: Vec<ObjectId> = store
            .files
            .iter()
            .filter(|(id, d)| **id != source_id && doc_is_live_at(d, &target_path))
            .map(|(id, _)| *id)
            .collect();
        for id in displaced {
            if let Some(document) = store.files.get_mut(&id) {
                Self::mark_document(document, now);
            }
        }

        let document = store
            .files
            .get_mut(&source_id)
            .ok_or_else(|| StorageError::NotFound(source_path.clone()))?;
        document.insert(FILENAME_KEY, target_path.clone());
        if let Some(Bson::Document(metadata)) = document.get_mut(METADATA_KEY) {
            metadata.insert(REPO_FIELD, target.repo().to_string());
        }

        tracing::info!(from = %source_path, to = %target_path, "propagated package");
        Self::item_from_document(document)
    }
}
