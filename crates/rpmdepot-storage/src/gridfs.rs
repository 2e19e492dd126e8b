//! GridFS storage backend.
//!
//! The production backend: one `fs.files` collection describing each
//! artifact and an `fs.chunks` sibling holding the blob, addressed through
//! the MongoDB driver. Construction provisions the secondary indexes the
//! engine depends on; a provisioning failure is fatal to the instance.

use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::spec::BinarySubtype;
use bson::{doc, Binary, Bson, DateTime, Document};
use chrono::{DateTime as UtcDateTime, Utc};
use futures::TryStreamExt;
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, Database, IndexModel};

use rpmdepot_core::{content_type_for, FileDescriptor, FileStorageItem};

use crate::schema::{
    corrupt_filter, live_filter, marked_before_filter, prefix_filter, rpm_filter, ARCH_KEY,
    CHUNKS_COLLECTION, CHUNK_DATA_KEY, CHUNK_FILES_ID_KEY, CHUNK_N_KEY, CHUNK_SIZE_BYTES,
    FILENAME_KEY, FILES_COLLECTION, ID_KEY, MARKED_AS_DELETED_KEY, REPODATA_ARCH, REPO_KEY,
    UPLOAD_DATE_KEY,
};
use crate::traits::{FileStorage, StorageError, StorageResult};

/// GridFS-backed file storage.
#[derive(Clone)]
pub struct GridFsFileStorage {
    files: Collection<Document>,
    chunks: Collection<Document>,
}

impl GridFsFileStorage {
    /// Connect to `url` and open the storage collections of `database`.
    pub async fn connect(url: &str, database: &str) -> StorageResult<Self> {
        let client = Client::with_uri_str(url)
            .await
            .map_err(|e| StorageError::ConfigError(format!("invalid MongoDB URL: {}", e)))?;
        Self::new(client.database(database)).await
    }

    /// Open the storage collections and provision indexes. Constructing a
    /// second service against the same database is a no-op index-wise.
    pub async fn new(database: Database) -> StorageResult<Self> {
        let storage = GridFsFileStorage {
            files: database.collection(FILES_COLLECTION),
            chunks: database.collection(CHUNKS_COLLECTION),
        };
        storage.ensure_indexes().await?;
        Ok(storage)
    }

    /// Create the five domain indexes. The store treats creation of an
    /// already-present index as a no-op, which keeps this idempotent.
    async fn ensure_indexes(&self) -> StorageResult<()> {
        let models = vec![
            IndexModel::builder().keys(doc! { REPO_KEY: 1 }).build(),
            IndexModel::builder().keys(doc! { ARCH_KEY: 1 }).build(),
            IndexModel::builder()
                .keys(doc! { MARKED_AS_DELETED_KEY: 1 })
                .options(IndexOptions::builder().sparse(true).build())
                .build(),
            // Deliberately non-unique: duplicate filenames are a legitimate
            // transient state reconciled by the overwrite path.
            IndexModel::builder().keys(doc! { FILENAME_KEY: 1 }).build(),
            IndexModel::builder().keys(doc! { UPLOAD_DATE_KEY: 1 }).build(),
        ];
        self.files
            .create_indexes(models)
            .await
            .map_err(|e| StorageError::IndexProvisioning(e.to_string()))?;
        Ok(())
    }

    /// Names of all indexes on the files collection, `_id_` included.
    pub async fn index_names(&self) -> StorageResult<Vec<String>> {
        self.files
            .list_index_names()
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))
    }

    async fn collect_items(&self, filter: Document) -> StorageResult<Vec<FileStorageItem>> {
        let cursor = self
            .files
            .find(filter)
            .sort(doc! { FILENAME_KEY: 1 })
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;
        let documents: Vec<Document> = cursor
            .try_collect()
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;
        documents
            .into_iter()
            .map(|d| {
                bson::from_document(d).map_err(|e| StorageError::QueryFailed(e.to_string()))
            })
            .collect()
    }

    async fn ids_matching(&self, filter: Document) -> StorageResult<Vec<ObjectId>> {
        let cursor = self
            .files
            .find(filter)
            .projection(doc! { ID_KEY: 1 })
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;
        let documents: Vec<Document> = cursor
            .try_collect()
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;
        Ok(documents
            .iter()
            .filter_map(|d| d.get_object_id(ID_KEY).ok())
            .collect())
    }

    /// Remove records and their blobs. Chunks go first so an interrupted
    /// removal leaves a corrupt-looking record rather than orphan chunks
    /// plus a readable files entry.
    async fn remove_by_ids(&self, ids: &[ObjectId]) -> StorageResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        self.chunks
            .delete_many(doc! { CHUNK_FILES_ID_KEY: { "$in": ids.to_vec() } })
            .await
            .map_err(|e| StorageError::DeleteFailed(e.to_string()))?;
        let result = self
            .files
            .delete_many(doc! { ID_KEY: { "$in": ids.to_vec() } })
            .await
            .map_err(|e| StorageError::DeleteFailed(e.to_string()))?;
        Ok(result.deleted_count)
    }

    fn chunk_documents(id: ObjectId, data: &[u8]) -> Vec<Document> {
        data.chunks(CHUNK_SIZE_BYTES as usize)
            .enumerate()
            .map(|(n, chunk)| {
                doc! {
                    CHUNK_FILES_ID_KEY: id,
                    CHUNK_N_KEY: n as i32,
                    CHUNK_DATA_KEY: Binary {
                        subtype: BinarySubtype::Generic,
                        bytes: chunk.to_vec(),
                    },
                }
            })
            .collect()
    }
}

#[async_trait]
impl FileStorage for GridFsFileStorage {
    #[tracing::instrument(skip(self, data), fields(path = %descriptor.path(), size_bytes = data.len()))]
    async fn store(
        &self,
        data: Vec<u8>,
        descriptor: &FileDescriptor,
        overwrite_all: bool,
    ) -> StorageResult<FileStorageItem> {
        let path = descriptor.path();
        let id = ObjectId::new();
        let digest = format!("{:x}", md5::compute(&data));

        // Chunks first: the item only becomes visible once the files
        // document lands, so a failure here leaves no partial live item.
        let chunk_documents = Self::chunk_documents(id, &data);
        if !chunk_documents.is_empty() {
            self.chunks
                .insert_many(chunk_documents)
                .await
                .map_err(|e| StorageError::StoreFailed(e.to_string()))?;
        }

        let item = FileStorageItem::new(
            id,
            descriptor,
            data.len() as i64,
            CHUNK_SIZE_BYTES,
            content_type_for(descriptor.filename()),
            digest,
            DateTime::now(),
        );
        let document =
            bson::to_document(&item).map_err(|e| StorageError::StoreFailed(e.to_string()))?;
        if let Err(e) = self.files.insert_one(document).await {
            // The chunks were never visible; drop them again.
            let _ = self
                .chunks
                .delete_many(doc! { CHUNK_FILES_ID_KEY: id })
                .await;
            return Err(StorageError::StoreFailed(e.to_string()));
        }

        // The filename is non-unique at the blob layer, so enumeration of
        // pre-existing records is mandatory.
        let prior = self
            .ids_matching(doc! { FILENAME_KEY: path.as_str(), ID_KEY: { "$ne": id } })
            .await?;
        if overwrite_all {
            let removed = self.remove_by_ids(&prior).await?;
            tracing::info!(removed, "replaced prior records");
        } else if !prior.is_empty() {
            let mut filter = live_filter(&path);
            filter.insert(ID_KEY, doc! { "$ne": id });
            let result = self
                .files
                .update_many(
                    filter,
                    doc! { "$set": { MARKED_AS_DELETED_KEY: DateTime::now() } },
                )
                .await
                .map_err(|e| StorageError::StoreFailed(e.to_string()))?;
            tracing::info!(marked = result.modified_count, "marked prior records");
        }

        Ok(item)
    }

    #[tracing::instrument(skip(self), fields(path = %descriptor.path()))]
    async fn find_by_descriptor(
        &self,
        descriptor: &FileDescriptor,
    ) -> StorageResult<Option<FileStorageItem>> {
        let found = self
            .files
            .find_one(live_filter(&descriptor.path()))
            .sort(doc! { UPLOAD_DATE_KEY: -1 })
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;
        found
            .map(|d| bson::from_document(d).map_err(|e| StorageError::QueryFailed(e.to_string())))
            .transpose()
    }

    async fn find_by_id(&self, id: ObjectId) -> StorageResult<Option<FileStorageItem>> {
        let found = self
            .files
            .find_one(doc! { ID_KEY: id })
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;
        found
            .map(|d| bson::from_document(d).map_err(|e| StorageError::QueryFailed(e.to_string())))
            .transpose()
    }

    async fn find_by_prefix(&self, prefix: &str) -> StorageResult<Vec<FileStorageItem>> {
        self.collect_items(prefix_filter(prefix)).await
    }

    async fn get_all_rpms(&self, repo: &str) -> StorageResult<Vec<FileStorageItem>> {
        self.collect_items(rpm_filter(repo)).await
    }

    async fn read_content(&self, id: ObjectId) -> StorageResult<Vec<u8>> {
        let record = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| StorageError::NotFound(id.to_hex()))?;

        let cursor = self
            .chunks
            .find(doc! { CHUNK_FILES_ID_KEY: id })
            .sort(doc! { CHUNK_N_KEY: 1 })
            .await
            .map_err(|e| StorageError::ReadFailed(e.to_string()))?;
        let chunk_documents: Vec<Document> = cursor
            .try_collect()
            .await
            .map_err(|e| StorageError::ReadFailed(e.to_string()))?;

        let mut data = Vec::with_capacity(record.length as usize);
        for chunk in &chunk_documents {
            match chunk.get(CHUNK_DATA_KEY) {
                Some(Bson::Binary(binary)) => data.extend_from_slice(&binary.bytes),
                _ => {
                    return Err(StorageError::CorruptRecord {
                        id,
                        reason: "chunk without binary data".to_string(),
                    })
                }
            }
        }
        if data.len() as i64 != record.length {
            return Err(StorageError::CorruptRecord {
                id,
                reason: format!(
                    "blob length mismatch: expected {}, reassembled {}",
                    record.length,
                    data.len()
                ),
            });
        }
        Ok(data)
    }

    #[tracing::instrument(skip(self))]
    async fn mark_for_deletion_by_path(&self, path: &str) -> StorageResult<u64> {
        let result = self
            .files
            .update_many(
                live_filter(path),
                doc! { "$set": { MARKED_AS_DELETED_KEY: DateTime::now() } },
            )
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;
        tracing::debug!(marked = result.modified_count, "marked for deletion");
        Ok(result.modified_count)
    }

    #[tracing::instrument(skip(self))]
    async fn remove_files_marked_as_deleted_before(
        &self,
        cutoff: UtcDateTime<Utc>,
    ) -> StorageResult<u64> {
        let expired = self
            .ids_matching(marked_before_filter(DateTime::from_chrono(cutoff)))
            .await?;
        let removed = self.remove_by_ids(&expired).await?;
        tracing::info!(removed, "purged files marked as deleted");
        Ok(removed)
    }

    async fn get_corrupt_files(&self) -> StorageResult<Vec<FileStorageItem>> {
        // Sorting by filename is pointless when filename may be gone.
        let cursor = self
            .files
            .find(corrupt_filter())
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;
        let documents: Vec<Document> = cursor
            .try_collect()
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;
        documents
            .into_iter()
            .map(|d| {
                bson::from_document(d).map_err(|e| StorageError::QueryFailed(e.to_string()))
            })
            .collect()
    }

    #[tracing::instrument(skip(self))]
    async fn delete_corrupt_files(&self) -> StorageResult<u64> {
        let corrupt = self.ids_matching(corrupt_filter()).await?;
        let removed = self.remove_by_ids(&corrupt).await?;
        tracing::info!(removed, "deleted corrupt files");
        Ok(removed)
    }

    async fn list_packages(&self, repo: &str) -> StorageResult<Vec<(String, String)>> {
        let filter = doc! {
            REPO_KEY: repo,
            ARCH_KEY: { "$ne": REPODATA_ARCH },
            MARKED_AS_DELETED_KEY: { "$exists": false },
        };
        let items = self.collect_items(filter).await?;
        Ok(items
            .into_iter()
            .filter_map(|item| {
                let arch = item.arch()?.to_string();
                let path = item.filename.clone()?;
                Some((arch, path))
            })
            .collect())
    }

    #[tracing::instrument(skip(self), fields(from = %descriptor.path(), to_repo = target_repo))]
    async fn propagate(
        &self,
        descriptor: &FileDescriptor,
        target_repo: &str,
    ) -> StorageResult<FileStorageItem> {
        let source = self
            .find_by_descriptor(descriptor)
            .await?
            .ok_or_else(|| StorageError::NotFound(descriptor.path()))?;

        let target = descriptor.in_repo(target_repo);
        let target_path = target.path();

        // Make room: the displaced live item enters the deletion lifecycle.
        self.files
            .update_many(
                live_filter(&target_path),
                doc! { "$set": { MARKED_AS_DELETED_KEY: DateTime::now() } },
            )
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        self.files
            .update_one(
                doc! { ID_KEY: source.id },
                doc! { "$set": { FILENAME_KEY: target_path.as_str(), REPO_KEY: target.repo() } },
            )
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        self.find_by_id(source.id)
            .await?
            .ok_or_else(|| StorageError::NotFound(target_path))
    }
}
