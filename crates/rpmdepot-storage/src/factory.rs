use std::sync::Arc;

#[cfg(feature = "storage-gridfs")]
use crate::GridFsFileStorage;
#[cfg(feature = "storage-memory")]
use crate::MemoryFileStorage;
use crate::{FileStorage, StorageBackend, StorageError, StorageResult};
use rpmdepot_core::Config;

/// Create a storage backend based on configuration
pub async fn create_storage(config: &Config) -> StorageResult<Arc<dyn FileStorage>> {
    let backend = config.storage_backend.unwrap_or(StorageBackend::GridFs);

    match backend {
        #[cfg(feature = "storage-gridfs")]
        StorageBackend::GridFs => {
            let url = config.mongodb_url.clone().ok_or_else(|| {
                StorageError::ConfigError("MONGODB_URL not configured".to_string())
            })?;

            let storage = GridFsFileStorage::connect(&url, &config.mongodb_database).await?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-gridfs"))]
        StorageBackend::GridFs => Err(StorageError::ConfigError(
            "GridFS storage backend not available (storage-gridfs feature not enabled)"
                .to_string(),
        )),

        #[cfg(feature = "storage-memory")]
        StorageBackend::Memory => Ok(Arc::new(MemoryFileStorage::new().await)),

        #[cfg(not(feature = "storage-memory"))]
        StorageBackend::Memory => Err(StorageError::ConfigError(
            "memory storage backend not available (storage-memory feature not enabled)"
                .to_string(),
        )),
    }
}

#[cfg(all(test, feature = "storage-memory"))]
mod tests {
    use super::*;

    fn memory_config() -> Config {
        Config {
            storage_backend: Some(StorageBackend::Memory),
            mongodb_url: None,
            mongodb_database: "rpmdepot".to_string(),
            whitelist_hosts: String::new(),
            whitelist_modification_enabled: false,
        }
    }

    #[tokio::test]
    async fn creates_memory_backend() {
        let storage = create_storage(&memory_config()).await.unwrap();
        let descriptor =
            rpmdepot_core::FileDescriptor::new("factory-repo", "noarch", "pkg.rpm");
        storage.store(vec![1, 2, 3], &descriptor, false).await.unwrap();
        assert!(storage.find_by_descriptor(&descriptor).await.unwrap().is_some());
    }

    #[cfg(feature = "storage-gridfs")]
    #[tokio::test]
    async fn gridfs_backend_requires_url() {
        let config = Config {
            storage_backend: Some(StorageBackend::GridFs),
            ..memory_config()
        };
        let result = create_storage(&config).await;
        assert!(matches!(result, Err(StorageError::ConfigError(_))));
    }
}
