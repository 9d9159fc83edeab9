//! Per-bucket object storage client
//! Uses Apache Arrow object_store crate

use bytes::Bytes;
use object_store::{ObjectStore, path::Path as StoragePath};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Cannot read source file {path}: {source}")]
    SourceUnreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Object store error: {0}")]
    ObjectStoreError(#[from] object_store::Error),
}

/// Storage result type
pub type Result<T> = std::result::Result<T, StorageError>;

/// Metadata returned after upload
#[derive(Debug, Clone)]
pub struct UploadMetadata {
    pub key: String,
    pub etag: Option<String>,
    pub size: usize,
}

/// Client for a single bucket
#[derive(Clone)]
pub struct BucketClient {
    store: Arc<dyn ObjectStore>,
    pub bucket: String,
}

impl BucketClient {
    /// Create new bucket client with any object_store backend
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }

    #[cfg(test)]
    pub fn in_memory(bucket: impl Into<String>) -> Self {
        Self::new(Arc::new(object_store::memory::InMemory::new()), bucket)
    }

    /// Upload a local file under `key`
    pub async fn upload_file(&self, source: &Path, key: &str) -> Result<UploadMetadata> {
        let data = tokio::fs::read(source)
            .await
            .map_err(|source_err| StorageError::SourceUnreadable {
                path: source.display().to_string(),
                source: source_err,
            })?;

        self.upload(key, Bytes::from(data)).await
    }

    /// Upload bytes to storage
    pub async fn upload(&self, key: &str, data: Bytes) -> Result<UploadMetadata> {
        let path = StoragePath::from(key);
        let size = data.len();

        let put_result = self.store.put(&path, data.into()).await?;

        tracing::info!(bucket = %self.bucket, key, size, "Uploaded to storage");

        Ok(UploadMetadata {
            key: key.to_string(),
            etag: put_result.e_tag,
            size,
        })
    }

    /// Read back the object stored under `key`
    pub async fn download(&self, key: &str) -> Result<Vec<u8>> {
        let body = self.store.get(&StoragePath::from(key)).await?.bytes().await?;
        tracing::debug!(bucket = %self.bucket, key, size = body.len(), "Fetched object");
        Ok(body.into())
    }

    /// `false` only when the store reports the key as absent
    pub async fn exists(&self, key: &str) -> Result<bool> {
        match self.store.head(&StoragePath::from(key)).await {
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            other => other.map(|_| true).map_err(StorageError::from),
        }
    }
}
