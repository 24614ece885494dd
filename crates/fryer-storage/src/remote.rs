//! Remote bucket on S3 or an S3-compatible store
//!
//! Keys map to object paths inside the configured bucket. Signing,
//! retries and the wire protocol are handled by `object_store`.

use crate::backend::{Locality, StorageBackend};
use crate::config::RemoteSettings;
use crate::error::StorageError;
use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use std::fmt;
use std::sync::Arc;

/// Object store client scoped to one bucket
#[derive(Clone)]
pub struct S3Store {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl fmt::Debug for S3Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Store")
            .field("bucket", &self.bucket)
            .field("store", &self.store.to_string())
            .finish()
    }
}

impl S3Store {
    /// Create a client for the given settings
    ///
    /// A custom endpoint is addressed path-style, as S3-compatible
    /// stores expect.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the store rejects the settings.
    pub fn new(settings: RemoteSettings) -> Result<Self, StorageError> {
        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(&settings.bucket)
            .with_region(&settings.region)
            .with_access_key_id(&settings.access_key)
            .with_secret_access_key(&settings.secret_key);
        if let Some(endpoint) = &settings.endpoint {
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(endpoint.starts_with("http://"))
                .with_virtual_hosted_style_request(false);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::Config(format!("s3 store for '{}': {e}", settings.bucket)))?;
        Ok(Self::with_store(settings.bucket, Arc::new(store)))
    }

    /// Wrap an existing store
    #[must_use]
    pub fn with_store(bucket: impl Into<String>, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }

    /// Bucket objects are stored in
    #[inline]
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Object path addressing `key`
    ///
    /// # Errors
    ///
    /// Returns `InvalidKey` if the key has no path segments.
    pub fn object_path(key: &str) -> Result<Path, StorageError> {
        let parts: Vec<&str> = key.split('/').filter(|s| !s.is_empty()).collect();
        if parts.is_empty() {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(Path::from_iter(parts))
    }
}

#[async_trait::async_trait]
impl StorageBackend for S3Store {
    async fn download(&self, key: &str) -> Result<Bytes, StorageError> {
        let path = Self::object_path(key)?;
        tracing::debug!(bucket = %self.bucket, %path, "fetching remote object");

        let body = self
            .store
            .get(&path)
            .await
            .map_err(|e| StorageError::from_object_store(key, e))?
            .bytes()
            .await
            .map_err(|e| StorageError::from_object_store(key, e))?;

        tracing::debug!(key, bytes = body.len(), "fetched remote object");
        Ok(body)
    }

    async fn upload(&self, key: &str, body: Bytes) -> Result<(), StorageError> {
        let path = Self::object_path(key)?;
        let len = body.len();
        tracing::debug!(bucket = %self.bucket, %path, bytes = len, "storing remote object");

        self.store
            .put(&path, PutPayload::from(body))
            .await
            .map_err(|e| StorageError::from_object_store(key, e))?;

        tracing::debug!(key, bytes = len, "stored remote object");
        Ok(())
    }

    fn locality(&self) -> Locality {
        Locality::Remote
    }
}
