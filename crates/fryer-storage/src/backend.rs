//! Storage capability and per-call backend selection

use crate::error::StorageError;
use crate::local::LocalStorage;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Where a resource's bytes live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locality {
    /// Local filesystem
    #[default]
    Local,
    /// Remote object store
    Remote,
}

impl fmt::Display for Locality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Remote => f.write_str("remote"),
        }
    }
}

impl FromStr for Locality {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "remote" => Ok(Self::Remote),
            other => Err(StorageError::Config(format!("unknown locality '{other}'"))),
        }
    }
}

/// Blob storage capability
///
/// Implementations must be usable from any task; every call is
/// independent and opens/closes its own handles.
#[async_trait::async_trait]
pub trait StorageBackend: Send + Sync + fmt::Debug {
    /// Read the whole object stored under `key`
    async fn download(&self, key: &str) -> Result<Bytes, StorageError>;

    /// Store `body` under `key`, returning once the write is durable
    async fn upload(&self, key: &str, body: Bytes) -> Result<(), StorageError>;

    /// Which kind of store this is
    fn locality(&self) -> Locality;
}

/// Local backend plus an optional remote one, chosen per call
#[derive(Debug, Clone)]
pub struct StorageRouter {
    local: Arc<dyn StorageBackend>,
    remote: Option<Arc<dyn StorageBackend>>,
}

impl StorageRouter {
    /// Create router with only a local backend
    #[inline]
    #[must_use]
    pub fn new(local: Arc<dyn StorageBackend>) -> Self {
        Self {
            local,
            remote: None,
        }
    }

    /// With a remote backend
    #[inline]
    #[must_use]
    pub fn with_remote(mut self, remote: Arc<dyn StorageBackend>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Check if a remote backend is configured
    #[inline]
    #[must_use]
    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Pick the backend for `requested`
    ///
    /// Falls back to local when remote is requested but not configured.
    /// Returns the backend together with the locality actually used.
    #[must_use]
    pub fn select(&self, requested: Locality) -> (Arc<dyn StorageBackend>, Locality) {
        match (requested, &self.remote) {
            (Locality::Remote, Some(remote)) => (Arc::clone(remote), Locality::Remote),
            (Locality::Remote, None) => {
                tracing::warn!("remote storage requested but not configured; using local storage");
                (Arc::clone(&self.local), Locality::Local)
            }
            (Locality::Local, _) => (Arc::clone(&self.local), Locality::Local),
        }
    }
}

impl Default for StorageRouter {
    fn default() -> Self {
        Self::new(Arc::new(LocalStorage::new()))
    }
}
