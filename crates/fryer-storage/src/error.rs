//! Error types for storage backends

use std::path::PathBuf;

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// No object/file under the key
    #[error("not found: '{key}'")]
    NotFound {
        /// Requested key
        key: String,
    },

    /// Request to the object store failed
    #[error("transport error for '{key}': {source}")]
    Transport {
        /// Requested key
        key: String,
        /// Underlying store error
        #[source]
        source: object_store::Error,
    },

    /// Object store rejected the credentials
    #[error("authorization rejected for '{key}': {source}")]
    Auth {
        /// Requested key
        key: String,
        /// Underlying store error
        #[source]
        source: object_store::Error,
    },

    /// Local filesystem error
    #[error("io error on {path}: {source}")]
    Io {
        /// Resolved path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Key cannot address an object
    #[error("invalid key: {0:?}")]
    InvalidKey(String),

    /// Backend misconfigured
    #[error("storage configuration error: {0}")]
    Config(String),
}

impl StorageError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Check if the object simply does not exist
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if the failure happened on the wire
    #[inline]
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Map an object store error for `key`
    #[must_use]
    pub fn from_object_store(key: &str, source: object_store::Error) -> Self {
        let key = key.to_string();
        match source {
            object_store::Error::NotFound { .. } => Self::NotFound { key },
            object_store::Error::Unauthenticated { .. }
            | object_store::Error::PermissionDenied { .. } => Self::Auth { key, source },
            source => Self::Transport { key, source },
        }
    }
}
