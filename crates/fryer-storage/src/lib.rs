//! Fryer Storage - where image bytes come from and go to
//!
//! Provides:
//! - `StorageBackend`: async download/upload capability
//! - `LocalStorage`: filesystem backend with read/write streams
//! - `S3Store`: remote bucket on S3 or an S3-compatible store
//! - `StorageRouter`: per-call choice between the two, falling back to
//!   local when no remote is configured
//! - `RemoteConfig`: file/environment configuration for the remote store

#![warn(unreachable_pub)]

pub mod backend;
pub mod config;
pub mod error;
pub mod local;
pub mod remote;

// Re-exports for convenience
pub use backend::{Locality, StorageBackend, StorageRouter};
pub use config::{RemoteConfig, RemoteSettings, RemoteUnavailable};
pub use error::StorageError;
pub use local::{LocalSink, LocalStorage};
pub use remote::S3Store;

/// Build a router from remote configuration
///
/// An incomplete or invalid remote configuration is logged and leaves
/// the router local-only.
#[must_use]
pub fn router_from_config(local: LocalStorage, remote: &RemoteConfig) -> StorageRouter {
    let router = StorageRouter::new(std::sync::Arc::new(local));
    match remote.resolve() {
        Ok(settings) => match S3Store::new(settings) {
            Ok(store) => {
                tracing::info!(bucket = store.bucket(), "remote storage configured");
                router.with_remote(std::sync::Arc::new(store))
            }
            Err(e) => {
                tracing::warn!(error = %e, "remote storage disabled");
                router
            }
        },
        Err(reason) => {
            tracing::debug!(%reason, "remote storage not configured");
            router
        }
    }
}
