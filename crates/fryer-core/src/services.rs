//! Capabilities shared by the resources of one process

use crate::config::{FryerConfig, ResourceConfig};
use fryer_engine::{ImageEngine, TransformEngine};
use fryer_pipeline::PipelineOptions;
use fryer_storage::{router_from_config, LocalStorage, StorageRouter};
use std::sync::Arc;

/// Storage, engine and defaults handed to each `ImageResource`
#[derive(Debug, Clone)]
pub struct Services {
    /// Local/remote storage selection
    pub storage: StorageRouter,
    /// Transform engine
    pub engine: Arc<dyn TransformEngine>,
    /// Options for each resource's pipeline
    pub options: PipelineOptions,
    /// Initial resource configuration
    pub defaults: ResourceConfig,
}

impl Services {
    /// Create services from explicit capabilities
    #[must_use]
    pub fn new(storage: StorageRouter, engine: Arc<dyn TransformEngine>) -> Self {
        Self {
            storage,
            engine,
            options: PipelineOptions::default(),
            defaults: ResourceConfig::default(),
        }
    }

    /// With pipeline options
    #[inline]
    #[must_use]
    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    /// With initial resource configuration
    #[inline]
    #[must_use]
    pub fn with_defaults(mut self, defaults: ResourceConfig) -> Self {
        self.defaults = defaults;
        self
    }

    /// Production wiring: filesystem, optional HTTP object store, `image` engine
    #[must_use]
    pub fn from_config(config: &FryerConfig) -> Self {
        let mut local = LocalStorage::new();
        if let Some(root) = &config.storage.root {
            local = local.with_root(root);
        }

        let storage = router_from_config(local, &config.remote);
        Self::new(storage, Arc::new(ImageEngine::new()))
            .with_options(config.pipeline_options())
            .with_defaults(config.resource)
    }
}

impl Default for Services {
    fn default() -> Self {
        Self::new(StorageRouter::default(), Arc::new(ImageEngine::new()))
    }
}
