//! The image resource: one buffer, one pipeline
//!
//! Builder calls validate their arguments, enqueue steps and return
//! immediately. Steps run later, strictly in call order, each taking
//! the buffer by value and handing back the next one.
//!
//! ```text
//! load ──► crust[0] ──► crust[1] ──► fry[0] ──► save
//!  │                                             │
//!  └─ storage.download(identity)    storage.upload(target) ─┘
//! ```

use crate::config::{ConfigPatch, ResourceConfig};
use crate::error::{ResourceError, StepError};
use crate::schedule::degrade_schedule;
use crate::services::Services;
use bytes::Bytes;
use fryer_engine::{TransformEngine, TransformError, TransformOp};
use fryer_pipeline::{
    DrainReport, Pipeline, PipelineError, PipelineEvent, PipelineId, PipelineStatus, Step,
};
use fryer_storage::StorageRouter;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{broadcast, oneshot};

/// Step context: the encoded image, absent until a load completes
pub type Buffer = Option<Bytes>;

/// A single mutable image moving through an ordered pipeline
pub struct ImageResource {
    identity: Arc<str>,
    config: Arc<RwLock<ResourceConfig>>,
    storage: StorageRouter,
    engine: Arc<dyn TransformEngine>,
    pipeline: Pipeline<Buffer, StepError>,
}

impl ImageResource {
    /// Create a resource and start its pipeline
    ///
    /// # Errors
    ///
    /// Returns `MissingIdentity` for an empty or blank identity.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn new(identity: impl Into<String>, services: Services) -> Result<Self, ResourceError> {
        let identity = identity.into();
        if identity.trim().is_empty() {
            return Err(ResourceError::MissingIdentity);
        }

        let options = match services.options.label {
            Some(_) => services.options,
            None => services.options.with_label(identity.clone()),
        };
        let pipeline = Pipeline::spawn(None, options);
        tracing::debug!(%identity, pipeline = %pipeline.id(), "image resource created");

        Ok(Self {
            identity: Arc::from(identity),
            config: Arc::new(RwLock::new(services.defaults)),
            storage: services.storage,
            engine: services.engine,
            pipeline,
        })
    }

    /// Key the resource loads from
    #[inline]
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Pipeline driving this resource
    #[inline]
    #[must_use]
    pub fn pipeline_id(&self) -> PipelineId {
        self.pipeline.id()
    }

    /// Current configuration
    #[must_use]
    pub fn settings(&self) -> ResourceConfig {
        *self.config.read()
    }

    /// Merge recognized keys into the configuration, effective immediately
    ///
    /// Steps already queued see the change if they have not started yet.
    ///
    /// # Errors
    ///
    /// Returns `InvalidQuality` if the patch carries a quality outside 1..=100.
    pub fn config(&self, patch: ConfigPatch) -> Result<&Self, ResourceError> {
        self.config.write().apply(&patch)?;
        Ok(self)
    }

    /// `config` from a loose JSON object; unknown keys are ignored
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` or `InvalidQuality` for unusable values.
    pub fn config_json(&self, value: serde_json::Value) -> Result<&Self, ResourceError> {
        self.config(ConfigPatch::from_json(value)?)
    }

    /// Enqueue a load of `identity` into the buffer
    ///
    /// Locality is read when the step runs.
    ///
    /// # Errors
    ///
    /// Returns `Pipeline` if the pipeline already failed.
    pub fn load(&self) -> Result<&Self, ResourceError> {
        let identity = Arc::clone(&self.identity);
        let config = Arc::clone(&self.config);
        let storage = self.storage.clone();

        self.pipeline.enqueue(Step::new("load", move |_buffer: Buffer| {
            fetch(identity, config, storage)
        }))?;
        Ok(self)
    }

    /// Enqueue `count` degrade passes with a falling quality ramp
    ///
    /// `quality` overrides the configured base quality for these passes.
    ///
    /// # Errors
    ///
    /// Returns `InvalidQuality` for an override outside 1..=100, or
    /// `Pipeline` if the pipeline already failed.
    pub fn crust(&self, count: u32, quality: Option<u8>) -> Result<&Self, ResourceError> {
        let base = match quality {
            Some(q) if (1..=100).contains(&q) => q,
            Some(q) => return Err(ResourceError::InvalidQuality(q)),
            None => self.config.read().quality,
        };

        let schedule = degrade_schedule(base, count);
        tracing::debug!(identity = %self.identity, ?schedule, "queueing crust passes");
        for (i, q) in schedule.into_iter().enumerate() {
            let engine = Arc::clone(&self.engine);
            self.pipeline.enqueue(Step::new(format!("crust[{i}]"), move |buffer: Buffer| {
                transform_pass(buffer, engine, TransformOp::crust(q), "crust")
            }))?;
        }
        Ok(self)
    }

    /// Enqueue `count` strong sharpen passes
    ///
    /// Every pass uses the same fixed kernel; `amount` does not change it.
    ///
    /// # Errors
    ///
    /// Returns `Pipeline` if the pipeline already failed.
    pub fn fry(&self, count: u32, amount: f32) -> Result<&Self, ResourceError> {
        let count = count.max(1);
        tracing::debug!(identity = %self.identity, count, amount, "queueing fry passes");
        for i in 0..count {
            let engine = Arc::clone(&self.engine);
            self.pipeline.enqueue(Step::new(format!("fry[{i}]"), move |buffer: Buffer| {
                transform_pass(buffer, engine, TransformOp::fry(), "fry")
            }))?;
        }
        Ok(self)
    }

    /// Enqueue a write of the buffer to `target`
    ///
    /// The step completes only once the bytes are durable. The buffer is
    /// kept, so further passes and saves can follow.
    ///
    /// # Errors
    ///
    /// Returns `MissingSaveTarget` for an empty target (nothing is
    /// enqueued), or `Pipeline` if the pipeline already failed.
    pub fn save(&self, target: impl Into<String>) -> Result<&Self, ResourceError> {
        let target = target.into();
        if target.trim().is_empty() {
            return Err(ResourceError::MissingSaveTarget);
        }

        let config = Arc::clone(&self.config);
        let storage = self.storage.clone();
        self.pipeline.enqueue(Step::new("save", move |buffer: Buffer| {
            store(buffer, target, config, storage)
        }))?;
        Ok(self)
    }

    /// Copy of the buffer as seen by a step queued now
    ///
    /// # Errors
    ///
    /// Returns `Pipeline` if the pipeline fails before the snapshot runs.
    pub async fn snapshot(&self) -> Result<Buffer, ResourceError> {
        let (tx, rx) = oneshot::channel();
        self.pipeline.enqueue(Step::sync("snapshot", move |buffer: Buffer| {
            // Receiver may have been dropped; the buffer is unaffected.
            let _ = tx.send(buffer.clone());
            Ok(buffer)
        }))?;

        match rx.await {
            Ok(buffer) => Ok(buffer),
            Err(_) => Err(self
                .wait()
                .await
                .err()
                .unwrap_or(ResourceError::Pipeline(PipelineError::Stopped))),
        }
    }

    /// Wait until every queued step has run
    ///
    /// # Errors
    ///
    /// Returns `Pipeline` carrying the failure if a step failed.
    pub async fn wait(&self) -> Result<DrainReport, ResourceError> {
        Ok(self.pipeline.wait_idle().await?)
    }

    /// Subscribe to step and drain events
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<PipelineEvent<StepError>> {
        self.pipeline.subscribe()
    }

    /// Pipeline status snapshot
    #[must_use]
    pub fn status(&self) -> PipelineStatus<StepError> {
        self.pipeline.status()
    }

    /// Hold queued steps after the current one finishes
    pub fn pause(&self) -> &Self {
        self.pipeline.pause();
        self
    }

    /// Release held steps
    pub fn resume(&self) -> &Self {
        self.pipeline.resume();
        self
    }

    /// Run everything queued, stop the pipeline, and return the final buffer
    ///
    /// # Errors
    ///
    /// Returns `Pipeline` carrying the failure if a step failed.
    pub async fn finish(self) -> Result<Buffer, ResourceError> {
        let identity = Arc::clone(&self.identity);
        let buffer = self.pipeline.shutdown().await?;
        tracing::info!(
            %identity,
            bytes = buffer.as_ref().map_or(0, Bytes::len),
            "image resource finished"
        );
        Ok(buffer)
    }
}

impl fmt::Debug for ImageResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageResource")
            .field("identity", &self.identity)
            .field("config", &*self.config.read())
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

async fn fetch(
    identity: Arc<str>,
    config: Arc<RwLock<ResourceConfig>>,
    storage: StorageRouter,
) -> Result<Buffer, StepError> {
    let requested = config.read().locality;
    let (backend, used) = storage.select(requested);

    let body = backend.download(&identity).await?;
    tracing::debug!(%identity, locality = %used, bytes = body.len(), "loaded");
    Ok(Some(body))
}

async fn transform_pass(
    buffer: Buffer,
    engine: Arc<dyn TransformEngine>,
    op: TransformOp,
    step: &'static str,
) -> Result<Buffer, StepError> {
    let input = buffer.ok_or(StepError::NoBuffer { step })?;
    let in_len = input.len();

    let out = engine.transform(input, op).await?;
    if out.is_empty() {
        return Err(TransformError::EmptyOutput.into());
    }
    tracing::debug!(step, %op, in_bytes = in_len, out_bytes = out.len(), "pass complete");
    Ok(Some(out))
}

async fn store(
    buffer: Buffer,
    target: String,
    config: Arc<RwLock<ResourceConfig>>,
    storage: StorageRouter,
) -> Result<Buffer, StepError> {
    let body = buffer.ok_or(StepError::NoBuffer { step: "save" })?;
    let requested = config.read().locality;
    let (backend, used) = storage.select(requested);

    backend.upload(&target, body.clone()).await?;
    tracing::debug!(%target, locality = %used, bytes = body.len(), "saved");
    Ok(Some(body))
}
