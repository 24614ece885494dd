//! Error types for image resources
//!
//! Two families:
//! - `ResourceError`: returned synchronously by a builder call that
//!   violates a precondition; nothing is enqueued
//! - `StepError`: raised inside a queued step; fails the pipeline

use fryer_engine::TransformError;
use fryer_pipeline::PipelineError;
use fryer_storage::StorageError;
use std::path::PathBuf;

/// Failures raised while a step executes
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    /// Storage backend failed
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Transform engine failed
    #[error(transparent)]
    Transform(#[from] TransformError),

    /// Step needs a buffer but nothing was loaded
    #[error("{step} requires an image buffer but none is loaded")]
    NoBuffer {
        /// Operation that found the buffer empty
        step: &'static str,
    },
}

impl StepError {
    /// Check if the resource was in the wrong state rather than an I/O or codec failure
    #[inline]
    #[must_use]
    pub fn is_state_error(&self) -> bool {
        matches!(self, Self::NoBuffer { .. })
    }
}

/// Failures reported at call time
#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    /// Resource created without an identity
    #[error("resource identity must not be empty")]
    MissingIdentity,

    /// `save` called without a target
    #[error("save target must not be empty")]
    MissingSaveTarget,

    /// Quality outside 1..=100
    #[error("quality {0} outside 1..=100")]
    InvalidQuality(u8),

    /// Configuration value of the wrong shape
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Pipeline is terminal or a queued step failed
    #[error(transparent)]
    Pipeline(#[from] PipelineError<StepError>),
}

impl ResourceError {
    /// Get the step error that failed the pipeline, if any
    #[must_use]
    pub fn step_error(&self) -> Option<&StepError> {
        match self {
            Self::Pipeline(e) => e.failure().and_then(|f| f.cause.step_error()),
            _ => None,
        }
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read config {path}: {source}")]
    Read {
        /// Config file path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// File is not valid TOML for this schema
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Environment variable has an unusable value
    #[error("invalid value for {var}: {reason}")]
    Env {
        /// Variable name
        var: &'static str,
        /// What was wrong
        reason: String,
    },

    /// Value out of range
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
