//! Fryer Core - image resources over an ordered step pipeline
//!
//! An `ImageResource` owns one encoded image buffer and one pipeline.
//! Its builder methods (`load`, `crust`, `fry`, `save`) enqueue steps
//! that run strictly in call order against pluggable storage and
//! transform capabilities.
//!
//! # Example
//!
//! ```rust,ignore
//! use fryer_core::{FryerConfig, ImageResource, Services};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = FryerConfig::load(None)?;
//! let image = ImageResource::new("cat.jpg", Services::from_config(&config))?;
//!
//! image.load()?.crust(4, None)?.fry(1, 1.0)?.save("cat-fried.jpg")?;
//! image.wait().await?;
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod config;
pub mod error;
pub mod resource;
pub mod schedule;
pub mod services;

// Re-exports for convenience
pub use config::{ConfigPatch, FryerConfig, ResourceConfig, DEFAULT_QUALITY};
pub use error::{ConfigError, ResourceError, StepError};
pub use resource::{Buffer, ImageResource};
pub use schedule::degrade_schedule;
pub use services::Services;

pub use fryer_pipeline::{
    DrainReport, PipelineEvent, PipelineId, PipelineOptions, PipelineState, PipelineStatus,
};
pub use fryer_storage::Locality;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
