//! Fryer Pipeline - strictly ordered step execution
//!
//! A `Pipeline` owns one context value and a FIFO of steps. Steps run
//! one at a time, in submission order; each receives the context by
//! value and hands it back when done. A slow step blocks everything
//! queued after it. The first failure is terminal.
//!
//! # Example
//!
//! ```rust,ignore
//! use fryer_pipeline::{Pipeline, PipelineOptions, Step};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = Pipeline::<Vec<u8>, std::io::Error>::spawn(Vec::new(), PipelineOptions::default());
//!
//! pipeline.enqueue(Step::sync("fill", |mut buf: Vec<u8>| {
//!     buf.extend_from_slice(b"hello");
//!     Ok(buf)
//! }))?;
//!
//! pipeline.wait_idle().await?;
//! let buf = pipeline.shutdown().await?;
//! assert_eq!(buf, b"hello");
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod error;
pub mod event;
pub mod pipeline;
pub mod state;
pub mod step;

// Re-exports for convenience
pub use error::{FailureCause, PipelineError, StepFailure};
pub use event::PipelineEvent;
pub use pipeline::{Pipeline, PipelineId, PipelineOptions};
pub use state::{DrainReport, PipelineState, PipelineStatus};
pub use step::{Step, StepName, StepSeq};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
