//! Fryer Engine - sharpen and re-encode passes
//!
//! Provides:
//! - `TransformEngine`: the async transform capability
//! - `TransformOp`: sharpen radius/sigma plus output quality, with the
//!   `crust` (mild, explicit quality) and `fry` (strong, default quality)
//!   presets
//! - `ImageEngine`: implementation on the `image` crate

#![warn(unreachable_pub)]

pub mod engine;
pub mod error;
pub mod op;
pub mod sharpen;

// Re-exports for convenience
pub use engine::{ImageEngine, TransformEngine};
pub use error::TransformError;
pub use op::{TransformOp, DEFAULT_QUALITY};
