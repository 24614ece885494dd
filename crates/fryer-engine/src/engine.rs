//! Transform capability and its `image`-backed implementation

use crate::error::TransformError;
use crate::op::TransformOp;
use crate::sharpen::unsharp_mask;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use std::fmt;
use std::time::Instant;

/// Byte-in, byte-out image transform
#[async_trait::async_trait]
pub trait TransformEngine: Send + Sync + fmt::Debug {
    /// Apply `op` to an encoded image, returning the re-encoded result
    ///
    /// # Errors
    ///
    /// Fails on undecodable input, rejected parameters, or empty output.
    async fn transform(&self, input: Bytes, op: TransformOp) -> Result<Bytes, TransformError>;
}

/// Decode, sharpen, re-encode as baseline JPEG
///
/// Pixel work runs on the blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageEngine;

impl ImageEngine {
    /// Create engine
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Synchronous transform, used by the async wrapper
    ///
    /// # Errors
    ///
    /// See [`TransformEngine::transform`].
    pub fn transform_blocking(input: &[u8], op: TransformOp) -> Result<Vec<u8>, TransformError> {
        op.validate()?;

        let decoded = image::load_from_memory(input).map_err(TransformError::Decode)?;
        let rgb = decoded.to_rgb8();
        let sharpened = unsharp_mask(&rgb, op.half_width(), op.sharpen_sigma);

        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, op.effective_quality())
            .encode_image(&sharpened)
            .map_err(TransformError::Encode)?;

        if out.is_empty() {
            return Err(TransformError::EmptyOutput);
        }
        Ok(out)
    }
}

#[async_trait::async_trait]
impl TransformEngine for ImageEngine {
    async fn transform(&self, input: Bytes, op: TransformOp) -> Result<Bytes, TransformError> {
        let started = Instant::now();
        let in_len = input.len();

        let out = tokio::task::spawn_blocking(move || Self::transform_blocking(&input, op))
            .await
            .map_err(|e| TransformError::Worker(e.to_string()))??;

        tracing::debug!(
            %op,
            in_bytes = in_len,
            out_bytes = out.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "transform complete"
        );
        Ok(Bytes::from(out))
    }
}
