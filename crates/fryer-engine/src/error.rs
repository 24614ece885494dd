//! Error types for the transform engine

/// Transform errors
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    /// Input is not a decodable image
    #[error("failed to decode input: {0}")]
    Decode(#[source] image::ImageError),

    /// Codec rejected the output
    #[error("failed to encode output: {0}")]
    Encode(#[source] image::ImageError),

    /// Codec produced zero bytes
    #[error("transform produced no output")]
    EmptyOutput,

    /// Operation parameters out of range
    #[error("invalid transform parameters: {0}")]
    InvalidParameters(String),

    /// Blocking worker did not complete
    #[error("transform worker failed: {0}")]
    Worker(String),
}

impl TransformError {
    /// Check if the input itself was the problem
    #[inline]
    #[must_use]
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}
