//! Transform operation parameters

use crate::error::TransformError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Quality used when an operation does not name one
pub const DEFAULT_QUALITY: u8 = 92;

/// Largest kernel half-width derived from sigma alone
pub const MAX_HALF_WIDTH: usize = 32;

/// One sharpen + re-encode pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformOp {
    /// Kernel half-width in pixels; 0 derives it from sigma
    pub sharpen_radius: f32,
    /// Gaussian standard deviation
    pub sharpen_sigma: f32,
    /// JPEG quality 1..=100, `None` for the engine default
    pub quality: Option<u8>,
}

impl TransformOp {
    /// Mild sharpen at an explicit quality (degrade pass)
    #[inline]
    #[must_use]
    pub fn crust(quality: u8) -> Self {
        Self {
            sharpen_radius: 1.0,
            sharpen_sigma: 0.5,
            quality: Some(quality),
        }
    }

    /// Strong sharpen at the default quality
    #[inline]
    #[must_use]
    pub fn fry() -> Self {
        Self {
            sharpen_radius: 1.0,
            sharpen_sigma: 100.0,
            quality: None,
        }
    }

    /// Quality the output will be encoded at
    #[inline]
    #[must_use]
    pub fn effective_quality(&self) -> u8 {
        self.quality.unwrap_or(DEFAULT_QUALITY)
    }

    /// Kernel half-width for this operation
    #[must_use]
    pub fn half_width(&self) -> usize {
        let half = if self.sharpen_radius > 0.0 {
            self.sharpen_radius.ceil()
        } else {
            (3.0 * self.sharpen_sigma).ceil().min(MAX_HALF_WIDTH as f32)
        };
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let half = half as usize;
        half.max(1)
    }

    /// Check parameters before any pixel work
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameters` for non-finite or negative radius,
    /// non-positive sigma, or quality outside 1..=100.
    pub fn validate(&self) -> Result<(), TransformError> {
        if !self.sharpen_radius.is_finite() || self.sharpen_radius < 0.0 {
            return Err(TransformError::InvalidParameters(format!(
                "sharpen radius {} must be finite and >= 0",
                self.sharpen_radius
            )));
        }
        if !self.sharpen_sigma.is_finite() || self.sharpen_sigma <= 0.0 {
            return Err(TransformError::InvalidParameters(format!(
                "sharpen sigma {} must be finite and > 0",
                self.sharpen_sigma
            )));
        }
        if let Some(q) = self.quality {
            if !(1..=100).contains(&q) {
                return Err(TransformError::InvalidParameters(format!(
                    "quality {q} outside 1..=100"
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for TransformOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sharpen({}x{}) q{}",
            self.sharpen_radius,
            self.sharpen_sigma,
            self.effective_quality()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets() {
        let crust = TransformOp::crust(35);
        assert_eq!(crust.sharpen_sigma, 0.5);
        assert_eq!(crust.effective_quality(), 35);

        let fry = TransformOp::fry();
        assert_eq!(fry.sharpen_sigma, 100.0);
        assert_eq!(fry.effective_quality(), DEFAULT_QUALITY);
        assert_eq!(fry.half_width(), 1);
    }

    #[test]
    fn half_width_from_sigma_is_capped() {
        let op = TransformOp {
            sharpen_radius: 0.0,
            sharpen_sigma: 50.0,
            quality: None,
        };
        assert_eq!(op.half_width(), MAX_HALF_WIDTH);

        let op = TransformOp {
            sharpen_radius: 0.0,
            sharpen_sigma: 0.5,
            quality: None,
        };
        assert_eq!(op.half_width(), 2);
    }

    #[test]
    fn validate_rejects_bad_parameters() {
        assert!(TransformOp::crust(0).validate().is_err());
        assert!(TransformOp::crust(101).validate().is_err());
        assert!(TransformOp::crust(1).validate().is_ok());

        let op = TransformOp {
            sharpen_radius: f32::NAN,
            ..TransformOp::fry()
        };
        assert!(op.validate().is_err());

        let op = TransformOp {
            sharpen_sigma: 0.0,
            ..TransformOp::fry()
        };
        assert!(op.validate().is_err());
    }

    #[test]
    fn display_shows_quality() {
        assert_eq!(TransformOp::crust(40).to_string(), "sharpen(1x0.5) q40");
    }
}
