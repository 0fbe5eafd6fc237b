// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tunables for the stamp cache.

use crate::StampError;

/// Smallest tolerance for which stamping is enabled.
///
/// Below this, `ceil(1 / tolerance)` would exceed 16 sub-pixel buckets per
/// axis and the per-entry stamp grid stops paying for itself.
pub const MIN_STAMP_TOLERANCE: f64 = 1.0 / 16.0;

/// How the translation coefficients of a transform are quantized.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum TranslationQuantization {
    /// Snap translations to a third of the tolerance.
    Tolerance,
    /// Snap translations to a fixed step, in device pixels.
    ///
    /// A step of zero (or a non-finite step) falls back to [`Self::Tolerance`].
    Fixed(f64),
}

/// Configuration for a [`StampCache`](crate::StampCache).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StampConfig {
    /// Maximum pixel error accepted when reusing a stamp.
    ///
    /// Zero (or anything below [`MIN_STAMP_TOLERANCE`]) disables stamping:
    /// every request is drawn directly.
    pub tolerance: f64,
    /// Translation snapping policy.
    pub translation: TranslationQuantization,
    /// Draw shapes directly when their untransformed extent is within the
    /// tolerance of the origin on either axis.
    pub direct_draw_tiny_shapes: bool,
    /// Draw directly when a stamp would be larger than the target surface.
    pub direct_draw_oversized: bool,
}

impl StampConfig {
    /// Default tolerance: one ninth of a pixel, three sub-pixel steps per bucket.
    pub const DEFAULT_TOLERANCE: f64 = 1.0 / 9.0;

    /// Create a configuration with the given tolerance and default policies.
    pub const fn new(tolerance: f64) -> Self {
        Self {
            tolerance,
            translation: TranslationQuantization::Tolerance,
            direct_draw_tiny_shapes: true,
            direct_draw_oversized: true,
        }
    }

    /// Check that the tolerance is usable.
    pub fn validate(&self) -> Result<(), StampError> {
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(StampError::InvalidTolerance(self.tolerance));
        }
        Ok(())
    }

    /// Number of sub-pixel buckets per axis, or 0 when stamping is disabled.
    pub fn subpixel_count(&self) -> usize {
        if self.tolerance.is_finite() && self.tolerance >= MIN_STAMP_TOLERANCE {
            #[expect(
                clippy::cast_possible_truncation,
                reason = "tolerance >= 1/16 bounds the count to at most 16"
            )]
            let n = (1.0 / self.tolerance).ceil() as usize;
            n.max(1)
        } else {
            0
        }
    }

    /// Step used to snap the translation coefficients.
    pub(crate) fn translation_step(&self) -> f64 {
        match self.translation {
            TranslationQuantization::Fixed(step) if step.is_finite() && step > 0.0 => step,
            _ => self.tolerance / 3.0,
        }
    }
}

impl Default for StampConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TOLERANCE)
    }
}
