// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recoverable errors reported by the stamp cache.

use thiserror::Error;

/// Errors returned by path construction, batch setup, and stamp rasterization.
///
/// Internal consistency failures (for example a duplicate cache insertion)
/// are not represented here: they indicate a bug and panic instead.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum StampError {
    /// The code array does not have one entry per vertex.
    #[error("path has {vertices} vertices but {codes} codes")]
    LengthMismatch {
        /// Number of vertices.
        vertices: usize,
        /// Number of codes.
        codes: usize,
    },
    /// A code value is not one of the known path codes.
    #[error("unknown path code {code} at index {index}")]
    UnknownCode {
        /// The raw code value.
        code: u8,
        /// Index of the offending vertex.
        index: usize,
    },
    /// A curve segment runs past the end of the vertex array.
    #[error("curve starting at index {index} needs {needed} more vertices")]
    TruncatedCurve {
        /// Index of the first vertex of the curve segment.
        index: usize,
        /// Number of vertices missing after `index`.
        needed: usize,
    },
    /// A sub-path range does not fit in the vertex array.
    #[error("invalid sub-path range {start}..{stop} for {len} vertices")]
    InvalidRange {
        /// Requested start index.
        start: usize,
        /// Requested stop index (exclusive).
        stop: usize,
        /// Number of vertices in the path.
        len: usize,
    },
    /// The simplification tolerance is negative or not finite.
    #[error("tolerance must be finite and non-negative, got {0}")]
    InvalidTolerance(f64),
    /// The backend could not allocate an offscreen surface.
    #[error("failed to allocate a {width}x{height} offscreen surface")]
    SurfaceAllocation {
        /// Requested width in pixels.
        width: u32,
        /// Requested height in pixels.
        height: u32,
    },
}
