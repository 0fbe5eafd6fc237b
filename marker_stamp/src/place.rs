// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Sub-pixel placement of stamps.

use kurbo::{Affine, Point};

/// Where a stamp lands on the target.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Placement {
    /// Integer-valued device pixel that receives the stamp's top-left texel.
    pub pixel: Point,
    /// Sub-pixel bucket along x, in `0..n_subpix`.
    pub i: usize,
    /// Sub-pixel bucket along y, in `0..n_subpix`.
    pub j: usize,
}

impl Placement {
    /// Compute the placement of a stamp whose extents start at `entry_origin`
    /// (relative to the draw position) when drawn at `position`.
    ///
    /// Returns `None` when the target point is not finite.
    pub fn new(position: Point, entry_origin: Point, n_subpix: usize) -> Option<Self> {
        debug_assert!(n_subpix > 0, "placement requires at least one bucket");
        let target = position + entry_origin.to_vec2();
        if !(target.x.is_finite() && target.y.is_finite()) {
            return None;
        }
        let pixel = Point::new(target.x.floor(), target.y.floor());
        Some(Self {
            pixel,
            i: bucket(target.x - pixel.x, n_subpix),
            j: bucket(target.y - pixel.y, n_subpix),
        })
    }

    /// Index of the bucket in a row-major `n_subpix × n_subpix` grid.
    pub fn index(&self, n_subpix: usize) -> usize {
        self.i * n_subpix + self.j
    }

    /// Pattern matrix that maps device space onto stamp space.
    pub fn pattern_matrix(&self) -> Affine {
        Affine::translate((-self.pixel.x, -self.pixel.y))
    }
}

/// Bucket for a fractional offset in `[0, 1)`.
///
/// Rounding in `n * frac` can land exactly on `n` for fractions just below 1,
/// so the result is clamped to the last bucket.
fn bucket(frac: f64, n_subpix: usize) -> usize {
    #[expect(
        clippy::cast_possible_truncation,
        reason = "frac is in [0, 1) so the product is below n_subpix"
    )]
    let b = (n_subpix as f64 * frac).floor() as usize;
    b.min(n_subpix - 1)
}

/// Offset at which bucket `(i, j)` draws into its stamp surface.
pub(crate) fn bucket_offset(entry_origin: Point, i: usize, j: usize, n_subpix: usize) -> Point {
    let n = n_subpix as f64;
    Point::new(-entry_origin.x + i as f64 / n, -entry_origin.y + j as f64 / n)
}
