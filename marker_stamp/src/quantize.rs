// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Transform quantization.
//!
//! Two transforms that snap to the same grid cell produce the same cache key,
//! so a shape drawn under nearly identical transforms is rasterized once.
//! The grid is chosen from the untransformed extents of the shape so that
//! every point of the transformed shape moves by at most a third of the
//! tolerance per coefficient group.

use core::hash::{Hash, Hasher};

use kurbo::{Affine, Rect};

/// Snap `value` to the nearest multiple of `step`.
///
/// The result never carries a negative zero, so equal snapped values also
/// have equal bit patterns.
fn snap(value: f64, step: f64) -> f64 {
    if step > 0.0 && step.is_finite() {
        (value / step).round() * step + 0.0
    } else {
        value + 0.0
    }
}

/// An affine transform whose coefficients lie on a quantization grid.
///
/// Equality and hashing are bitwise over the six coefficients.
#[derive(Copy, Clone, Debug)]
pub struct QuantizedTransform {
    coeffs: [f64; 6],
}

impl QuantizedTransform {
    /// Quantize `transform` for a shape with untransformed `extents`.
    ///
    /// The linear part snaps to `(tolerance / 3) / max(|x0|, |x1|)` for the
    /// coefficients that multiply x, and the analogous step for y. The
    /// translation snaps to `translation_step`. An axis whose extents are all
    /// zero uses `tolerance` itself as its step.
    pub fn quantize(
        transform: Affine,
        extents: Rect,
        tolerance: f64,
        translation_step: f64,
    ) -> Self {
        let eps = tolerance / 3.0;
        let x_max = extents.x0.abs().max(extents.x1.abs());
        let y_max = extents.y0.abs().max(extents.y1.abs());
        let x_step = if x_max > 0.0 { eps / x_max } else { tolerance };
        let y_step = if y_max > 0.0 { eps / y_max } else { tolerance };
        let [a, b, c, d, e, f] = transform.as_coeffs();
        Self {
            coeffs: [
                snap(a, x_step),
                snap(b, x_step),
                snap(c, y_step),
                snap(d, y_step),
                snap(e, translation_step),
                snap(f, translation_step),
            ],
        }
    }

    /// The quantized coefficients, in [`Affine`] order.
    pub fn coeffs(&self) -> [f64; 6] {
        self.coeffs
    }

    /// The quantized transform.
    pub fn affine(&self) -> Affine {
        Affine::new(self.coeffs)
    }

    fn bits(&self) -> [u64; 6] {
        self.coeffs.map(f64::to_bits)
    }
}

impl PartialEq for QuantizedTransform {
    fn eq(&self, other: &Self) -> bool {
        self.bits() == other.bits()
    }
}

impl Eq for QuantizedTransform {}

impl Hash for QuantizedTransform {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bits().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 0.3;

    fn unit_box() -> Rect {
        Rect::new(-1.0, -1.0, 1.0, 1.0)
    }

    #[test]
    fn nearby_transforms_in_one_cell_collapse() {
        let step = TOL / 3.0;
        let a = QuantizedTransform::quantize(
            Affine::new([4.0, 0.0, 0.0, 4.0, 10.0 + 0.2 * step, 20.0]),
            unit_box(),
            TOL,
            step,
        );
        let b = QuantizedTransform::quantize(
            Affine::new([4.0 + 0.1 * step, 0.0, 0.0, 4.0, 10.0 - 0.2 * step, 20.0]),
            unit_box(),
            TOL,
            step,
        );
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_cells_differ() {
        let step = TOL / 3.0;
        let a = QuantizedTransform::quantize(Affine::IDENTITY, unit_box(), TOL, step);
        let b = QuantizedTransform::quantize(
            Affine::translate((2.0 * step, 0.0)),
            unit_box(),
            TOL,
            step,
        );
        assert_ne!(a, b);
    }

    #[test]
    fn quantization_error_is_bounded() {
        let extents = Rect::new(-3.0, -2.0, 5.0, 4.0);
        let step = TOL / 3.0;
        let transform = Affine::new([1.234, 0.567, -0.891, 2.345, 7.777, -3.333]);
        let q = QuantizedTransform::quantize(transform, extents, TOL, step).affine();
        for corner in [
            (extents.x0, extents.y0),
            (extents.x1, extents.y0),
            (extents.x0, extents.y1),
            (extents.x1, extents.y1),
        ] {
            let exact = transform * kurbo::Point::from(corner);
            let snapped = q * kurbo::Point::from(corner);
            assert!(
                (exact - snapped).hypot() <= TOL,
                "corner {corner:?} moved by {}",
                (exact - snapped).hypot()
            );
        }
    }

    #[test]
    fn negative_zero_is_normalized() {
        let step = TOL / 3.0;
        let a = QuantizedTransform::quantize(
            Affine::new([1.0, -0.001, 0.0, 1.0, -0.001, 0.0]),
            unit_box(),
            TOL,
            step,
        );
        let b = QuantizedTransform::quantize(Affine::IDENTITY, unit_box(), TOL, step);
        assert_eq!(a, b);
        assert!(
            a.coeffs().iter().all(|c| c.to_bits() != (-0.0_f64).to_bits()),
            "quantized coefficients must not carry a negative zero"
        );
    }

    #[test]
    fn zero_extent_axis_uses_tolerance() {
        // A horizontal segment has no y extent.
        let extents = Rect::new(0.0, 0.0, 2.0, 0.0);
        let q = QuantizedTransform::quantize(
            Affine::new([1.0, 0.0, 0.37, 1.0, 0.0, 0.0]),
            extents,
            TOL,
            TOL / 3.0,
        );
        assert!((q.coeffs()[2] - 0.3).abs() < 1e-12);
    }
}
