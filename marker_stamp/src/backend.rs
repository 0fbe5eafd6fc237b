// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backend traits and resource handles.

use kurbo::{Affine, BezPath, Rect, Shape, StrokeOpts};
use peniko::{Color, ImageQuality};

use crate::StampError;
use crate::loader::PathSink;
use crate::style::StrokeStyle;

/// Tolerance used when flattening stroke outlines for extents queries.
pub const STROKE_TOLERANCE: f64 = 0.1;

/// Identifier for an offscreen alpha-only surface.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub u32);

/// Identifier for a pattern that samples a surface.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PatternId(pub u32);

/// Where fills and strokes land.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DrawTarget {
    /// The backend's main canvas.
    Canvas,
    /// An offscreen surface created with [`StampBackend::create_alpha_surface`].
    Surface(SurfaceId),
}

/// A 2D vector backend that the stamp cache can draw with.
///
/// The backend holds a current path (built through [`PathSink`]), a source
/// colour, a stroke style, and a draw target, much like an immediate-mode
/// context. [`fill`](Self::fill) and [`stroke`](Self::stroke) consume the
/// current path; the extents queries do not.
///
/// Surfaces and patterns are explicit resources. The cache destroys every
/// pattern it creates before the surface the pattern samples.
pub trait StampBackend: PathSink {
    /// Size of the main canvas in pixels.
    fn target_size(&self) -> (u32, u32);

    /// Current source colour.
    fn source_color(&self) -> Color;
    /// Replace the source colour.
    fn set_source_color(&mut self, color: Color);

    /// Current stroke style.
    fn stroke_style(&self) -> &StrokeStyle;
    /// Replace the stroke style.
    fn set_stroke_style(&mut self, style: StrokeStyle);

    /// Discard the current path.
    fn new_path(&mut self);
    /// Fill the current path (nonzero winding) with the source colour.
    fn fill(&mut self);
    /// Stroke the current path with the source colour and stroke style.
    fn stroke(&mut self);

    /// Bounds of the current path's geometry, ignoring stroke state.
    fn path_extents(&self) -> Rect;
    /// Bounds of the area a fill of the current path would cover.
    fn fill_extents(&self) -> Rect;
    /// Bounds of the area a stroke of the current path would cover.
    fn stroke_extents(&self) -> Rect;

    /// Create a cleared, alpha-only offscreen surface.
    fn create_alpha_surface(&mut self, width: u32, height: u32) -> Result<SurfaceId, StampError>;
    /// Destroy a surface.
    fn destroy_surface(&mut self, id: SurfaceId);

    /// Create a pattern that samples `surface` with the given filter.
    fn create_pattern(&mut self, surface: SurfaceId, quality: ImageQuality) -> PatternId;
    /// Destroy a pattern.
    fn destroy_pattern(&mut self, id: PatternId);

    /// Redirect fills and strokes.
    fn set_target(&mut self, target: DrawTarget);

    /// Paint the source colour onto the canvas through the alpha of `pattern`.
    ///
    /// `pattern_matrix` maps device space to pattern space.
    fn mask(&mut self, pattern: PatternId, pattern_matrix: Affine);
}

/// Bounds of a path's geometry; an empty path has zero-sized bounds at the origin.
pub fn path_bounds(path: &BezPath) -> Rect {
    if path.elements().is_empty() {
        Rect::ZERO
    } else {
        path.bounding_box()
    }
}

/// Bounds of the area covered by stroking `path` with `style`.
pub fn stroke_bounds(path: &BezPath, style: &StrokeStyle) -> Rect {
    if path.elements().is_empty() {
        return Rect::ZERO;
    }
    let outline = kurbo::stroke(path.iter(), style, &StrokeOpts::default(), STROKE_TOLERANCE);
    path_bounds(&outline)
}

/// Run `f` with the backend's stroke style temporarily replaced by `style`.
pub(crate) fn with_stroke_style<B: StampBackend + ?Sized, R>(
    backend: &mut B,
    style: &StrokeStyle,
    f: impl FnOnce(&mut B) -> R,
) -> R {
    let saved = backend.stroke_style().clone();
    backend.set_stroke_style(style.clone());
    let out = f(backend);
    backend.set_stroke_style(saved);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_path_has_zero_bounds() {
        assert_eq!(path_bounds(&BezPath::new()), Rect::ZERO);
        assert_eq!(stroke_bounds(&BezPath::new(), &StrokeStyle::new(4.0)), Rect::ZERO);
    }

    #[test]
    fn stroke_bounds_grow_by_half_width() {
        let mut path = BezPath::new();
        path.move_to((0.0, 0.0));
        path.line_to((10.0, 0.0));
        let bounds = stroke_bounds(&path, &StrokeStyle::new(4.0).with_caps(kurbo::Cap::Butt));
        assert!((bounds.y0 + 2.0).abs() < 1e-9, "{bounds:?}");
        assert!((bounds.y1 - 2.0).abs() < 1e-9, "{bounds:?}");
        assert!((bounds.x0 - 0.0).abs() < 1e-9, "{bounds:?}");
        assert!((bounds.x1 - 10.0).abs() < 1e-9, "{bounds:?}");
    }
}
