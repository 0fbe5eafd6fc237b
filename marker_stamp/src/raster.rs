// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Stamp rasterization and direct drawing.

use kurbo::{Affine, Rect};
use peniko::{Color, ImageQuality};
use tracing::{trace, warn};

use crate::StampError;
use crate::backend::{DrawTarget, PatternId, StampBackend, SurfaceId, with_stroke_style};
use crate::loader::load_path_exact;
use crate::path::PathData;
use crate::place::bucket_offset;
use crate::style::{DrawKind, StrokeStyle};

/// A pre-rasterized alpha surface plus the pattern that samples it.
///
/// Stamps are owned by exactly one cache slot. Releasing consumes the stamp,
/// so a stamp cannot be released twice.
#[derive(Debug)]
pub struct Stamp {
    surface: SurfaceId,
    pattern: PatternId,
}

impl Stamp {
    /// The offscreen surface holding the stamp's coverage.
    pub fn surface(&self) -> SurfaceId {
        self.surface
    }

    /// The pattern used to composite the stamp.
    pub fn pattern(&self) -> PatternId {
        self.pattern
    }

    /// Destroy the pattern, then the surface it samples.
    pub fn release<B: StampBackend + ?Sized>(self, backend: &mut B) {
        backend.destroy_pattern(self.pattern);
        backend.destroy_surface(self.surface);
    }
}

/// Load `path` through `transform` and fill or stroke it on the current target.
pub(crate) fn draw_path<B: StampBackend + ?Sized>(
    backend: &mut B,
    path: &PathData,
    transform: Affine,
    kind: DrawKind,
    style: &StrokeStyle,
) {
    backend.new_path();
    load_path_exact(backend, path, transform);
    match kind {
        DrawKind::Fill => backend.fill(),
        DrawKind::Stroke => with_stroke_style(backend, style, |b| b.stroke()),
    }
}

/// Device extents of `path` under `transform` for the given draw kind.
pub(crate) fn draw_extents<B: StampBackend + ?Sized>(
    backend: &mut B,
    path: &PathData,
    transform: Affine,
    kind: DrawKind,
    style: &StrokeStyle,
) -> Rect {
    backend.new_path();
    load_path_exact(backend, path, transform);
    let extents = match kind {
        DrawKind::Fill => backend.fill_extents(),
        DrawKind::Stroke => with_stroke_style(backend, style, |b| b.stroke_extents()),
    };
    backend.new_path();
    extents
}

/// Pixel size of the surface for a stamp with the given extents.
pub(crate) fn stamp_size(extents: Rect) -> (u32, u32) {
    #[expect(
        clippy::cast_possible_truncation,
        reason = "extents are bounded by the clamped coordinate range"
    )]
    let size = |len: f64| (len + 1.0).ceil() as u32;
    (size(extents.width()), size(extents.height()))
}

/// Rasterize the stamp for sub-pixel bucket `(i, j)` of an entry.
///
/// The shape is drawn into a fresh alpha surface with the quantized transform,
/// shifted so that the entry's extents start at the surface origin plus the
/// bucket's sub-pixel offset. The source colour and the draw target are
/// restored before returning; on allocation failure nothing has changed.
pub(crate) fn rasterize_stamp<B: StampBackend + ?Sized>(
    backend: &mut B,
    path: &PathData,
    transform: Affine,
    kind: DrawKind,
    style: &StrokeStyle,
    extents: Rect,
    (i, j): (usize, usize),
    n_subpix: usize,
) -> Result<Stamp, StampError> {
    let (width, height) = stamp_size(extents);
    let surface = backend
        .create_alpha_surface(width, height)
        .inspect_err(|err| warn!(%err, width, height, "stamp surface allocation failed"))?;

    let offset = bucket_offset(extents.origin(), i, j, n_subpix);
    let saved_color = backend.source_color();
    backend.set_target(DrawTarget::Surface(surface));
    backend.set_source_color(Color::BLACK);
    draw_path(
        backend,
        path,
        transform.then_translate(offset.to_vec2()),
        kind,
        style,
    );
    backend.set_source_color(saved_color);
    backend.set_target(DrawTarget::Canvas);

    let pattern = backend.create_pattern(surface, ImageQuality::Low);
    trace!(i, j, width, height, ?kind, "rasterized stamp");
    Ok(Stamp { surface, pattern })
}
