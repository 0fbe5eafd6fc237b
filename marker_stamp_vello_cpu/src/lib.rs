// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Vello CPU–backed pixel implementation of [`StampBackend`].
//!
//! [`VelloCpuStampBackend`] records canvas fills and strokes into one
//! persistent [`vello_cpu::RenderContext`]. Each offscreen surface is its own
//! render context; a pattern renders that context into a [`Pixmap`] once and
//! keeps it as an image paint. [`mask`] paints the source colour through the
//! pattern's alpha inside a `DestIn` blend layer, sampling with the pattern's
//! [`ImageQuality`].
//!
//! Every path is filled with the non-zero winding rule.
//!
//! [`mask`]: StampBackend::mask

use std::fmt;
use std::sync::Arc;

use kurbo::{Affine, BezPath, Point, Rect};
use marker_stamp::{
    DrawTarget, PathSink, PatternId, StampBackend, StampError, StrokeStyle, SurfaceId,
    path_bounds, stroke_bounds,
};
use peniko::{BlendMode, Color, Compose, Fill, ImageQuality, ImageSampler};
use tracing::{debug, warn};
use vello_cpu::{Image, ImageSource, Pixmap, RenderContext, RenderMode, RenderSettings};

/// Offscreen surface; only the alpha of what it records is ever used.
struct Surface {
    width: u16,
    height: u16,
    ctx: RenderContext,
}

fn render_settings() -> RenderSettings {
    RenderSettings {
        // Keep rasterization on the u8 pipeline so pixels are stable across feature sets.
        render_mode: RenderMode::OptimizeSpeed,
        ..RenderSettings::default()
    }
}

/// Pixel backend built on `vello_cpu`.
pub struct VelloCpuStampBackend {
    width: u16,
    height: u16,
    ctx: RenderContext,
    /// Last rendering of `ctx`; stale while `dirty`.
    pixmap: Pixmap,
    dirty: bool,
    path: BezPath,
    color: Color,
    stroke: StrokeStyle,
    target: DrawTarget,
    surfaces: Vec<Option<Surface>>,
    patterns: Vec<Option<(Image, u16, u16)>>,
}

impl fmt::Debug for VelloCpuStampBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VelloCpuStampBackend")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("target", &self.target)
            .field("live_resources", &self.live_resources())
            .finish_non_exhaustive()
    }
}

impl VelloCpuStampBackend {
    /// Create a backend with a transparent canvas of the given size.
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            ctx: RenderContext::new_with(width, height, render_settings()),
            pixmap: Pixmap::new(width, height),
            dirty: false,
            path: BezPath::new(),
            color: Color::BLACK,
            stroke: StrokeStyle::default(),
            target: DrawTarget::Canvas,
            surfaces: Vec::new(),
            patterns: Vec::new(),
        }
    }

    /// Canvas width in pixels.
    pub fn width(&self) -> u16 {
        self.width
    }

    /// Canvas height in pixels.
    pub fn height(&self) -> u16 {
        self.height
    }

    /// Fill the whole canvas with `color`, replacing its contents.
    pub fn clear(&mut self, color: Color) {
        self.ctx.reset();
        self.ctx.set_paint(color);
        self.ctx.fill_rect(&Rect::new(
            0.0,
            0.0,
            f64::from(self.width),
            f64::from(self.height),
        ));
        self.dirty = true;
    }

    /// The rendered canvas, premultiplied RGBA8.
    ///
    /// Renders everything recorded since the last call.
    pub fn pixmap(&mut self) -> &Pixmap {
        if self.dirty {
            self.ctx.flush();
            self.ctx.render_to_pixmap(&mut self.pixmap);
            self.dirty = false;
        }
        &self.pixmap
    }

    /// Premultiplied RGBA8 pixel at `(x, y)`, or `None` outside the canvas.
    pub fn pixel(&mut self, x: u16, y: u16) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let px = self.pixmap().sample(x, y);
        Some([px.r, px.g, px.b, px.a])
    }

    /// Unpremultiplied RGBA8 bytes, row-major, ready for image encoders.
    pub fn to_rgba8(&mut self) -> Vec<u8> {
        self.pixmap()
            .clone()
            .take_unpremultiplied()
            .into_iter()
            .flat_map(|px| [px.r, px.g, px.b, px.a])
            .collect()
    }

    /// Number of surfaces and patterns created and not yet destroyed.
    pub fn live_resources(&self) -> usize {
        self.surfaces.iter().flatten().count() + self.patterns.iter().flatten().count()
    }

    /// Render context that receives path draws, or `None` for a destroyed surface.
    fn target_ctx(&mut self) -> Option<&mut RenderContext> {
        match self.target {
            DrawTarget::Canvas => {
                self.dirty = true;
                Some(&mut self.ctx)
            }
            DrawTarget::Surface(id) => {
                let surface = self.surfaces.get_mut(id.0 as usize).and_then(Option::as_mut);
                if surface.is_none() {
                    warn!(?id, "draw into a destroyed surface ignored");
                }
                surface.map(|s| &mut s.ctx)
            }
        }
    }
}

impl PathSink for VelloCpuStampBackend {
    fn move_to(&mut self, p: Point) {
        self.path.move_to(p);
    }

    fn line_to(&mut self, p: Point) {
        self.path.line_to(p);
    }

    fn curve_to(&mut self, c1: Point, c2: Point, p: Point) {
        self.path.curve_to(c1, c2, p);
    }

    fn close_path(&mut self) {
        self.path.close_path();
    }
}

impl StampBackend for VelloCpuStampBackend {
    fn target_size(&self) -> (u32, u32) {
        (u32::from(self.width), u32::from(self.height))
    }

    fn source_color(&self) -> Color {
        self.color
    }

    fn set_source_color(&mut self, color: Color) {
        self.color = color;
    }

    fn stroke_style(&self) -> &StrokeStyle {
        &self.stroke
    }

    fn set_stroke_style(&mut self, style: StrokeStyle) {
        self.stroke = style;
    }

    fn new_path(&mut self) {
        self.path.truncate(0);
    }

    fn fill(&mut self) {
        let path = core::mem::take(&mut self.path);
        let color = self.color;
        if let Some(ctx) = self.target_ctx() {
            ctx.reset_transform();
            ctx.set_fill_rule(Fill::NonZero);
            ctx.set_paint(color);
            ctx.fill_path(&path);
        }
    }

    fn stroke(&mut self) {
        let path = core::mem::take(&mut self.path);
        if path.elements().is_empty() {
            return;
        }
        let (color, stroke) = (self.color, self.stroke.clone());
        if let Some(ctx) = self.target_ctx() {
            ctx.reset_transform();
            ctx.set_paint(color);
            ctx.set_stroke(stroke);
            ctx.stroke_path(&path);
        }
    }

    fn path_extents(&self) -> Rect {
        path_bounds(&self.path)
    }

    fn fill_extents(&self) -> Rect {
        path_bounds(&self.path)
    }

    fn stroke_extents(&self) -> Rect {
        stroke_bounds(&self.path, &self.stroke)
    }

    fn create_alpha_surface(&mut self, width: u32, height: u32) -> Result<SurfaceId, StampError> {
        let (Ok(w), Ok(h)) = (u16::try_from(width), u16::try_from(height)) else {
            return Err(StampError::SurfaceAllocation { width, height });
        };
        let id = SurfaceId(
            u32::try_from(self.surfaces.len())
                .expect("VelloCpuStampBackend: too many surfaces for u32 SurfaceId"),
        );
        self.surfaces.push(Some(Surface {
            width: w,
            height: h,
            ctx: RenderContext::new_with(w, h, render_settings()),
        }));
        Ok(id)
    }

    fn destroy_surface(&mut self, id: SurfaceId) {
        match self.surfaces.get_mut(id.0 as usize) {
            Some(slot @ Some(_)) => *slot = None,
            _ => debug!(?id, "surface already destroyed"),
        }
    }

    fn create_pattern(&mut self, surface: SurfaceId, quality: ImageQuality) -> PatternId {
        let id = PatternId(
            u32::try_from(self.patterns.len())
                .expect("VelloCpuStampBackend: too many patterns for u32 PatternId"),
        );
        let pattern = self
            .surfaces
            .get_mut(surface.0 as usize)
            .and_then(Option::as_mut)
            .map(|s| {
                let mut pixmap = Pixmap::new(s.width, s.height);
                s.ctx.flush();
                s.ctx.render_to_pixmap(&mut pixmap);
                let image = Image {
                    image: ImageSource::Pixmap(Arc::new(pixmap)),
                    sampler: ImageSampler::new().with_quality(quality),
                };
                (image, s.width, s.height)
            });
        if pattern.is_none() {
            warn!(?surface, "pattern created for a destroyed surface");
        }
        self.patterns.push(pattern);
        id
    }

    fn destroy_pattern(&mut self, id: PatternId) {
        match self.patterns.get_mut(id.0 as usize) {
            Some(slot @ Some(_)) => *slot = None,
            _ => debug!(?id, "pattern already destroyed"),
        }
    }

    fn set_target(&mut self, target: DrawTarget) {
        self.target = target;
    }

    fn mask(&mut self, pattern: PatternId, pattern_matrix: Affine) {
        let Some((image, w, h)) = self.patterns.get(pattern.0 as usize).and_then(Option::as_ref)
        else {
            warn!(?pattern, "mask with a destroyed pattern ignored");
            return;
        };
        let det = pattern_matrix.determinant();
        if !(det.is_finite() && det != 0.0) {
            return;
        }
        let extent = Rect::new(0.0, 0.0, f64::from(*w), f64::from(*h));
        let image = image.clone();
        let ctx = &mut self.ctx;

        // Pattern space is drawn at its natural size; the inverse places it on the canvas.
        ctx.set_transform(pattern_matrix.inverse());
        ctx.reset_paint_transform();
        ctx.push_layer(None, None, None, None, None);
        ctx.set_paint(self.color);
        ctx.fill_rect(&extent);
        ctx.push_blend_layer(BlendMode::from(Compose::DestIn));
        ctx.set_paint(image);
        ctx.fill_rect(&extent);
        ctx.pop_layer();
        ctx.pop_layer();
        ctx.reset_transform();
        self.dirty = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draw_rect(backend: &mut VelloCpuStampBackend, rect: Rect) {
        backend.move_to(Point::new(rect.x0, rect.y0));
        backend.line_to(Point::new(rect.x1, rect.y0));
        backend.line_to(Point::new(rect.x1, rect.y1));
        backend.line_to(Point::new(rect.x0, rect.y1));
        backend.close_path();
    }

    #[test]
    fn pixel_aligned_rect_is_fully_covered() {
        let mut backend = VelloCpuStampBackend::new(10, 10);
        backend.set_source_color(Color::from_rgb8(0, 0, 255));
        draw_rect(&mut backend, Rect::new(2.0, 3.0, 6.0, 5.0));
        backend.fill();
        assert_eq!(backend.pixel(2, 3), Some([0, 0, 255, 255]));
        assert_eq!(backend.pixel(5, 4), Some([0, 0, 255, 255]));
        assert_eq!(backend.pixel(6, 4), Some([0; 4]));
        assert_eq!(backend.pixel(10, 0), None);
    }

    #[test]
    fn clear_replaces_earlier_draws() {
        let mut backend = VelloCpuStampBackend::new(4, 4);
        draw_rect(&mut backend, Rect::new(0.0, 0.0, 4.0, 4.0));
        backend.fill();
        backend.clear(Color::WHITE);
        assert!(backend.pixmap().data().iter().all(|px| px.r == 255 && px.a == 255));
        assert_eq!(&backend.to_rgba8()[..4], &[255; 4]);
    }

    #[test]
    fn oversized_surfaces_fail_to_allocate() {
        let mut backend = VelloCpuStampBackend::new(4, 4);
        assert_eq!(
            backend.create_alpha_surface(70_000, 2),
            Err(StampError::SurfaceAllocation {
                width: 70_000,
                height: 2
            })
        );
        assert_eq!(backend.live_resources(), 0);
    }

    #[test]
    fn mask_paints_the_source_colour_through_surface_alpha() {
        let mut backend = VelloCpuStampBackend::new(8, 8);
        let surface = backend.create_alpha_surface(4, 4).unwrap();
        backend.set_target(DrawTarget::Surface(surface));
        backend.set_source_color(Color::from_rgb8(255, 0, 0));
        draw_rect(&mut backend, Rect::new(0.0, 0.0, 2.0, 4.0));
        backend.fill();
        backend.set_target(DrawTarget::Canvas);
        assert!(backend.pixmap().data().iter().all(|px| px.a == 0));

        let pattern = backend.create_pattern(surface, ImageQuality::Low);
        backend.set_source_color(Color::from_rgb8(0, 255, 0));
        backend.mask(pattern, Affine::translate((-3.0, -1.0)));
        assert_eq!(backend.pixel(3, 1), Some([0, 255, 0, 255]));
        assert_eq!(backend.pixel(4, 4), Some([0, 255, 0, 255]));
        assert_eq!(backend.pixel(5, 1), Some([0; 4]));
        assert_eq!(backend.pixel(2, 1), Some([0; 4]));

        backend.destroy_pattern(pattern);
        backend.destroy_surface(surface);
        assert_eq!(backend.live_resources(), 0);
    }

    #[test]
    fn singular_pattern_matrix_draws_nothing() {
        let mut backend = VelloCpuStampBackend::new(8, 8);
        let surface = backend.create_alpha_surface(4, 4).unwrap();
        backend.set_target(DrawTarget::Surface(surface));
        draw_rect(&mut backend, Rect::new(0.0, 0.0, 4.0, 4.0));
        backend.fill();
        backend.set_target(DrawTarget::Canvas);
        let pattern = backend.create_pattern(surface, ImageQuality::Low);
        backend.mask(pattern, Affine::scale(0.0));
        assert!(backend.pixmap().data().iter().all(|px| px.a == 0));
    }
}
