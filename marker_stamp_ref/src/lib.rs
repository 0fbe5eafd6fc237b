// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Marker Stamp Reference Backend.
//!
//! This crate provides a small, stateful implementation of
//! [`StampBackend`] for **event recording and resource tracking**.
//!
//! It does not rasterize to pixels. It is intended for tests and debugging
//! that want to assert on the fills, strokes and masks the stamp cache
//! issues, the state at the time of each one, and the lifetime of every
//! surface and pattern.
//!
//! Surface allocation failures can be injected with
//! [`RefBackend::fail_surface_allocations_after`] to exercise error paths.

use kurbo::{Affine, BezPath, Point, Rect};
use marker_stamp::{
    DrawTarget, PathSink, PatternId, StampBackend, StampError, StrokeStyle, SurfaceId,
    path_bounds, stroke_bounds,
};
use peniko::{Color, ImageQuality};

/// Snapshot of the drawing state at the time of a fill or stroke.
#[derive(Clone, Debug)]
pub struct StateSnapshot {
    /// Where the draw landed.
    pub target: DrawTarget,
    /// Source colour.
    pub color: Color,
    /// Stroke style.
    pub stroke: StrokeStyle,
}

/// Event recorded by the reference backend.
#[derive(Clone, Debug)]
pub enum Event {
    /// The current path was filled.
    Fill {
        /// The path, in device space.
        path: BezPath,
        /// State used for the fill.
        state: StateSnapshot,
    },
    /// The current path was stroked.
    Stroke {
        /// The path, in device space.
        path: BezPath,
        /// State used for the stroke.
        state: StateSnapshot,
    },
    /// A surface was created.
    CreateSurface {
        /// The new surface.
        id: SurfaceId,
        /// Width in pixels.
        width: u32,
        /// Height in pixels.
        height: u32,
    },
    /// A surface was destroyed.
    DestroySurface(SurfaceId),
    /// A pattern was created.
    CreatePattern {
        /// The new pattern.
        id: PatternId,
        /// The surface it samples.
        surface: SurfaceId,
        /// Sampling quality.
        quality: ImageQuality,
    },
    /// A pattern was destroyed.
    DestroyPattern(PatternId),
    /// The draw target changed.
    SetTarget(DrawTarget),
    /// The source colour was painted through a pattern.
    Mask {
        /// Pattern used as the mask.
        pattern: PatternId,
        /// Surface sampled by the pattern.
        surface: SurfaceId,
        /// Device-to-pattern matrix.
        matrix: Affine,
        /// Source colour at the time of the mask.
        color: Color,
    },
}

/// Simple reference implementation of [`StampBackend`].
///
/// This backend:
/// - Keeps a current path as a [`BezPath`],
/// - Tracks the current source colour, stroke style and draw target,
/// - Records [`Event`]s for fills, strokes, masks and resource changes,
/// - Counts live surfaces and patterns, and destroys of dead resources.
#[derive(Debug)]
pub struct RefBackend {
    size: (u32, u32),
    path: BezPath,
    state: StateSnapshot,
    /// Surface sizes, keyed by id; `None` once destroyed.
    surfaces: Vec<Option<(u32, u32)>>,
    /// Sampled surface of each pattern, keyed by id; `None` once destroyed.
    patterns: Vec<Option<SurfaceId>>,
    /// Allocations left before `create_alpha_surface` starts failing.
    allocations_left: Option<usize>,
    /// Destroys of resources that were already dead.
    double_destroys: usize,
    /// Log of events in the order they were applied.
    events: Vec<Event>,
}

impl RefBackend {
    /// Create a backend with a canvas of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            path: BezPath::new(),
            state: StateSnapshot {
                target: DrawTarget::Canvas,
                color: Color::BLACK,
                stroke: StrokeStyle::default(),
            },
            surfaces: Vec::new(),
            patterns: Vec::new(),
            allocations_left: None,
            double_destroys: 0,
            events: Vec::new(),
        }
    }

    /// Let `n` more surface allocations succeed, then fail every one after.
    pub fn fail_surface_allocations_after(&mut self, n: usize) {
        self.allocations_left = Some(n);
    }

    /// Let every surface allocation succeed again.
    pub fn clear_allocation_failures(&mut self) {
        self.allocations_left = None;
    }

    /// Returns a slice of recorded events.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Clears all recorded events but keeps resources.
    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    /// Current drawing state.
    pub fn state(&self) -> &StateSnapshot {
        &self.state
    }

    /// Number of surfaces created and not yet destroyed.
    pub fn live_surfaces(&self) -> usize {
        self.surfaces.iter().flatten().count()
    }

    /// Number of patterns created and not yet destroyed.
    pub fn live_patterns(&self) -> usize {
        self.patterns.iter().flatten().count()
    }

    /// Number of surfaces ever created.
    pub fn surfaces_created(&self) -> usize {
        self.surfaces.len()
    }

    /// Number of destroy calls on resources that were already destroyed.
    pub fn double_destroys(&self) -> usize {
        self.double_destroys
    }

    /// Number of [`Event::Mask`] events.
    pub fn mask_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, Event::Mask { .. }))
            .count()
    }

    /// Fill and stroke events that landed on the canvas.
    pub fn canvas_draws(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().filter(|e| match e {
            Event::Fill { state, .. } | Event::Stroke { state, .. } => {
                state.target == DrawTarget::Canvas
            }
            _ => false,
        })
    }

    fn take_path(&mut self) -> BezPath {
        core::mem::take(&mut self.path)
    }
}

impl PathSink for RefBackend {
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

impl StampBackend for RefBackend {
    fn target_size(&self) -> (u32, u32) {
        self.size
    }

    fn source_color(&self) -> Color {
        self.state.color
    }

    fn set_source_color(&mut self, color: Color) {
        self.state.color = color;
    }

    fn stroke_style(&self) -> &StrokeStyle {
        &self.state.stroke
    }

    fn set_stroke_style(&mut self, style: StrokeStyle) {
        self.state.stroke = style;
    }

    fn new_path(&mut self) {
        self.path.truncate(0);
    }

    fn fill(&mut self) {
        let path = self.take_path();
        self.events.push(Event::Fill {
            path,
            state: self.state.clone(),
        });
    }

    fn stroke(&mut self) {
        let path = self.take_path();
        self.events.push(Event::Stroke {
            path,
            state: self.state.clone(),
        });
    }

    fn path_extents(&self) -> Rect {
        path_bounds(&self.path)
    }

    fn fill_extents(&self) -> Rect {
        path_bounds(&self.path)
    }

    fn stroke_extents(&self) -> Rect {
        stroke_bounds(&self.path, &self.state.stroke)
    }

    fn create_alpha_surface(&mut self, width: u32, height: u32) -> Result<SurfaceId, StampError> {
        if let Some(left) = self.allocations_left.as_mut() {
            if *left == 0 {
                return Err(StampError::SurfaceAllocation { width, height });
            }
            *left -= 1;
        }
        let id = SurfaceId(
            u32::try_from(self.surfaces.len()).expect("RefBackend: too many surfaces for u32 SurfaceId"),
        );
        self.surfaces.push(Some((width, height)));
        self.events.push(Event::CreateSurface { id, width, height });
        Ok(id)
    }

    fn destroy_surface(&mut self, id: SurfaceId) {
        if self.patterns.iter().flatten().any(|&s| s == id) {
            panic!("RefBackend: surface {id:?} destroyed while a pattern still samples it");
        }
        match self.surfaces.get_mut(id.0 as usize) {
            Some(slot @ Some(_)) => {
                *slot = None;
                self.events.push(Event::DestroySurface(id));
            }
            _ => self.double_destroys += 1,
        }
    }

    fn create_pattern(&mut self, surface: SurfaceId, quality: ImageQuality) -> PatternId {
        assert!(
            matches!(self.surfaces.get(surface.0 as usize), Some(Some(_))),
            "RefBackend: pattern created for dead surface {surface:?}"
        );
        let id = PatternId(
            u32::try_from(self.patterns.len()).expect("RefBackend: too many patterns for u32 PatternId"),
        );
        self.patterns.push(Some(surface));
        self.events.push(Event::CreatePattern {
            id,
            surface,
            quality,
        });
        id
    }

    fn destroy_pattern(&mut self, id: PatternId) {
        match self.patterns.get_mut(id.0 as usize) {
            Some(slot @ Some(_)) => {
                *slot = None;
                self.events.push(Event::DestroyPattern(id));
            }
            _ => self.double_destroys += 1,
        }
    }

    fn set_target(&mut self, target: DrawTarget) {
        self.state.target = target;
        self.events.push(Event::SetTarget(target));
    }

    fn mask(&mut self, pattern: PatternId, pattern_matrix: Affine) {
        assert_eq!(
            self.state.target,
            DrawTarget::Canvas,
            "RefBackend: mask issued while drawing offscreen"
        );
        let surface = self
            .patterns
            .get(pattern.0 as usize)
            .copied()
            .flatten()
            .unwrap_or_else(|| panic!("RefBackend: mask with dead pattern {pattern:?}"));
        self.events.push(Event::Mask {
            pattern,
            surface,
            matrix: pattern_matrix,
            color: self.state.color,
        });
    }
}
