// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Marker Stamp: a stamp cache for drawing large batches of repeated shapes.
//!
//! Scatter plots, path collections and similar batches draw the same small
//! shape thousands of times, differing only by position. Rasterizing each
//! instance from scratch is wasteful: this crate rasterizes a shape once per
//! sub-pixel phase into an offscreen alpha surface (a *stamp*) and composites
//! that stamp at every position that falls into the same phase.
//!
//! # Core concepts
//!
//! - **Shapes**: [`PathData`] holds vertices and optional per-vertex
//!   [`PathCode`]s. The cache identifies shapes by address, so two equal
//!   paths stored separately are distinct shapes.
//! - **Geometry loading**: [`load_path_exact`] feeds a shape through a
//!   transform into any [`PathSink`], following exact path semantics for
//!   non-finite vertices, quadratic curves and closes.
//! - **Quantization**: [`QuantizedTransform`] snaps transforms to a grid
//!   derived from the shape's extents and the tolerance, so nearly identical
//!   transforms share stamps.
//! - **Placement**: [`Placement`] splits a draw position into an integer
//!   pixel and a sub-pixel bucket; each bucket has its own stamp.
//! - **Backends**: [`StampBackend`] is the immediate-mode surface the cache
//!   draws with: a current path, source colour, stroke style, offscreen
//!   alpha surfaces, patterns, and a `mask` compositing operation.
//! - **The cache**: [`StampCache`] owns every stamp it creates for the
//!   duration of a batch and releases them all when dropped.
//! - **Batches**: [`draw_markers`] and [`draw_path_collection`] are the
//!   entry points hosts usually call.
//!
//! # Accuracy
//!
//! With tolerance `ε`, a composited stamp differs from a direct draw by at
//! most `ε` in position: up to `ε / 3` per coefficient group from
//! quantization, and less than `1 / n_subpix ≤ ε` from sub-pixel bucketing.
//! A tolerance below `1/16` disables stamping; every request is then drawn
//! directly.
//!
//! # Example
//!
//! ```
//! use marker_stamp::{MarkerBatch, PathData, StampConfig, StrokeStyle, draw_markers};
//! use marker_stamp::kurbo::{Affine, Point};
//! use marker_stamp::peniko::color::palette;
//! # use marker_stamp_ref::RefBackend;
//! # let mut backend = RefBackend::new(400, 400);
//!
//! let marker = PathData::from_raw(
//!     &[[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0], [0.0, 0.0]],
//!     Some(&[1, 2, 2, 2, 79]),
//! )?;
//! let offsets: Vec<Point> = (0..1000)
//!     .map(|k| Point::new(f64::from(k % 40) * 9.7, f64::from(k / 40) * 13.3))
//!     .collect();
//! let stats = draw_markers(
//!     &mut backend,
//!     StampConfig::default(),
//!     &MarkerBatch {
//!         marker: &marker,
//!         marker_transform: Affine::scale(3.0),
//!         offsets: &offsets,
//!         offset_transform: Affine::IDENTITY,
//!         fill: Some(palette::css::STEEL_BLUE),
//!         stroke: None,
//!         style: StrokeStyle::default(),
//!     },
//! )?;
//! assert!(stats.stamps_rasterized <= 81);
//! # Ok::<(), marker_stamp::StampError>(())
//! ```
//!
//! # Logging
//!
//! The crate emits [`tracing`] events and never installs a subscriber:
//! `debug` for cache creation, new entries, direct-draw decisions and
//! teardown, `trace` for every rasterized stamp, and `warn` when a surface
//! cannot be allocated.

mod backend;
mod batch;
mod cache;
mod config;
mod error;
mod loader;
mod path;
mod place;
mod quantize;
mod raster;
mod style;

pub use backend::{
    DrawTarget, PatternId, STROKE_TOLERANCE, StampBackend, SurfaceId, path_bounds, stroke_bounds,
};
pub use batch::{DashPattern, MarkerBatch, PathCollection, draw_markers, draw_path_collection};
pub use cache::{CacheStats, StampCache};
pub use config::{MIN_STAMP_TOLERANCE, StampConfig, TranslationQuantization};
pub use error::StampError;
pub use loader::{COORD_LIMIT, PathSink, load_path_exact, load_polyline_range};
pub use path::{PathCode, PathData};
pub use place::Placement;
pub use quantize::QuantizedTransform;
pub use raster::Stamp;
pub use style::{DrawKind, StrokeStyle};

pub use kurbo;
pub use peniko;
