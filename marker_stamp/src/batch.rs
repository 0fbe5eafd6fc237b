// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Batch entry points: markers and path collections.
//!
//! Both entry points create a [`StampCache`] for the duration of the batch,
//! so every stamp is released before they return, including on error.

use kurbo::{Affine, Dashes, Point};
use peniko::Color;
use tracing::debug;

use crate::StampError;
use crate::backend::StampBackend;
use crate::cache::{CacheStats, StampCache};
use crate::config::StampConfig;
use crate::path::PathData;
use crate::style::{DrawKind, StrokeStyle};

/// One marker shape drawn at many offsets.
#[derive(Clone, Debug)]
pub struct MarkerBatch<'p> {
    /// The marker shape, in marker space.
    pub marker: &'p PathData,
    /// Maps marker space to device space, around the marker position.
    pub marker_transform: Affine,
    /// Marker positions, in data space.
    pub offsets: &'p [Point],
    /// Maps offsets to device space.
    pub offset_transform: Affine,
    /// Fill colour, if the marker is filled.
    pub fill: Option<Color>,
    /// Edge colour, if the marker is stroked.
    pub stroke: Option<Color>,
    /// Stroke parameters for the edge.
    pub style: StrokeStyle,
}

/// Dash pattern for one item of a [`PathCollection`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DashPattern {
    /// Offset into the pattern at the start of each sub-path.
    pub offset: f64,
    /// Alternating on and off lengths; empty means solid.
    pub dashes: Dashes,
}

/// A heterogeneous collection of paths with per-item properties.
///
/// Item `i` of `max(paths, transforms, offsets)` uses element `i % len` of
/// every non-empty property list.
#[derive(Clone, Debug)]
pub struct PathCollection<'p> {
    /// Shapes, cycled over items.
    pub paths: &'p [PathData],
    /// Per-item transforms, applied before `master_transform`.
    ///
    /// Empty means `master_transform` alone.
    pub transforms: &'p [Affine],
    /// Transform shared by all items.
    pub master_transform: Affine,
    /// Item positions, mapped by `offset_transform`.
    pub offsets: &'p [Point],
    /// Maps offsets to device space.
    pub offset_transform: Affine,
    /// Fill colours; empty means no fill.
    pub fill_colors: &'p [Color],
    /// Edge colours; empty means no stroke.
    pub edge_colors: &'p [Color],
    /// Stroke widths; empty means the width of `base_style`.
    pub line_widths: &'p [f64],
    /// Dash patterns; empty means solid lines.
    pub dashes: &'p [DashPattern],
    /// Caps, join and miter limit for every stroke.
    pub base_style: StrokeStyle,
}

/// Draw a marker at every offset.
///
/// Stamps are only used when the batch has more markers than there are
/// sub-pixel buckets; smaller batches are drawn directly. Each marker is
/// filled, then stroked. The backend's source colour is restored afterwards.
pub fn draw_markers<B: StampBackend + ?Sized>(
    backend: &mut B,
    config: StampConfig,
    batch: &MarkerBatch<'_>,
) -> Result<CacheStats, StampError> {
    config.validate()?;
    let n = config.subpixel_count();
    let stamped = n > 0 && n * n < batch.offsets.len();
    let config = if stamped {
        config
    } else {
        StampConfig {
            tolerance: 0.0,
            ..config
        }
    };
    debug!(markers = batch.offsets.len(), stamped, "drawing marker batch");

    let saved = backend.source_color();
    let mut cache = StampCache::new(backend, config)?;
    let result = marker_loop(&mut cache, batch);
    cache.backend_mut().set_source_color(saved);
    let stats = cache.finish();
    result.map(|()| stats)
}

fn marker_loop<'a, B: StampBackend + ?Sized>(
    cache: &mut StampCache<'a, B>,
    batch: &MarkerBatch<'a>,
) -> Result<(), StampError> {
    for &offset in batch.offsets {
        let position = batch.offset_transform * offset;
        if let Some(color) = batch.fill {
            cache.backend_mut().set_source_color(color);
            cache.stamp_and_draw(
                batch.marker,
                batch.marker_transform,
                DrawKind::Fill,
                &batch.style,
                position,
            )?;
        }
        if let Some(color) = batch.stroke {
            cache.backend_mut().set_source_color(color);
            cache.stamp_and_draw(
                batch.marker,
                batch.marker_transform,
                DrawKind::Stroke,
                &batch.style,
                position,
            )?;
        }
    }
    Ok(())
}

/// Draw every item of a path collection.
///
/// Nothing is drawn when there are no paths or no offsets. Each item is
/// filled, then stroked. The backend's source colour is restored afterwards.
pub fn draw_path_collection<B: StampBackend + ?Sized>(
    backend: &mut B,
    config: StampConfig,
    collection: &PathCollection<'_>,
) -> Result<CacheStats, StampError> {
    config.validate()?;
    if collection.paths.is_empty() || collection.offsets.is_empty() {
        return Ok(CacheStats::default());
    }
    let saved = backend.source_color();
    let mut cache = StampCache::new(backend, config)?;
    let result = collection_loop(&mut cache, collection);
    cache.backend_mut().set_source_color(saved);
    let stats = cache.finish();
    result.map(|()| stats)
}

fn cycle<T>(items: &[T], i: usize) -> Option<&T> {
    if items.is_empty() {
        None
    } else {
        Some(&items[i % items.len()])
    }
}

fn collection_loop<'a, B: StampBackend + ?Sized>(
    cache: &mut StampCache<'a, B>,
    collection: &PathCollection<'a>,
) -> Result<(), StampError> {
    let n = collection
        .paths
        .len()
        .max(collection.transforms.len())
        .max(collection.offsets.len());
    debug!(items = n, "drawing path collection");

    let paths: &'a [PathData] = collection.paths;
    for i in 0..n {
        let path = &paths[i % paths.len()];
        let transform = match cycle(collection.transforms, i) {
            Some(&t) => collection.master_transform * t,
            None => collection.master_transform,
        };
        let offset = collection.offsets[i % collection.offsets.len()];
        let position = collection.offset_transform * offset;

        if let Some(&color) = cycle(collection.fill_colors, i) {
            cache.backend_mut().set_source_color(color);
            cache.stamp_and_draw(
                path,
                transform,
                DrawKind::Fill,
                &collection.base_style,
                position,
            )?;
        }
        if let Some(&color) = cycle(collection.edge_colors, i) {
            let mut style = collection.base_style.clone();
            if let Some(&width) = cycle(collection.line_widths, i) {
                style.width = width;
            }
            match cycle(collection.dashes, i) {
                Some(dash) => {
                    style.dash_offset = dash.offset;
                    style.dash_pattern = dash.dashes.clone();
                }
                None => {
                    style.dash_offset = 0.0;
                    style.dash_pattern.clear();
                }
            }
            cache.backend_mut().set_source_color(color);
            cache.stamp_and_draw(path, transform, DrawKind::Stroke, &style, position)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_wraps_and_handles_empty() {
        let items = [1, 2, 3];
        assert_eq!(cycle(&items, 4), Some(&2));
        assert_eq!(cycle::<i32>(&[], 4), None);
    }
}
