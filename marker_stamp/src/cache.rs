// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The stamp cache store and compositor.

use core::fmt;
use core::hash::{Hash, Hasher};

use hashbrown::HashMap;
use hashbrown::hash_map::Entry;
use kurbo::{Affine, Point, Rect};
use tracing::debug;

use crate::StampError;
use crate::backend::StampBackend;
use crate::config::StampConfig;
use crate::loader::load_path_exact;
use crate::path::PathData;
use crate::place::Placement;
use crate::quantize::QuantizedTransform;
use crate::raster::{Stamp, draw_extents, draw_path, rasterize_stamp};
use crate::style::{DrawKind, StrokeStyle, StyleKey};

/// A borrowed shape, compared and hashed by address.
#[derive(Copy, Clone, Debug)]
struct ShapeKey<'a>(&'a PathData);

impl PartialEq for ShapeKey<'_> {
    fn eq(&self, other: &Self) -> bool {
        core::ptr::eq(self.0, other.0)
    }
}

impl Eq for ShapeKey<'_> {}

impl Hash for ShapeKey<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        core::ptr::hash(self.0, state);
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct CacheKey<'a> {
    shape: ShapeKey<'a>,
    transform: QuantizedTransform,
    kind: DrawKind,
    style: StyleKey,
}

#[derive(Debug)]
enum CacheEntry {
    /// Extents under the quantized transform plus one slot per sub-pixel bucket.
    Stamped {
        extents: Rect,
        stamps: Box<[Option<Stamp>]>,
    },
    /// Larger than the target; every request draws directly.
    Oversized,
}

/// Counters describing what a cache did.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Cache entries created (one per distinct key).
    pub entries: usize,
    /// Shapes whose untransformed bounds were computed.
    pub bbox_entries: usize,
    /// Stamps rasterized into offscreen surfaces.
    pub stamps_rasterized: usize,
    /// Stamps composited onto the canvas.
    pub composites: usize,
    /// Requests drawn directly, without a stamp.
    pub direct_draws: usize,
    /// Requests dropped because their position was not finite.
    pub skipped: usize,
}

/// Cache of pre-rasterized stamps for one batch of draws.
///
/// A cache borrows its backend and every shape it sees for `'a`, so it
/// cannot outlive the batch. Dropping the cache releases every stamp it
/// created, whether the batch finished, returned early with an error, or
/// unwound from a panic.
///
/// ```
/// # use marker_stamp::{DrawKind, PathData, StampCache, StampConfig, StrokeStyle};
/// # use marker_stamp::kurbo::{Affine, Point};
/// # use marker_stamp_ref::RefBackend;
/// # let mut backend = RefBackend::new(100, 100);
/// # let marker = PathData::from_raw(&[[0.0, 0.0], [2.0, 0.0], [1.0, 2.0]], Some(&[1, 2, 2]))?;
/// # let (transform, style) = (Affine::scale(2.0), StrokeStyle::default());
/// # let offsets = [Point::new(10.0, 10.0), Point::new(40.0, 10.0), Point::new(70.5, 20.25)];
/// let mut cache = StampCache::new(&mut backend, StampConfig::default())?;
/// for offset in offsets {
///     cache.stamp_and_draw(&marker, transform, DrawKind::Fill, &style, offset)?;
/// }
/// let stats = cache.finish();
/// assert_eq!(stats.composites, 3);
/// # assert_eq!(backend.live_surfaces(), 0);
/// # Ok::<(), marker_stamp::StampError>(())
/// ```
pub struct StampCache<'a, B: StampBackend + ?Sized> {
    backend: &'a mut B,
    config: StampConfig,
    n_subpix: usize,
    bboxes: HashMap<ShapeKey<'a>, Rect>,
    entries: HashMap<CacheKey<'a>, CacheEntry>,
    stats: CacheStats,
}

impl<B: StampBackend + ?Sized> fmt::Debug for StampCache<'_, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StampCache")
            .field("config", &self.config)
            .field("n_subpix", &self.n_subpix)
            .field("entries", &self.entries.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl<'a, B: StampBackend + ?Sized> StampCache<'a, B> {
    /// Create an empty cache drawing into `backend`.
    ///
    /// Returns [`StampError::InvalidTolerance`] if the configuration is unusable.
    pub fn new(backend: &'a mut B, config: StampConfig) -> Result<Self, StampError> {
        config.validate()?;
        let n_subpix = config.subpixel_count();
        debug!(tolerance = config.tolerance, n_subpix, "stamp cache created");
        Ok(Self {
            backend,
            config,
            n_subpix,
            bboxes: HashMap::new(),
            entries: HashMap::new(),
            stats: CacheStats::default(),
        })
    }

    /// Sub-pixel buckets per axis; 0 means every request draws directly.
    pub fn subpixel_count(&self) -> usize {
        self.n_subpix
    }

    /// The configuration the cache was created with.
    pub fn config(&self) -> &StampConfig {
        &self.config
    }

    /// Counters so far.
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Number of cache entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no entry has been created yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of stamps currently held.
    pub fn stamp_count(&self) -> usize {
        self.entries
            .values()
            .map(|entry| match entry {
                CacheEntry::Stamped { stamps, .. } => stamps.iter().flatten().count(),
                CacheEntry::Oversized => 0,
            })
            .sum()
    }

    /// The backend, for changing the source colour between draws.
    ///
    /// The draw target must be left on the canvas.
    pub fn backend_mut(&mut self) -> &mut B {
        self.backend
    }

    /// Release every stamp and return the final counters.
    pub fn finish(self) -> CacheStats {
        self.stats
    }

    /// Draw `path` under `transform`, translated to `position`, with the
    /// backend's current source colour.
    ///
    /// The request is served from a stamp when possible and drawn directly
    /// otherwise. A non-finite `position` draws nothing.
    ///
    /// On [`StampError::SurfaceAllocation`] the cache stays consistent: the
    /// failed bucket is left empty and may be retried by a later request.
    pub fn stamp_and_draw(
        &mut self,
        path: &'a PathData,
        transform: Affine,
        kind: DrawKind,
        style: &StrokeStyle,
        position: Point,
    ) -> Result<(), StampError> {
        if !(position.x.is_finite() && position.y.is_finite()) {
            self.stats.skipped += 1;
            return Ok(());
        }
        let n = self.n_subpix;
        if n == 0 || !transform.is_finite() {
            self.draw_direct(path, transform, kind, style, position);
            return Ok(());
        }

        let bbox = self.shape_bounds(path);
        let tolerance = self.config.tolerance;
        if self.config.direct_draw_tiny_shapes {
            let x_max = bbox.x0.abs().max(bbox.x1.abs());
            let y_max = bbox.y0.abs().max(bbox.y1.abs());
            if x_max < tolerance || y_max < tolerance {
                debug!(x_max, y_max, "shape within tolerance of the origin, drawing directly");
                self.draw_direct(path, transform, kind, style, position);
                return Ok(());
            }
        }

        let quantized = QuantizedTransform::quantize(
            transform,
            bbox,
            tolerance,
            self.config.translation_step(),
        );
        let key = CacheKey {
            shape: ShapeKey(path),
            transform: quantized,
            kind,
            style: StyleKey::new(kind, style),
        };

        let entry = match self.entries.entry(key) {
            Entry::Occupied(occupied) => occupied.into_mut(),
            Entry::Vacant(vacant) => {
                let extents = draw_extents(self.backend, path, quantized.affine(), kind, style);
                let (target_w, target_h) = self.backend.target_size();
                let oversized = extents.width() > f64::from(target_w)
                    || extents.height() > f64::from(target_h);
                self.stats.entries += 1;
                let entry = if self.config.direct_draw_oversized && oversized {
                    debug!(?extents, "stamp larger than target, drawing directly");
                    CacheEntry::Oversized
                } else {
                    debug!(?extents, ?kind, "new stamp entry");
                    CacheEntry::Stamped {
                        extents,
                        stamps: (0..n * n).map(|_| None).collect(),
                    }
                };
                vacant.insert(entry)
            }
        };

        let (extents, stamps) = match entry {
            CacheEntry::Stamped { extents, stamps } => (*extents, stamps),
            CacheEntry::Oversized => {
                self.draw_direct(path, transform, kind, style, position);
                return Ok(());
            }
        };

        let Some(placement) = Placement::new(position, extents.origin(), n) else {
            self.stats.skipped += 1;
            return Ok(());
        };
        let slot = &mut stamps[placement.index(n)];
        let pattern = match slot {
            Some(stamp) => stamp.pattern(),
            None => {
                let stamp = rasterize_stamp(
                    self.backend,
                    path,
                    quantized.affine(),
                    kind,
                    style,
                    extents,
                    (placement.i, placement.j),
                    n,
                )?;
                self.stats.stamps_rasterized += 1;
                slot.insert(stamp).pattern()
            }
        };
        self.backend.mask(pattern, placement.pattern_matrix());
        self.stats.composites += 1;
        Ok(())
    }

    /// Untransformed bounds of `path`, computed once per shape.
    fn shape_bounds(&mut self, path: &'a PathData) -> Rect {
        let backend = &mut *self.backend;
        let stats = &mut self.stats;
        *self.bboxes.entry(ShapeKey(path)).or_insert_with(|| {
            backend.new_path();
            load_path_exact(backend, path, Affine::IDENTITY);
            let bbox = backend.path_extents();
            backend.new_path();
            stats.bbox_entries += 1;
            bbox
        })
    }

    fn draw_direct(
        &mut self,
        path: &PathData,
        transform: Affine,
        kind: DrawKind,
        style: &StrokeStyle,
        position: Point,
    ) {
        draw_path(
            self.backend,
            path,
            transform.then_translate(position.to_vec2()),
            kind,
            style,
        );
        self.stats.direct_draws += 1;
    }
}

impl<B: StampBackend + ?Sized> Drop for StampCache<'_, B> {
    fn drop(&mut self) {
        let entries = self.entries.len();
        let mut released = 0_usize;
        for (_, entry) in self.entries.drain() {
            if let CacheEntry::Stamped { stamps, .. } = entry {
                for stamp in stamps.into_vec().into_iter().flatten() {
                    stamp.release(self.backend);
                    released += 1;
                }
            }
        }
        debug!(entries, released, "stamp cache released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hashbrown::HashSet;

    fn square() -> PathData {
        PathData::from_raw(
            &[[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0], [0.0, 0.0]],
            Some(&[1, 2, 2, 2, 79]),
        )
        .unwrap()
    }

    fn key<'a>(path: &'a PathData, kind: DrawKind, style: &StrokeStyle) -> CacheKey<'a> {
        CacheKey {
            shape: ShapeKey(path),
            transform: QuantizedTransform::quantize(
                Affine::scale(3.0),
                Rect::new(-1.0, -1.0, 1.0, 1.0),
                0.3,
                0.1,
            ),
            kind,
            style: StyleKey::new(kind, style),
        }
    }

    #[test]
    fn shapes_are_keyed_by_identity() {
        let a = square();
        let b = square();
        assert_eq!(a, b);
        let style = StrokeStyle::default();
        let mut keys = HashSet::new();
        keys.insert(key(&a, DrawKind::Fill, &style));
        keys.insert(key(&a, DrawKind::Fill, &style));
        keys.insert(key(&b, DrawKind::Fill, &style));
        assert_eq!(keys.len(), 2);
    }

    #[test]
    fn fill_and_stroke_keys_differ() {
        let a = square();
        let style = StrokeStyle::default();
        assert_ne!(
            key(&a, DrawKind::Fill, &style),
            key(&a, DrawKind::Stroke, &style)
        );
    }
}
