// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Draw kinds and the stroke-style part of cache keys.

use kurbo::{Cap, Join};
use smallvec::SmallVec;

/// Stroke parameters used when stroking shapes.
///
/// Width, dash pattern, dash offset, caps, join and miter limit all take part
/// in cache keys for [`DrawKind::Stroke`].
pub type StrokeStyle = kurbo::Stroke;

/// Whether a shape is filled or stroked.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DrawKind {
    /// Fill the interior with the nonzero winding rule.
    Fill,
    /// Stroke the outline with the current [`StrokeStyle`].
    Stroke,
}

fn cap_code(cap: Cap) -> u8 {
    match cap {
        Cap::Butt => 0,
        Cap::Square => 1,
        Cap::Round => 2,
    }
}

fn join_code(join: Join) -> u8 {
    match join {
        Join::Bevel => 0,
        Join::Miter => 1,
        Join::Round => 2,
    }
}

/// Hashable snapshot of the stroke state relevant to a draw.
///
/// Fills ignore stroke state entirely, so every fill shares
/// [`StyleKey::fill`] regardless of the current stroke settings.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct StyleKey {
    width: u64,
    miter_limit: u64,
    dash_offset: u64,
    dashes: SmallVec<[u64; 4]>,
    caps: Option<(u8, u8)>,
    join: Option<u8>,
}

impl StyleKey {
    pub(crate) fn fill() -> Self {
        Self {
            width: 0,
            miter_limit: 0,
            dash_offset: 0,
            dashes: SmallVec::new(),
            caps: None,
            join: None,
        }
    }

    pub(crate) fn new(kind: DrawKind, style: &StrokeStyle) -> Self {
        match kind {
            DrawKind::Fill => Self::fill(),
            DrawKind::Stroke => Self {
                width: bits(style.width),
                miter_limit: bits(style.miter_limit),
                dash_offset: bits(style.dash_offset),
                dashes: style.dash_pattern.iter().copied().map(bits).collect(),
                caps: Some((cap_code(style.start_cap), cap_code(style.end_cap))),
                join: Some(join_code(style.join)),
            },
        }
    }
}

fn bits(v: f64) -> u64 {
    (v + 0.0).to_bits()
}
