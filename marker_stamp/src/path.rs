// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Path descriptions consumed by the geometry loader.

use kurbo::Point;

use crate::StampError;

/// Per-vertex segment code.
///
/// The numeric values match the widely used `Path` code convention
/// (`STOP = 0`, `MOVETO = 1`, `LINETO = 2`, `CURVE3 = 3`, `CURVE4 = 4`,
/// `CLOSEPOLY = 79`), so code arrays coming from a host can be validated with
/// [`PathCode::from_u8`].
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PathCode {
    /// Ignored by the loader.
    Stop = 0,
    /// Start a new sub-path at the vertex.
    MoveTo = 1,
    /// Straight segment to the vertex.
    LineTo = 2,
    /// Quadratic segment: this vertex is the control point, the next one the end point.
    Curve3 = 3,
    /// Cubic segment: this vertex and the next are control points, the one after the end point.
    Curve4 = 4,
    /// Close the current sub-path. The vertex itself is ignored.
    ClosePoly = 79,
}

impl PathCode {
    /// Decode a raw code value.
    pub const fn from_u8(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Stop),
            1 => Some(Self::MoveTo),
            2 => Some(Self::LineTo),
            3 => Some(Self::Curve3),
            4 => Some(Self::Curve4),
            79 => Some(Self::ClosePoly),
            _ => None,
        }
    }

    /// Number of vertices that follow this one as part of the same segment.
    pub const fn trailing_vertices(self) -> usize {
        match self {
            Self::Curve3 => 1,
            Self::Curve4 => 2,
            _ => 0,
        }
    }
}

/// An immutable path: vertices plus optional per-vertex codes.
///
/// A path without codes is a polyline through all of its vertices.
///
/// The stamp cache identifies paths by address, not by contents: two
/// `PathData` values with identical vertices are distinct shapes.
#[derive(Clone, Debug, PartialEq)]
pub struct PathData {
    vertices: Vec<Point>,
    codes: Option<Vec<PathCode>>,
}

impl PathData {
    /// Create a path, checking that codes and vertices line up.
    ///
    /// Returns [`StampError::LengthMismatch`] if the code array length differs
    /// from the vertex count, and [`StampError::TruncatedCurve`] if a curve
    /// segment needs more vertices than remain.
    pub fn new(vertices: Vec<Point>, codes: Option<Vec<PathCode>>) -> Result<Self, StampError> {
        if let Some(codes) = &codes {
            validate_codes(vertices.len(), codes)?;
        }
        Ok(Self { vertices, codes })
    }

    /// Create a codeless path (a polyline).
    pub fn polyline(vertices: Vec<Point>) -> Self {
        Self {
            vertices,
            codes: None,
        }
    }

    /// Create a path from raw `(x, y)` pairs and raw code values.
    pub fn from_raw(vertices: &[[f64; 2]], codes: Option<&[u8]>) -> Result<Self, StampError> {
        let vertices: Vec<Point> = vertices.iter().map(|&[x, y]| Point::new(x, y)).collect();
        let codes = match codes {
            Some(raw) => {
                let mut decoded = Vec::with_capacity(raw.len());
                for (index, &code) in raw.iter().enumerate() {
                    let code =
                        PathCode::from_u8(code).ok_or(StampError::UnknownCode { code, index })?;
                    decoded.push(code);
                }
                Some(decoded)
            }
            None => None,
        };
        Self::new(vertices, codes)
    }

    /// Vertices of the path.
    pub fn vertices(&self) -> &[Point] {
        &self.vertices
    }

    /// Per-vertex codes, if any.
    pub fn codes(&self) -> Option<&[PathCode]> {
        self.codes.as_deref()
    }

    /// Number of vertices.
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// Returns `true` if the path has no vertices.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }
}

fn validate_codes(n_vertices: usize, codes: &[PathCode]) -> Result<(), StampError> {
    if codes.len() != n_vertices {
        return Err(StampError::LengthMismatch {
            vertices: n_vertices,
            codes: codes.len(),
        });
    }
    let mut index = 0;
    while index < codes.len() {
        let trailing = codes[index].trailing_vertices();
        let remaining = codes.len() - index - 1;
        if trailing > remaining {
            return Err(StampError::TruncatedCurve {
                index,
                needed: trailing - remaining,
            });
        }
        index += 1 + trailing;
    }
    Ok(())
}
