// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Geometry loader: turns [`PathData`] into path primitives on a [`PathSink`].
//!
//! The loader applies a transform to every vertex and then follows the
//! exact path semantics hosts rely on:
//!
//! - A non-finite `MoveTo` or `LineTo` vertex starts a new sub-path without a
//!   current point; a following `LineTo` then acts as a move.
//! - A quadratic segment is degree-elevated to a cubic.
//! - A curve whose end point is finite but whose control points are not (or
//!   that has no current point) moves to the end point instead. A cubic's
//!   second control point is clamped first, so only NaN counts there.
//! - A curve whose end point is not finite starts a new sub-path.
//! - Finite coordinates are clamped to `±2^22`.
//!
//! Codeless paths are polylines and are clipped against the `±2^22` box
//! instead of clamped, so long segments keep their direction.
//!
//! The loader tracks the current point itself, so sinks only ever see a
//! well-formed stream: every segment follows a move, and a segment after a
//! close is preceded by a move back to the start of the closed sub-path.

use kurbo::{Affine, BezPath, Point};

use crate::StampError;
use crate::path::{PathCode, PathData};

/// Coordinates are kept within `±COORD_LIMIT` after transformation.
pub const COORD_LIMIT: f64 = 4_194_304.0;

/// Receiver of path primitives, in device space.
pub trait PathSink {
    /// Begin a new sub-path at `p`.
    fn move_to(&mut self, p: Point);
    /// Straight segment from the current point to `p`.
    fn line_to(&mut self, p: Point);
    /// Cubic segment from the current point to `p`.
    fn curve_to(&mut self, c1: Point, c2: Point, p: Point);
    /// Close the current sub-path.
    fn close_path(&mut self);
}

impl PathSink for BezPath {
    fn move_to(&mut self, p: Point) {
        Self::move_to(self, p);
    }

    fn line_to(&mut self, p: Point) {
        Self::line_to(self, p);
    }

    fn curve_to(&mut self, c1: Point, c2: Point, p: Point) {
        Self::curve_to(self, c1, c2, p);
    }

    fn close_path(&mut self) {
        Self::close_path(self);
    }
}

/// Load a whole path, with or without codes, through `transform`.
pub fn load_path_exact<S: PathSink + ?Sized>(sink: &mut S, path: &PathData, transform: Affine) {
    match path.codes() {
        Some(codes) => load_coded(sink, path.vertices(), codes, transform),
        None => clip_polyline(sink, path.vertices(), transform),
    }
}

/// Load vertices `start..stop` of a codeless path as a polyline.
///
/// Hosts use this to draw very long polylines in chunks. Returns
/// [`StampError::InvalidRange`] unless `start <= stop <= vertices.len()`.
pub fn load_polyline_range<S: PathSink + ?Sized>(
    sink: &mut S,
    vertices: &[Point],
    start: usize,
    stop: usize,
    transform: Affine,
) -> Result<(), StampError> {
    if start > stop || stop > vertices.len() {
        return Err(StampError::InvalidRange {
            start,
            stop,
            len: vertices.len(),
        });
    }
    clip_polyline(sink, &vertices[start..stop], transform);
    Ok(())
}

fn is_finite(p: Point) -> bool {
    p.x.is_finite() && p.y.is_finite()
}

fn clamp(p: Point) -> Point {
    Point::new(
        p.x.clamp(-COORD_LIMIT, COORD_LIMIT),
        p.y.clamp(-COORD_LIMIT, COORD_LIMIT),
    )
}

/// Sink wrapper that tracks the current point and sub-path start.
struct Cursor<'s, S: ?Sized> {
    sink: &'s mut S,
    current: Option<Point>,
    start: Point,
    reopen: bool,
}

impl<'s, S: PathSink + ?Sized> Cursor<'s, S> {
    fn new(sink: &'s mut S) -> Self {
        Self {
            sink,
            current: None,
            start: Point::ZERO,
            reopen: false,
        }
    }

    fn move_to(&mut self, p: Point) {
        self.sink.move_to(p);
        self.current = Some(p);
        self.start = p;
        self.reopen = false;
    }

    fn new_sub_path(&mut self) {
        self.current = None;
        self.reopen = false;
    }

    fn ensure_open(&mut self) {
        if self.reopen {
            self.sink.move_to(self.start);
            self.reopen = false;
        }
    }

    fn line_to(&mut self, p: Point) {
        if self.current.is_none() {
            self.move_to(p);
            return;
        }
        self.ensure_open();
        self.sink.line_to(p);
        self.current = Some(p);
    }

    fn curve_to(&mut self, c1: Point, c2: Point, p: Point) {
        if self.current.is_none() {
            self.move_to(c1);
        }
        self.ensure_open();
        self.sink.curve_to(c1, c2, p);
        self.current = Some(p);
    }

    fn close_path(&mut self) {
        if self.current.is_some() && !self.reopen {
            self.sink.close_path();
            self.current = Some(self.start);
            self.reopen = true;
        }
    }
}

fn load_coded<S: PathSink + ?Sized>(
    sink: &mut S,
    vertices: &[Point],
    codes: &[PathCode],
    transform: Affine,
) {
    let mut cursor = Cursor::new(sink);
    let mut i = 0;
    while i < codes.len() {
        let raw = transform * vertices[i];
        let finite = is_finite(raw);
        let p0 = clamp(raw);
        match codes[i] {
            PathCode::Stop => {}
            PathCode::MoveTo => {
                if finite {
                    cursor.move_to(p0);
                } else {
                    cursor.new_sub_path();
                }
            }
            PathCode::LineTo => {
                if finite {
                    cursor.line_to(p0);
                } else {
                    cursor.new_sub_path();
                }
            }
            PathCode::Curve3 => {
                let end = transform * vertices[i + 1];
                i += 1;
                if is_finite(end) {
                    let end = clamp(end);
                    match cursor.current {
                        Some(prev) if finite => {
                            let c1 = prev.lerp(p0, 2.0 / 3.0);
                            let c2 = end.lerp(p0, 2.0 / 3.0);
                            cursor.curve_to(c1, c2, end);
                        }
                        _ => cursor.move_to(end),
                    }
                } else {
                    cursor.new_sub_path();
                }
            }
            PathCode::Curve4 => {
                let c2 = transform * vertices[i + 1];
                let end = transform * vertices[i + 2];
                i += 2;
                if is_finite(end) {
                    let end = clamp(end);
                    // Clamping pins an infinite second control to the box; only NaN is rejected.
                    let c2 = clamp(c2);
                    if finite && is_finite(c2) && cursor.current.is_some() {
                        cursor.curve_to(p0, c2, end);
                    } else {
                        cursor.move_to(end);
                    }
                } else {
                    cursor.new_sub_path();
                }
            }
            PathCode::ClosePoly => cursor.close_path(),
        }
        i += 1;
    }
}

const LEFT: u8 = 1 << 0;
const RIGHT: u8 = 1 << 1;
const BOTTOM: u8 = 1 << 2;
const TOP: u8 = 1 << 3;

fn outcode(p: Point) -> u8 {
    let mut code = 0;
    if p.x < -COORD_LIMIT {
        code |= LEFT;
    } else if p.x > COORD_LIMIT {
        code |= RIGHT;
    }
    if p.y < -COORD_LIMIT {
        code |= BOTTOM;
    } else if p.y > COORD_LIMIT {
        code |= TOP;
    }
    code
}

/// Point where the segment `a -> b` crosses the box edge named by `code`.
fn edge_crossing(a: Point, b: Point, code: u8) -> Point {
    if code & TOP != 0 {
        Point::new(a.x + (b.x - a.x) * (COORD_LIMIT - a.y) / (b.y - a.y), COORD_LIMIT)
    } else if code & BOTTOM != 0 {
        Point::new(a.x + (b.x - a.x) * (-COORD_LIMIT - a.y) / (b.y - a.y), -COORD_LIMIT)
    } else if code & RIGHT != 0 {
        Point::new(COORD_LIMIT, a.y + (b.y - a.y) * (COORD_LIMIT - a.x) / (b.x - a.x))
    } else {
        Point::new(-COORD_LIMIT, a.y + (b.y - a.y) * (-COORD_LIMIT - a.x) / (b.x - a.x))
    }
}

/// Cohen–Sutherland clip of one segment. Returns the clipped segment, if any.
fn clip_segment(mut a: Point, mut b: Point) -> Option<(Point, Point)> {
    let mut code_a = outcode(a);
    let mut code_b = outcode(b);
    loop {
        if code_a | code_b == 0 {
            return Some((a, b));
        }
        if code_a & code_b != 0 {
            return None;
        }
        if code_a != 0 {
            a = edge_crossing(a, b, code_a);
            code_a = outcode(a);
        } else {
            b = edge_crossing(a, b, code_b);
            code_b = outcode(b);
        }
    }
}

fn clip_polyline<S: PathSink + ?Sized>(sink: &mut S, vertices: &[Point], transform: Affine) {
    let mut cursor = Cursor::new(sink);
    // Last transformed point, before clipping.
    let mut prev: Option<Point> = None;
    for &v in vertices {
        let p = transform * v;
        if !is_finite(p) {
            prev = None;
            cursor.new_sub_path();
            continue;
        }
        match prev {
            None => cursor.move_to(clamp(p)),
            Some(a) => match clip_segment(a, p) {
                Some((ca, cb)) => {
                    if cursor.current != Some(ca) {
                        cursor.move_to(ca);
                    }
                    cursor.line_to(cb);
                }
                None => cursor.move_to(clamp(p)),
            },
        }
        prev = Some(p);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::PathEl;

    #[derive(Debug, PartialEq)]
    enum Prim {
        Move(Point),
        Line(Point),
        Curve(Point, Point, Point),
        Close,
    }

    #[derive(Default)]
    struct Log(Vec<Prim>);

    impl PathSink for Log {
        fn move_to(&mut self, p: Point) {
            self.0.push(Prim::Move(p));
        }
        fn line_to(&mut self, p: Point) {
            self.0.push(Prim::Line(p));
        }
        fn curve_to(&mut self, c1: Point, c2: Point, p: Point) {
            self.0.push(Prim::Curve(c1, c2, p));
        }
        fn close_path(&mut self) {
            self.0.push(Prim::Close);
        }
    }

    fn load(vertices: &[[f64; 2]], codes: Option<&[u8]>) -> Vec<Prim> {
        let path = PathData::from_raw(vertices, codes).unwrap();
        let mut log = Log::default();
        load_path_exact(&mut log, &path, Affine::IDENTITY);
        log.0
    }

    fn pt(x: f64, y: f64) -> Point {
        Point::new(x, y)
    }

    #[test]
    fn square_with_close() {
        let prims = load(
            &[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]],
            Some(&[1, 2, 2, 79]),
        );
        assert_eq!(
            prims,
            vec![
                Prim::Move(pt(0.0, 0.0)),
                Prim::Line(pt(1.0, 0.0)),
                Prim::Line(pt(1.0, 1.0)),
                Prim::Close,
            ]
        );
    }

    #[test]
    fn quadratic_is_degree_elevated() {
        let prims = load(&[[0.0, 0.0], [3.0, 3.0], [6.0, 0.0]], Some(&[1, 3, 3]));
        assert_eq!(
            prims,
            vec![
                Prim::Move(pt(0.0, 0.0)),
                Prim::Curve(pt(2.0, 2.0), pt(4.0, 2.0), pt(6.0, 0.0)),
            ]
        );
    }

    #[test]
    fn non_finite_lineto_starts_new_sub_path() {
        let prims = load(
            &[[0.0, 0.0], [f64::NAN, 0.0], [2.0, 2.0], [3.0, 2.0]],
            Some(&[1, 2, 2, 2]),
        );
        assert_eq!(
            prims,
            vec![
                Prim::Move(pt(0.0, 0.0)),
                Prim::Move(pt(2.0, 2.0)),
                Prim::Line(pt(3.0, 2.0)),
            ]
        );
    }

    #[test]
    fn cubic_with_non_finite_control_moves_to_end() {
        let prims = load(
            &[[0.0, 0.0], [f64::INFINITY, 1.0], [2.0, 1.0], [3.0, 0.0]],
            Some(&[1, 4, 4, 4]),
        );
        assert_eq!(prims, vec![Prim::Move(pt(0.0, 0.0)), Prim::Move(pt(3.0, 0.0))]);
    }

    #[test]
    fn cubic_with_infinite_second_control_is_clamped() {
        let prims = load(
            &[[0.0, 0.0], [1.0, 1.0], [f64::INFINITY, 1.0], [3.0, 0.0]],
            Some(&[1, 4, 4, 4]),
        );
        assert_eq!(
            prims,
            vec![
                Prim::Move(pt(0.0, 0.0)),
                Prim::Curve(pt(1.0, 1.0), pt(COORD_LIMIT, 1.0), pt(3.0, 0.0)),
            ]
        );

        let prims = load(
            &[[0.0, 0.0], [1.0, 1.0], [f64::NAN, 1.0], [3.0, 0.0]],
            Some(&[1, 4, 4, 4]),
        );
        assert_eq!(prims, vec![Prim::Move(pt(0.0, 0.0)), Prim::Move(pt(3.0, 0.0))]);
    }

    #[test]
    fn cubic_with_non_finite_end_starts_new_sub_path() {
        let prims = load(
            &[[0.0, 0.0], [1.0, 1.0], [2.0, 1.0], [f64::NAN, 0.0], [5.0, 5.0]],
            Some(&[1, 4, 4, 4, 2]),
        );
        assert_eq!(prims, vec![Prim::Move(pt(0.0, 0.0)), Prim::Move(pt(5.0, 5.0))]);
    }

    #[test]
    fn segment_after_close_reopens_at_start() {
        let prims = load(
            &[[1.0, 1.0], [2.0, 1.0], [0.0, 0.0], [1.0, 3.0]],
            Some(&[1, 2, 79, 2]),
        );
        assert_eq!(
            prims,
            vec![
                Prim::Move(pt(1.0, 1.0)),
                Prim::Line(pt(2.0, 1.0)),
                Prim::Close,
                Prim::Move(pt(1.0, 1.0)),
                Prim::Line(pt(1.0, 3.0)),
            ]
        );
    }

    #[test]
    fn finite_coordinates_are_clamped() {
        let prims = load(&[[0.0, 0.0], [1.0e9, -1.0e9]], Some(&[1, 2]));
        assert_eq!(
            prims,
            vec![Prim::Move(pt(0.0, 0.0)), Prim::Line(pt(COORD_LIMIT, -COORD_LIMIT))]
        );
    }

    #[test]
    fn transform_is_applied() {
        let path = PathData::from_raw(&[[0.0, 0.0], [1.0, 0.0]], Some(&[1, 2])).unwrap();
        let mut log = Log::default();
        load_path_exact(
            &mut log,
            &path,
            Affine::translate((10.0, 5.0)) * Affine::scale(2.0),
        );
        assert_eq!(log.0, vec![Prim::Move(pt(10.0, 5.0)), Prim::Line(pt(12.0, 5.0))]);
    }

    #[test]
    fn polyline_skips_non_finite_vertices() {
        let prims = load(&[[0.0, 0.0], [1.0, 0.0], [f64::NAN, f64::NAN], [2.0, 2.0], [3.0, 2.0]], None);
        assert_eq!(
            prims,
            vec![
                Prim::Move(pt(0.0, 0.0)),
                Prim::Line(pt(1.0, 0.0)),
                Prim::Move(pt(2.0, 2.0)),
                Prim::Line(pt(3.0, 2.0)),
            ]
        );
    }

    #[test]
    fn polyline_segments_are_clipped_to_the_box() {
        let far = 2.0 * COORD_LIMIT;
        let prims = load(&[[0.0, 0.0], [far, 0.0]], None);
        assert_eq!(
            prims,
            vec![Prim::Move(pt(0.0, 0.0)), Prim::Line(pt(COORD_LIMIT, 0.0))]
        );

        let prims = load(&[[-far, 0.0], [0.0, 0.0]], None);
        assert_eq!(
            prims,
            vec![
                Prim::Move(pt(-COORD_LIMIT, 0.0)),
                Prim::Line(pt(0.0, 0.0)),
            ]
        );
    }

    #[test]
    fn polyline_range_is_validated() {
        let vertices = [pt(0.0, 0.0), pt(1.0, 0.0), pt(2.0, 0.0)];
        let mut log = Log::default();
        assert_eq!(
            load_polyline_range(&mut log, &vertices, 2, 1, Affine::IDENTITY),
            Err(StampError::InvalidRange {
                start: 2,
                stop: 1,
                len: 3
            })
        );
        assert!(load_polyline_range(&mut log, &vertices, 0, 4, Affine::IDENTITY).is_err());
        assert!(log.0.is_empty());

        load_polyline_range(&mut log, &vertices, 1, 3, Affine::IDENTITY).unwrap();
        assert_eq!(log.0, vec![Prim::Move(pt(1.0, 0.0)), Prim::Line(pt(2.0, 0.0))]);
    }

    #[test]
    fn bez_path_sink_records_elements() {
        let path = PathData::from_raw(
            &[[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 0.0]],
            Some(&[1, 2, 2, 79]),
        )
        .unwrap();
        let mut bez = BezPath::new();
        load_path_exact(&mut bez, &path, Affine::IDENTITY);
        assert_eq!(
            bez.elements(),
            &[
                PathEl::MoveTo(pt(0.0, 0.0)),
                PathEl::LineTo(pt(4.0, 0.0)),
                PathEl::LineTo(pt(4.0, 4.0)),
                PathEl::ClosePath,
            ]
        );
    }
}
