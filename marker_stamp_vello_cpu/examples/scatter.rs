// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scatter plot rendered through the stamp cache.
//!
//! Draws 50 000 filled and stroked circle markers with `vello_cpu` and writes
//! `scatter.png` to the current directory.
//!
//! `cargo run -p marker_stamp_vello_cpu --example scatter`
//!
//! Set `RUST_LOG=marker_stamp=debug` to see cache decisions.

use std::fs::File;
use std::io::BufWriter;

use kurbo::{Affine, Point};
use marker_stamp::{MarkerBatch, PathData, StampConfig, StrokeStyle, draw_markers};
use marker_stamp_vello_cpu::VelloCpuStampBackend;
use peniko::Color;
use png::{BitDepth, ColorType, Encoder};
use tracing_subscriber::EnvFilter;

const WIDTH: u16 = 800;
const HEIGHT: u16 = 600;

/// Unit circle as four cubic arcs, in the code-tagged vertex layout.
fn circle_marker() -> PathData {
    const K: f64 = 0.552_284_749_831;
    let vertices = [
        [1.0, 0.0],
        [1.0, K],
        [K, 1.0],
        [0.0, 1.0],
        [-K, 1.0],
        [-1.0, K],
        [-1.0, 0.0],
        [-1.0, -K],
        [-K, -1.0],
        [0.0, -1.0],
        [K, -1.0],
        [1.0, -K],
        [1.0, 0.0],
        [0.0, 0.0],
    ];
    let codes = [1, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 79];
    PathData::from_raw(&vertices, Some(&codes)).expect("circle marker is well formed")
}

/// Deterministic pseudo-random points in the unit square.
fn points(n: usize) -> Vec<Point> {
    let mut state = 0x2545_f491_u64;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        (state >> 11) as f64 / (1_u64 << 53) as f64
    };
    (0..n)
        .map(|_| {
            let x = next();
            let y = (x * 6.0).sin() * 0.3 + 0.5 + (next() - 0.5) * 0.3;
            Point::new(x, y)
        })
        .collect()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let marker = circle_marker();
    let offsets = points(50_000);
    // Data space is the unit square; flip y so larger values go up.
    let offset_transform = Affine::new([
        f64::from(WIDTH) - 40.0,
        0.0,
        0.0,
        -(f64::from(HEIGHT) - 40.0),
        20.0,
        f64::from(HEIGHT) - 20.0,
    ]);

    let mut backend = VelloCpuStampBackend::new(WIDTH, HEIGHT);
    backend.clear(Color::WHITE);
    let stats = draw_markers(
        &mut backend,
        StampConfig::default(),
        &MarkerBatch {
            marker: &marker,
            marker_transform: Affine::scale(2.5),
            offsets: &offsets,
            offset_transform,
            fill: Some(Color::from_rgba8(38, 139, 210, 160)),
            stroke: Some(Color::from_rgba8(7, 54, 66, 200)),
            style: StrokeStyle::new(0.75),
        },
    )?;
    eprintln!("{stats:?}");

    let file = BufWriter::new(File::create("scatter.png")?);
    let mut encoder = Encoder::new(file, u32::from(WIDTH), u32::from(HEIGHT));
    encoder.set_color(ColorType::Rgba);
    encoder.set_depth(BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(&backend.to_rgba8())?;

    eprintln!("Wrote scatter.png");
    Ok(())
}
