// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{
    BatchSize, BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main,
};
use kurbo::{Affine, Point, Rect};
use marker_stamp::{
    MarkerBatch, PathData, QuantizedTransform, StampConfig, StrokeStyle, draw_markers,
};
use marker_stamp_ref::RefBackend;
use marker_stamp_vello_cpu::VelloCpuStampBackend;
use peniko::Color;

#[derive(Clone)]
struct Lcg(u64);

impl Lcg {
    fn new(seed: u64) -> Self {
        Self(seed)
    }

    fn next_f64(&mut self) -> f64 {
        // Numerical Recipes LCG parameters.
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1);
        (self.0 >> 11) as f64 / (1_u64 << 53) as f64
    }
}

fn octagon() -> PathData {
    let vertices: Vec<[f64; 2]> = (0..8)
        .map(|k| {
            let t = f64::from(k) * core::f64::consts::FRAC_PI_4;
            [t.cos(), t.sin()]
        })
        .chain(core::iter::once([0.0, 0.0]))
        .collect();
    let codes = [1, 2, 2, 2, 2, 2, 2, 2, 79];
    PathData::from_raw(&vertices, Some(&codes)).expect("octagon is well formed")
}

fn offsets(n: usize, width: f64, height: f64, seed: u64) -> Vec<Point> {
    let mut rng = Lcg::new(seed);
    (0..n)
        .map(|_| Point::new(rng.next_f64() * width, rng.next_f64() * height))
        .collect()
}

fn batch<'p>(marker: &'p PathData, offsets: &'p [Point]) -> MarkerBatch<'p> {
    MarkerBatch {
        marker,
        marker_transform: Affine::scale(3.0),
        offsets,
        offset_transform: Affine::IDENTITY,
        fill: Some(Color::from_rgb8(38, 139, 210)),
        stroke: Some(Color::BLACK),
        style: StrokeStyle::new(0.5),
    }
}

fn bench_cache_overhead(c: &mut Criterion) {
    let marker = octagon();
    let mut group = c.benchmark_group("marker_stamp/ref");
    for &n in &[1_000_usize, 10_000] {
        let points = offsets(n, 1000.0, 1000.0, 0xDEAD_BEEF);
        group.throughput(Throughput::Elements(n as u64));
        for (name, tolerance) in [("stamped", StampConfig::DEFAULT_TOLERANCE), ("direct", 0.0)] {
            group.bench_function(BenchmarkId::new(name, n), |b| {
                b.iter_batched(
                    || RefBackend::new(1000, 1000),
                    |mut backend| {
                        let stats = draw_markers(
                            &mut backend,
                            StampConfig::new(tolerance),
                            &batch(&marker, &points),
                        )
                        .expect("reference backend never fails to allocate");
                        black_box(stats);
                        black_box(backend);
                    },
                    BatchSize::SmallInput,
                );
            });
        }
    }
    group.finish();
}

fn bench_vello_cpu(c: &mut Criterion) {
    let marker = octagon();
    let mut group = c.benchmark_group("marker_stamp/vello_cpu");
    group.sample_size(10);
    for &n in &[500_usize, 5_000] {
        let points = offsets(n, 500.0, 500.0, 0x5EED);
        group.throughput(Throughput::Elements(n as u64));
        for (name, tolerance) in [("stamped", StampConfig::DEFAULT_TOLERANCE), ("direct", 0.0)] {
            group.bench_function(BenchmarkId::new(name, n), |b| {
                b.iter_batched(
                    || VelloCpuStampBackend::new(500, 500),
                    |mut backend| {
                        let stats = draw_markers(
                            &mut backend,
                            StampConfig::new(tolerance),
                            &batch(&marker, &points),
                        )
                        .expect("stamps fit in u16 surfaces");
                        black_box(stats);
                        black_box(backend);
                    },
                    BatchSize::LargeInput,
                );
            });
        }
    }
    group.finish();
}

fn bench_quantize(c: &mut Criterion) {
    let mut rng = Lcg::new(7);
    let transforms: Vec<Affine> = (0..1024)
        .map(|_| {
            Affine::rotate(rng.next_f64() * 6.0)
                .then_scale(1.0 + rng.next_f64() * 4.0)
                .then_translate((rng.next_f64(), rng.next_f64()).into())
        })
        .collect();
    let extents = Rect::new(-1.0, -1.0, 1.0, 1.0);
    c.bench_function("marker_stamp/quantize/1024", |b| {
        b.iter(|| {
            for &t in &transforms {
                black_box(QuantizedTransform::quantize(
                    black_box(t),
                    extents,
                    1.0 / 9.0,
                    1.0 / 27.0,
                ));
            }
        });
    });
}

criterion_group!(benches, bench_cache_overhead, bench_vello_cpu, bench_quantize);
criterion_main!(benches);
