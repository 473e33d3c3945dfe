//! Benchmarks for the compile pipeline
//!
//! Measures symbol detection with and without parallel classification, and the
//! full image-to-Python compile, on drawings of increasing resolution.

#[path = "../tests/common/mod.rs"]
mod common;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use grimoire::{GrimoireConfig, compile_image};
use image::DynamicImage;

/// Drawing resolutions, in pixels per side
const SIZES: &[u32] = &[400, 800, 1600];

fn drawing(size: u32) -> DynamicImage {
    DynamicImage::ImageLuma8(common::hello_world(size).image().clone())
}

/// Benchmark detection, parallel against sequential classification
fn bench_detection(c: &mut Criterion) {
    let mut group = c.benchmark_group("detection");

    for &size in SIZES {
        let image = drawing(size);
        group.throughput(Throughput::Elements((size * size) as u64));

        for parallel in [true, false] {
            let mut config = GrimoireConfig::default();
            config.detector.parallel = parallel;
            let detector = config.detector();
            let label = if parallel { "parallel" } else { "sequential" };

            group.bench_with_input(BenchmarkId::new(label, size), &image, |b, image| {
                b.iter(|| black_box(detector.detect(black_box(image))))
            });
        }
    }

    group.finish();
}

/// Benchmark the whole image to source compile
fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");
    let config = GrimoireConfig::default();

    for &size in SIZES {
        let image = drawing(size);
        group.throughput(Throughput::Elements((size * size) as u64));
        group.bench_with_input(BenchmarkId::new("hello_world", size), &image, |b, image| {
            b.iter(|| black_box(compile_image(black_box(image), &config)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_detection, bench_compile);
criterion_main!(benches);
