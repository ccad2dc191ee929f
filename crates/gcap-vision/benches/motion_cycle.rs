//! Motion Estimation Benchmarks
//!
//! # Running Benchmarks
//! ```bash
//! cargo bench --package gcap-vision --bench motion_cycle
//! ```

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::time::Duration;

use gcap_vision::{prepare_gray, MotionConfig, MotionEstimator};
use image::{Rgb, RgbImage};

/// Create a synthetic textured frame for benchmarking.
fn create_test_frame(width: u32, height: u32, shift: f32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let (x, y) = (x as f32 - shift, y as f32);
        let v = 128.0 + 50.0 * (x * 0.09).sin() * (y * 0.07).cos() + 30.0 * ((x + y) * 0.04).sin();
        let v = v.clamp(0.0, 255.0) as u8;
        Rgb([v, v.wrapping_add(10), v])
    })
}

fn bench_preprocess(c: &mut Criterion) {
    let config = MotionConfig::default();
    let frame = create_test_frame(1280, 720, 0.0);
    c.bench_function("prepare_gray_1280x720", |b| {
        b.iter(|| prepare_gray(black_box(&frame), &config))
    });
}

fn bench_motion_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("motion_cycle");
    group.warm_up_time(Duration::from_secs(2));
    group.measurement_time(Duration::from_secs(5));

    let frames: Vec<RgbImage> = (0..3).map(|i| create_test_frame(1280, 720, i as f32 * 2.0)).collect();

    // Every third cycle runs optical flow, so a three-frame round is one full period.
    group.bench_function("three_cycle_round", |b| {
        let mut estimator = MotionEstimator::new(MotionConfig::default()).expect("valid config");
        b.iter(|| {
            for frame in &frames {
                black_box(estimator.process(frame));
            }
        })
    });

    group.finish();
}

criterion_group!(benches, bench_preprocess, bench_motion_cycle);
criterion_main!(benches);
