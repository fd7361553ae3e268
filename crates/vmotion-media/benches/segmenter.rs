//! Background Segmenter Benchmarks
//!
//! Measures the per-frame cost of the MOG2 model and the full analysis loop.
//!
//! # Running Benchmarks
//! ```bash
//! cargo bench --package vmotion-media --bench segmenter
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use image::{Rgb, RgbImage};
use std::time::Duration;

use vmotion_media::{
    AnalysisConfig, BackgroundSubtractor, MemoryFrameSource, Mog2Segmenter, MotionAnalyzer,
};

/// Create a synthetic frame with a textured background and a block at `offset`.
fn create_test_frame(width: u32, height: u32, offset: u32) -> RgbImage {
    let mut frame = RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            ((x * 7 + y * 11) % 256) as u8,
            ((x * 13 + y * 17) % 256) as u8,
            ((x * 19 + y * 23) % 256) as u8,
        ])
    });

    let block = (width / 10).max(1);
    for y in 0..block.min(height) {
        for x in offset..(offset + block).min(width) {
            frame.put_pixel(x, y, Rgb([255, 255, 255]));
        }
    }

    frame
}

fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("mog2_classify");
    group.warm_up_time(Duration::from_secs(2));
    group.measurement_time(Duration::from_secs(5));

    let resolutions = [(640, 360), (320, 180), (160, 90)];

    for (width, height) in resolutions {
        let frames: Vec<RgbImage> = (0..8)
            .map(|i| create_test_frame(width, height, i * width / 10))
            .collect();

        group.throughput(Throughput::Elements(u64::from(width * height)));
        group.bench_with_input(
            BenchmarkId::new("frame", format!("{width}x{height}")),
            &frames,
            |b, frames| {
                let mut segmenter = Mog2Segmenter::default();
                let mut i = 0;
                b.iter(|| {
                    let mask = segmenter.classify(black_box(&frames[i % frames.len()]));
                    i += 1;
                    black_box(mask.foreground_count())
                });
            },
        );
    }

    group.finish();
}

fn bench_analyze_clip(c: &mut Criterion) {
    let mut group = c.benchmark_group("analyze_clip");
    group.sample_size(10);

    let frames: Vec<RgbImage> = (0..300)
        .map(|i| create_test_frame(160, 90, (i * 3) % 150))
        .collect();
    let analyzer = MotionAnalyzer::new(AnalysisConfig::default()).unwrap();

    group.throughput(Throughput::Elements(frames.len() as u64));
    group.bench_function("300_frames_160x90", |b| {
        b.iter(|| {
            let mut source = MemoryFrameSource::from_frames(frames.clone(), 30.0);
            black_box(analyzer.analyze_source(&mut source).unwrap())
        });
    });

    group.finish();
}

criterion_group!(benches, bench_classify, bench_analyze_clip);
criterion_main!(benches);
