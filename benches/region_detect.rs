use criterion::{Criterion, black_box, criterion_group, criterion_main};
use rust_codescan::detector::{DetectorParams, RegionDetector};
use rust_codescan::models::{Frame, PixelFormat};
use rust_codescan::utils::binarization::ThresholdMode;

/// Dark scene with a grid of bright labels
fn labels_frame(width: usize, height: usize) -> Frame {
    let mut data = vec![25u8; width * height];
    let side = width / 12;
    for row in 0..3 {
        for col in 0..4 {
            let x0 = side + col * side * 3;
            let y0 = side + row * side * 3;
            for y in y0..(y0 + side).min(height) {
                for x in x0..(x0 + side).min(width) {
                    data[y * width + x] = 210;
                }
            }
        }
    }
    Frame::new(width, height, PixelFormat::Gray8, data).unwrap()
}

fn bench_detect_otsu_vga(c: &mut Criterion) {
    let frame = labels_frame(640, 480);
    let detector = RegionDetector::default();
    c.bench_function("detect_regions_otsu_640x480", |b| {
        b.iter(|| detector.detect(black_box(&frame)))
    });
}

fn bench_detect_otsu_full_hd(c: &mut Criterion) {
    let frame = labels_frame(1920, 1080);
    let detector = RegionDetector::default();
    c.bench_function("detect_regions_otsu_1920x1080", |b| {
        b.iter(|| detector.detect(black_box(&frame)))
    });
}

fn bench_detect_adaptive_full_hd(c: &mut Criterion) {
    let frame = labels_frame(1920, 1080);
    let detector = RegionDetector::new(DetectorParams {
        threshold: ThresholdMode::Adaptive {
            block_size: 51,
            offset: 10,
        },
        ..DetectorParams::default()
    });
    c.bench_function("detect_regions_adaptive_1920x1080", |b| {
        b.iter(|| detector.detect(black_box(&frame)))
    });
}

criterion_group!(
    benches,
    bench_detect_otsu_vga,
    bench_detect_otsu_full_hd,
    bench_detect_adaptive_full_hd
);
criterion_main!(benches);
