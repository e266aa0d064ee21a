use criterion::{Criterion, black_box, criterion_group, criterion_main};
use rust_codescan::models::{Frame, PixelFormat};
use rust_codescan::stacker::FrameStacker;

fn window(width: usize, height: usize, size: usize) -> Vec<Frame> {
    (0..size)
        .map(|i| Frame::filled(width, height, PixelFormat::Bgr8, 100 + i as u8))
        .collect()
}

fn bench_stack_5_vga(c: &mut Criterion) {
    let frames = window(640, 480, 5);
    let stacker = FrameStacker::new(5);
    c.bench_function("stack_5_frames_640x480", |b| {
        b.iter(|| stacker.stack(black_box(&frames)))
    });
}

fn bench_stack_5_full_hd(c: &mut Criterion) {
    let frames = window(1920, 1080, 5);
    let stacker = FrameStacker::new(5);
    c.bench_function("stack_5_frames_1920x1080", |b| {
        b.iter(|| stacker.stack(black_box(&frames)))
    });
}

fn bench_stack_10_full_hd(c: &mut Criterion) {
    let frames = window(1920, 1080, 10);
    let stacker = FrameStacker::new(10);
    c.bench_function("stack_10_frames_1920x1080", |b| {
        b.iter(|| stacker.stack(black_box(&frames)))
    });
}

criterion_group!(
    benches,
    bench_stack_5_vga,
    bench_stack_5_full_hd,
    bench_stack_10_full_hd
);
criterion_main!(benches);
