//! Benchmarks for the camera frame buffer hand-off
//!
//! The producer/consumer critical sections must stay O(frame size):
//! - raw byte run replacement at typical H.264 chunk sizes
//! - decoded image replacement and copy-out
//! - contended reads while a writer thread keeps publishing

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use airlink::{CameraFrameBuffer, CameraImage};

const RAW_CHUNK: usize = 64 * 1024;
const IMAGE_PIXELS: usize = 1280 * 720 * 3;

fn bench_raw_replacement(c: &mut Criterion) {
    let buffer = CameraFrameBuffer::new();
    let chunk = vec![0xa5u8; RAW_CHUNK];

    let mut group = c.benchmark_group("raw_replacement");
    group.throughput(Throughput::Bytes(RAW_CHUNK as u64));
    group.bench_function("set_raw_data_64k", |b| {
        b.iter(|| buffer.set_raw_data(black_box(&chunk)))
    });
    group.finish();
}

fn bench_image_round_trip(c: &mut Criterion) {
    let buffer = CameraFrameBuffer::new();
    let image = CameraImage { width: 1280, height: 720, pixels: vec![0x42; IMAGE_PIXELS] };
    buffer.set_image(image.clone());

    let mut group = c.benchmark_group("image_round_trip");
    group.throughput(Throughput::Bytes(IMAGE_PIXELS as u64));
    group.bench_function("set_image_720p", |b| {
        b.iter(|| buffer.set_image(black_box(image.clone())))
    });
    group.bench_function("image_720p", |b| b.iter(|| black_box(buffer.image())));
    group.finish();
}

fn bench_contended_reads(c: &mut Criterion) {
    let buffer = Arc::new(CameraFrameBuffer::new());
    buffer.set_raw_data(&vec![7u8; RAW_CHUNK]);

    let stop = Arc::new(AtomicBool::new(false));
    let writer = {
        let buffer = buffer.clone();
        let stop = stop.clone();
        std::thread::spawn(move || {
            let chunk = vec![9u8; RAW_CHUNK];
            while !stop.load(Ordering::Relaxed) {
                buffer.set_raw_data(&chunk);
            }
        })
    };

    c.bench_function("raw_data_under_write_contention", |b| {
        b.iter(|| black_box(buffer.raw_data()))
    });

    stop.store(true, Ordering::Relaxed);
    writer.join().expect("writer thread");
}

criterion_group!(benches, bench_raw_replacement, bench_image_round_trip, bench_contended_reads);
criterion_main!(benches);
