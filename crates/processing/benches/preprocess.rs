//! Preprocessing benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use processing::{tensor_from_frame, ImageFrame, PreprocessParams};
use tensor_core::{DType, Layout, Shape};

fn bench_preprocess(c: &mut Criterion) {
    let frame = ImageFrame::solid(640, 480, [120, 80, 40]).unwrap();
    let geometry = Shape::image(Layout::Nhwc, 224, 224, 3)
        .image_geometry(Layout::Nhwc)
        .unwrap();
    let params = PreprocessParams::default();

    c.bench_function("preprocess_640x480_to_224_f32", |b| {
        b.iter(|| {
            tensor_from_frame(black_box(frame.clone()), &geometry, DType::F32, &params).unwrap()
        })
    });

    c.bench_function("preprocess_640x480_to_224_u8", |b| {
        b.iter(|| {
            tensor_from_frame(black_box(frame.clone()), &geometry, DType::U8, &params).unwrap()
        })
    });
}

criterion_group!(benches, bench_preprocess);
criterion_main!(benches);
