use criterion::{black_box, criterion_group, criterion_main, Criterion};
use exposure_capture::{mean_intensity, Frame, PixelFormat};

fn bench_mean_intensity(c: &mut Criterion) {
    let mono12 = Frame::filled(2048, 1920, 1200, PixelFormat::Mono12, 0);
    let rgb8 = Frame::filled(90, 1920, 1200, PixelFormat::Rgb8, 0);

    c.bench_function("mean_intensity_mono12_1920x1200", |b| {
        b.iter(|| mean_intensity(black_box(&mono12)))
    });
    c.bench_function("mean_intensity_rgb8_1920x1200", |b| {
        b.iter(|| mean_intensity(black_box(&rgb8)))
    });
}

criterion_group!(benches, bench_mean_intensity);
criterion_main!(benches);
