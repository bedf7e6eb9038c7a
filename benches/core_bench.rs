use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{DynamicImage, ImageOutputFormat, Rgba, RgbaImage};
use yuanjing_forensics::detectors::{self, PixelContext};
use yuanjing_forensics::{aggregate, fingerprint, DetectorKind, FileHandle, ForensicScanner, SourceImage};

// 1024x768 的伪自然图：渐变 + 固定种子噪声
fn sample_image() -> RgbaImage {
    let mut state: u32 = 0x9e37_79b9;
    RgbaImage::from_fn(1024, 768, |x, y| {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        let n = state % 24;
        Rgba([
            ((x / 4 + n) % 256) as u8,
            ((y / 3 + n) % 256) as u8,
            ((x + y) / 8 % 256) as u8,
            255,
        ])
    })
}

fn sample_file(image: &RgbaImage) -> FileHandle {
    let mut png = Vec::new();
    if let Err(e) = DynamicImage::ImageRgba8(image.clone()).write_to(&mut png, ImageOutputFormat::Png) {
        println!("⚠️  PNG encode failed: {e}");
    }
    FileHandle::new("bench_sample.png", png, "image/png")
}

fn bench_fingerprint(c: &mut Criterion) {
    let pixels = sample_image();
    let file = sample_file(&pixels);
    let image = SourceImage::from_rgba(pixels);
    c.bench_function("fingerprint_generation", |b| {
        b.iter(|| fingerprint::generate_fingerprints(black_box(&file.bytes), &image))
    });
}

fn bench_pixel_detectors(c: &mut Criterion) {
    let image = SourceImage::from_rgba(sample_image());
    let mut group = c.benchmark_group("pixel_detectors");
    for kind in DetectorKind::PIXEL {
        group.bench_function(kind.key(), |b| {
            b.iter(|| {
                let ctx = PixelContext { image: &image, source_hint: "bench_sample.png" };
                detectors::safe_invoke(kind, || detectors::run_pixel(kind, ctx))
            })
        });
    }
    group.finish();
}

fn bench_full_scan(c: &mut Criterion) {
    let pixels = sample_image();
    let file = sample_file(&pixels);
    let image = SourceImage::from_rgba(pixels);
    let scanner = ForensicScanner::default();
    let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");

    c.bench_function("full_scan", |b| {
        b.to_async(&runtime).iter(|| scanner.scan(&image, &file))
    });

    let results = runtime.block_on(scanner.run_detectors(&image, &file));
    c.bench_function("aggregate_verdict", |b| b.iter(|| aggregate(black_box(&results))));
}

criterion_group!(benches, bench_fingerprint, bench_pixel_detectors, bench_full_scan);
criterion_main!(benches);
