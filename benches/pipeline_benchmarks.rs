use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use wardrobe_parse::{
    utils::{FrameGeometry, ImagePreprocessor, LogitRemapper, MaskCleaner},
    Dataset, MockBackend, ParserConfig, ParsingEngine, WardrobeParser,
};

/// Person-sized synthetic photo: a bright torso on a dark background
fn synthetic_photo(width: u32, height: u32) -> RgbImage {
    let (x0, x1) = (width / 4, width * 3 / 4);
    let (y0, y1) = (height / 5, height * 3 / 5);
    RgbImage::from_fn(width, height, |x, y| {
        if (x0..x1).contains(&x) && (y0..y1).contains(&y) {
            Rgb([240, 240, 240])
        } else {
            Rgb([((x + y) % 64) as u8, 20, 30])
        }
    })
}

fn noisy_mask(width: u32, height: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        let inside = x > width / 4 && x < width * 3 / 4 && y > height / 4 && y < height * 3 / 4;
        let speckle = (x * 31 + y * 17) % 97 == 0;
        Luma([if inside ^ speckle { 255 } else { 0 }])
    })
}

fn mock_parser(dataset: Dataset) -> WardrobeParser {
    let config = ParserConfig::builder().dataset(dataset).build().unwrap();
    WardrobeParser::with_backend(config, Box::new(MockBackend::new(dataset.config()))).unwrap()
}

fn benchmark_full_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_image");
    group.sample_size(10);

    for dataset in Dataset::ALL {
        let parser = mock_parser(dataset);
        for (width, height) in [(320, 480), (768, 1024)] {
            let image = DynamicImage::ImageRgb8(synthetic_photo(width, height));
            group.bench_with_input(
                BenchmarkId::new(dataset.name(), format!("{width}x{height}")),
                &image,
                |b, image| b.iter(|| black_box(parser.parse_image(image).unwrap())),
            );
        }
    }

    group.finish();
}

fn benchmark_frame_roundtrip(c: &mut Criterion) {
    let dataset = Dataset::Lip;
    let config = ParserConfig::builder().dataset(dataset).build().unwrap();
    let engine = ParsingEngine::new(Box::new(MockBackend::new(dataset.config())), &config).unwrap();

    let image = synthetic_photo(600, 800);
    let geometry = FrameGeometry::for_image(600, 800, dataset.config().input_size).unwrap();
    let input = ImagePreprocessor::prepare(&image, &geometry, engine.preprocessing()).unwrap();
    let logits = engine.infer(&input).unwrap();

    let mut group = c.benchmark_group("frame_roundtrip");
    group.sample_size(10);

    group.bench_function("preprocess_600x800", |b| {
        b.iter(|| {
            black_box(
                ImagePreprocessor::prepare(&image, &geometry, engine.preprocessing()).unwrap(),
            )
        });
    });

    group.bench_function("remap_argmax_600x800", |b| {
        b.iter(|| {
            let remapped = LogitRemapper::remap(&logits, &geometry).unwrap();
            black_box(LogitRemapper::argmax(&remapped).unwrap())
        });
    });

    group.finish();
}

fn benchmark_mask_cleanup(c: &mut Criterion) {
    let cleaner = MaskCleaner::default();
    let mut group = c.benchmark_group("mask_cleanup");

    for size in [256u32, 512, 1024] {
        let mask = noisy_mask(size, size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &mask, |b, mask| {
            b.iter(|| black_box(cleaner.clean(mask)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_full_pipeline,
    benchmark_frame_roundtrip,
    benchmark_mask_cleanup
);
criterion_main!(benches);
