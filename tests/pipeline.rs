//! End-to-end pipeline tests
//!
//! These run the full warp / infer / remap / aggregate / cutout chain with the
//! mock backend, so no network weights are needed.

use image::{DynamicImage, Rgb, RgbImage};
use ndarray::Array3;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use wardrobe_parse::{
    utils::{warp_affine, FrameGeometry, LogitRemapper},
    Dataset, ItemCategory, MinPixelRule, MockBackend, ParserConfig, ParsingEngine, WardrobeParser,
};

fn canvas(width: u32, height: u32, rects: &[(u32, u32, u32, u32)]) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let hit = rects
            .iter()
            .any(|&(x0, y0, x1, y1)| (x0..x1).contains(&x) && (y0..y1).contains(&y));
        if hit {
            Rgb([255, 255, 255])
        } else {
            Rgb([0, 0, 0])
        }
    })
}

fn parser_with(config: ParserConfig, backend: MockBackend) -> WardrobeParser {
    WardrobeParser::with_backend(config, Box::new(backend)).unwrap()
}

fn class_index(dataset: Dataset, label: &str) -> u8 {
    dataset
        .config()
        .labels
        .iter()
        .position(|&l| l == label)
        .unwrap() as u8
}

#[test]
fn remap_inverts_the_frame_warp() {
    let (width, height) = (100u32, 60u32);
    let geometry = FrameGeometry::for_image(width, height, (64, 48)).unwrap();

    // Channel 0 holds x, channel 1 holds y
    let field = Array3::from_shape_fn((height as usize, width as usize, 2), |(y, x, c)| {
        if c == 0 {
            x as f32
        } else {
            y as f32
        }
    });

    let frame = warp_affine(&field, &geometry.forward, 64, 48).unwrap();
    let restored = LogitRemapper::remap(&frame, &geometry).unwrap();
    assert_eq!(restored.dim(), (60, 100, 2));

    let margin = 5;
    for y in margin..(height as usize - margin) {
        for x in margin..(width as usize - margin) {
            let rx = restored[[y, x, 0]];
            let ry = restored[[y, x, 1]];
            assert!(
                (rx - x as f32).abs() < 0.05 && (ry - y as f32).abs() < 0.05,
                "({x}, {y}) came back as ({rx}, {ry})"
            );
        }
    }
}

#[test]
fn engine_returns_frame_sized_logits() {
    let config = ParserConfig::builder().dataset(Dataset::Pascal).build().unwrap();
    let engine = ParsingEngine::new(Box::new(MockBackend::new(Dataset::Pascal.config())), &config)
        .unwrap();

    let logits = engine
        .infer(&ndarray::Array4::zeros((1, 3, 512, 512)))
        .unwrap();
    assert_eq!(logits.dim(), (512, 512, 7));

    // Wrong frame size is rejected before reaching the backend
    assert!(engine
        .infer(&ndarray::Array4::zeros((1, 3, 473, 473)))
        .is_err());
}

#[test]
fn foreground_lands_where_it_was_drawn() {
    let dataset = Dataset::Lip;
    let config = ParserConfig::builder().dataset(dataset).build().unwrap();
    let parser = parser_with(config, MockBackend::new(dataset.config()));

    // Wide image, region on the right-hand side
    let image = canvas(160, 90, &[(100, 20, 140, 70)]);
    let output = parser.parse_image(&DynamicImage::ImageRgb8(image)).unwrap();

    let top = class_index(dataset, "Upper-clothes");
    assert_eq!(output.parsing.width(), 160);
    assert_eq!(output.parsing.height(), 90);
    assert_eq!(output.parsing.classes[[45, 120]], top);
    assert_eq!(output.parsing.classes[[45, 20]], 0);
    assert_eq!(output.parsing.classes[[5, 120]], 0);
    assert_eq!(output.categories(), vec![ItemCategory::Top]);
}

#[test]
fn shoe_classes_become_shoes() {
    let dataset = Dataset::Lip;
    let config = ParserConfig::builder().dataset(dataset).build().unwrap();
    let backend = MockBackend::new(dataset.config())
        .with_foreground_class(class_index(dataset, "Right-shoe") as usize);
    let parser = parser_with(config, backend);

    let image = canvas(120, 120, &[(20, 80, 50, 110), (70, 80, 100, 110)]);
    let output = parser.parse_image(&DynamicImage::ImageRgb8(image)).unwrap();

    assert_eq!(output.categories(), vec![ItemCategory::Shoes]);
    // Both regions share one cutout spanning x 20..100 plus padding
    let cutout = &output.items[0].cutout;
    assert!(cutout.width() >= 95, "width {}", cutout.width());
}

#[test]
fn non_wardrobe_classes_are_ignored() {
    let dataset = Dataset::Atr;
    let config = ParserConfig::builder().dataset(dataset).build().unwrap();
    let backend =
        MockBackend::new(dataset.config()).with_foreground_class(class_index(dataset, "Face") as usize);
    let parser = parser_with(config, backend);

    let image = canvas(80, 80, &[(10, 10, 70, 70)]);
    let output = parser.parse_image(&DynamicImage::ImageRgb8(image)).unwrap();

    assert!(output.items.is_empty());
    assert!(output.parsing.pixel_count(class_index(dataset, "Face")) > 1000);
}

#[test]
fn min_pixel_rule_is_configurable() {
    let dataset = Dataset::Lip;
    let image = DynamicImage::ImageRgb8(canvas(100, 100, &[(40, 40, 50, 50)]));

    let default_parser = parser_with(
        ParserConfig::builder().dataset(dataset).build().unwrap(),
        MockBackend::new(dataset.config()),
    );
    assert!(default_parser.parse_image(&image).unwrap().items.is_empty());

    let relaxed = ParserConfig::builder()
        .dataset(dataset)
        .min_pixels(MinPixelRule {
            floor: 20,
            ratio: 0.0,
        })
        .cutout_padding(0)
        .build()
        .unwrap();
    let relaxed_parser = parser_with(relaxed, MockBackend::new(dataset.config()));

    let output = relaxed_parser.parse_image(&image).unwrap();
    assert_eq!(output.categories(), vec![ItemCategory::Top]);
    let cutout = &output.items[0].cutout;
    assert!((8..=12).contains(&cutout.width()), "width {}", cutout.width());
}

#[test]
fn parser_is_shared_across_threads() {
    let dataset = Dataset::Lip;
    let backend = MockBackend::new(dataset.config());
    let calls = backend.call_counter();
    let parser = Arc::new(parser_with(
        ParserConfig::builder().dataset(dataset).build().unwrap(),
        backend,
    ));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let parser = Arc::clone(&parser);
            std::thread::spawn(move || {
                let image = canvas(64 + i * 8, 64, &[(16, 16, 48, 48)]);
                parser
                    .parse_image(&DynamicImage::ImageRgb8(image))
                    .unwrap()
                    .categories()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), vec![ItemCategory::Top]);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[test]
fn timings_are_reported() {
    let dataset = Dataset::Lip;
    let parser = parser_with(
        ParserConfig::builder().dataset(dataset).build().unwrap(),
        MockBackend::new(dataset.config()),
    );

    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(canvas(64, 64, &[(16, 16, 48, 48)]))
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();

    let output = parser.parse_bytes(&bytes).unwrap();
    let t = &output.timings;
    assert!(t.total_ms >= t.inference_ms);
    assert!(t.total_ms >= t.image_decode_ms);
    assert!(t.encode_ms.is_none());
}
