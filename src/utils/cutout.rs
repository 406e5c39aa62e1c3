//! Transparent cutout extraction

use image::{imageops, GrayImage, Rgba, RgbImage, RgbaImage};

/// Inclusive-exclusive pixel rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x0: u32,
    pub y0: u32,
    /// Exclusive
    pub x1: u32,
    /// Exclusive
    pub y1: u32,
}

impl BoundingBox {
    #[must_use]
    pub fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.y1 - self.y0
    }

    /// Grow by `padding` on every side, clamped to `width` x `height`
    #[must_use]
    pub fn padded(&self, padding: u32, width: u32, height: u32) -> Self {
        Self {
            x0: self.x0.saturating_sub(padding),
            y0: self.y0.saturating_sub(padding),
            x1: self.x1.saturating_add(padding).min(width),
            y1: self.y1.saturating_add(padding).min(height),
        }
    }
}

/// Bounds of the non-zero pixels, or `None` for an empty mask
#[must_use]
pub fn bounding_box(mask: &GrayImage) -> Option<BoundingBox> {
    let mut bounds: Option<BoundingBox> = None;
    for (x, y, pixel) in mask.enumerate_pixels() {
        if pixel[0] == 0 {
            continue;
        }
        let b = bounds.get_or_insert(BoundingBox {
            x0: x,
            y0: y,
            x1: x + 1,
            y1: y + 1,
        });
        b.x0 = b.x0.min(x);
        b.y0 = b.y0.min(y);
        b.x1 = b.x1.max(x + 1);
        b.y1 = b.y1.max(y + 1);
    }
    bounds
}

/// Builds RGBA cutouts from an image and an item mask
pub struct CutoutExtractor;

impl CutoutExtractor {
    /// RGB plus the mask as alpha, at full image size
    #[must_use]
    pub fn compose(image: &RgbImage, mask: &GrayImage) -> RgbaImage {
        RgbaImage::from_fn(image.width(), image.height(), |x, y| {
            let rgb = image.get_pixel(x, y);
            let alpha = if x < mask.width() && y < mask.height() {
                mask.get_pixel(x, y)[0]
            } else {
                0
            };
            Rgba([rgb[0], rgb[1], rgb[2], alpha])
        })
    }

    /// Compose and crop to the padded bounding box of the mask.
    ///
    /// An empty mask yields the full-size, fully transparent composition.
    #[must_use]
    pub fn extract(image: &RgbImage, mask: &GrayImage, padding: u32) -> RgbaImage {
        let composed = Self::compose(image, mask);
        match bounding_box(mask) {
            Some(bounds) => {
                let crop = bounds.padded(padding, image.width(), image.height());
                imageops::crop_imm(&composed, crop.x0, crop.y0, crop.width(), crop.height())
                    .to_image()
            },
            None => composed,
        }
    }
}
