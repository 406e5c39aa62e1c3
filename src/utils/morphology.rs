//! Morphological cleanup of item masks

use image::{GrayImage, Luma};
use imageproc::morphology::{grayscale_dilate, grayscale_erode, Mask};

/// Side length of the structuring element used for cleanup
pub const CLEANUP_KERNEL_SIZE: u32 = 7;

/// Elliptical structuring element, row-for-row identical to OpenCV's
/// `getStructuringElement(MORPH_ELLIPSE, (size, size))`.
#[must_use]
pub fn ellipse_element(size: u32) -> GrayImage {
    let size = size.max(1);
    let radius = f64::from(size / 2);
    let inv_r2 = if radius > 0.0 { 1.0 / (radius * radius) } else { 0.0 };
    let mut element = GrayImage::new(size, size);

    for row in 0..size {
        let dy = f64::from(row) - radius;
        let half_width = if dy.abs() <= radius {
            (radius * (1.0 - dy * dy * inv_r2).max(0.0).sqrt()).round() as i64
        } else {
            0
        };
        let start = (i64::from(size / 2) - half_width).max(0) as u32;
        let end = (i64::from(size / 2) + half_width + 1).min(i64::from(size)) as u32;
        for col in start..end {
            element.put_pixel(col, row, Luma([255]));
        }
    }

    element
}

/// Opening then closing with an elliptical element
pub struct MaskCleaner {
    element: Mask,
}

impl Default for MaskCleaner {
    fn default() -> Self {
        Self::new(CLEANUP_KERNEL_SIZE)
    }
}

impl MaskCleaner {
    #[must_use]
    pub fn new(kernel_size: u32) -> Self {
        let element = ellipse_element(kernel_size);
        let center = (element.width() / 2) as u8;
        Self {
            element: Mask::from_image(&element, center, center),
        }
    }

    /// Remove speckles (open, once) then fill small holes (close, twice).
    ///
    /// The close step dilates twice then erodes twice.
    #[must_use]
    pub fn clean(&self, mask: &GrayImage) -> GrayImage {
        let opened = grayscale_dilate(&grayscale_erode(mask, &self.element), &self.element);

        let dilated = grayscale_dilate(&grayscale_dilate(&opened, &self.element), &self.element);
        grayscale_erode(&grayscale_erode(&dilated, &self.element), &self.element)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect_mask(width: u32, height: u32, rect: (u32, u32, u32, u32)) -> GrayImage {
        let (x0, y0, x1, y1) = rect;
        GrayImage::from_fn(width, height, |x, y| {
            Luma([if x >= x0 && x < x1 && y >= y0 && y < y1 { 255 } else { 0 }])
        })
    }

    fn row_pattern(element: &GrayImage, row: u32) -> String {
        (0..element.width())
            .map(|x| if element.get_pixel(x, row)[0] > 0 { '1' } else { '0' })
            .collect()
    }

    #[test]
    fn test_ellipse_matches_opencv() {
        let element = ellipse_element(7);
        let rows: Vec<String> = (0..7).map(|r| row_pattern(&element, r)).collect();
        assert_eq!(
            rows,
            vec!["0001000", "0111110", "1111111", "1111111", "1111111", "0111110", "0001000"]
        );
    }

    #[test]
    fn test_speckle_removal() {
        let mut mask = rect_mask(60, 60, (10, 10, 40, 40));
        // Isolated 2x2 speckle far from the rectangle
        for (x, y) in [(52, 52), (53, 52), (52, 53), (53, 53)] {
            mask.put_pixel(x, y, Luma([255]));
        }

        let cleaned = MaskCleaner::default().clean(&mask);
        assert_eq!(cleaned.get_pixel(52, 52)[0], 0);
        assert_eq!(cleaned.get_pixel(25, 25)[0], 255);
    }

    #[test]
    fn test_hole_filling() {
        let mut mask = rect_mask(60, 60, (10, 10, 50, 50));
        for y in 28..31 {
            for x in 28..31 {
                mask.put_pixel(x, y, Luma([0]));
            }
        }

        let cleaned = MaskCleaner::default().clean(&mask);
        assert_eq!(cleaned.get_pixel(29, 29)[0], 255);
    }

    #[test]
    fn test_large_rectangle_keeps_extent() {
        let mask = rect_mask(80, 80, (20, 15, 60, 70));
        let cleaned = MaskCleaner::default().clean(&mask);

        // Edge midpoints survive; nothing grows outside the original box
        assert_eq!(cleaned.get_pixel(20, 40)[0], 255);
        assert_eq!(cleaned.get_pixel(59, 40)[0], 255);
        assert_eq!(cleaned.get_pixel(40, 15)[0], 255);
        assert_eq!(cleaned.get_pixel(40, 69)[0], 255);
        for (x, y, p) in cleaned.enumerate_pixels() {
            if p[0] > 0 {
                assert!((20..60).contains(&x) && (15..70).contains(&y));
            }
        }
    }

    #[test]
    fn test_empty_mask_stays_empty() {
        let mask = GrayImage::new(32, 32);
        let cleaned = MaskCleaner::default().clean(&mask);
        assert!(cleaned.pixels().all(|p| p[0] == 0));
    }
}
