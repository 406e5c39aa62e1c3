//! Class to wardrobe-item aggregation

use crate::{
    models::{item_for_label, ItemCategory},
    types::{ItemMask, ParsingMap},
};
use image::GrayImage;
use log::debug;
use serde::{Deserialize, Serialize};

/// Minimum pixel count for a class to count as present:
/// `max(floor, trunc(ratio * width * height))`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinPixelRule {
    pub floor: usize,
    pub ratio: f64,
}

impl Default for MinPixelRule {
    fn default() -> Self {
        Self {
            floor: 150,
            ratio: 0.0005,
        }
    }
}

impl MinPixelRule {
    #[must_use]
    pub fn threshold(&self, width: u32, height: u32) -> usize {
        let area = f64::from(width) * f64::from(height);
        self.floor.max((self.ratio * area) as usize)
    }
}

/// Groups per-class masks into per-item masks
pub struct ItemAggregator;

impl ItemAggregator {
    /// Build item masks from a parsing map.
    ///
    /// Classes are visited in label order. A class contributes when its label
    /// maps to an item and it covers at least `min_pixels` pixels. Item order
    /// is the order in which each category is first seen.
    #[must_use]
    pub fn aggregate(
        parsing: &ParsingMap,
        labels: &[&'static str],
        min_pixels: usize,
    ) -> Vec<ItemMask> {
        let mut items: Vec<ItemMask> = Vec::new();

        for (class_index, &label) in labels.iter().enumerate() {
            let Some(category) = item_for_label(label) else {
                continue;
            };
            let Ok(class_index) = u8::try_from(class_index) else {
                break;
            };

            let count = parsing.pixel_count(class_index);
            if count < min_pixels {
                if count > 0 {
                    debug!(
                        "Dropping {} ({} px < {} px minimum)",
                        label, count, min_pixels
                    );
                }
                continue;
            }

            let class_mask = parsing.class_mask(class_index);
            match items.iter_mut().find(|item| item.category == category) {
                Some(item) => {
                    union_into(&mut item.mask, &class_mask);
                    item.classes.push(label);
                },
                None => items.push(ItemMask {
                    category,
                    mask: class_mask,
                    classes: vec![label],
                }),
            }
        }

        items
    }

    /// Categories present in an aggregation result, in order
    #[must_use]
    pub fn categories(items: &[ItemMask]) -> Vec<ItemCategory> {
        items.iter().map(|item| item.category).collect()
    }
}

fn union_into(target: &mut GrayImage, other: &GrayImage) {
    for (dst, src) in target.pixels_mut().zip(other.pixels()) {
        dst[0] = dst[0].max(src[0]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Dataset;
    use ndarray::Array2;

    fn parsing_with(width: usize, height: usize, regions: &[(u8, usize, usize, usize, usize)]) -> ParsingMap {
        let mut classes = Array2::<u8>::zeros((height, width));
        for &(class, x0, y0, x1, y1) in regions {
            for y in y0..y1 {
                for x in x0..x1 {
                    classes[[y, x]] = class;
                }
            }
        }
        ParsingMap::new(classes)
    }

    #[test]
    fn test_min_pixel_threshold() {
        let rule = MinPixelRule::default();
        assert_eq!(rule.threshold(100, 100), 150);
        // 0.0005 * 1000 * 1000 = 500
        assert_eq!(rule.threshold(1000, 1000), 500);
        // 0.0005 * 640 * 480 = 153.6, truncated
        assert_eq!(rule.threshold(640, 480), 153);
    }

    #[test]
    fn test_area_filtering_boundary() {
        let labels = Dataset::Lip.config().labels;
        let min = 150;

        // Upper-clothes (5) with exactly min-1 pixels
        let mut parsing = parsing_with(100, 100, &[]);
        for i in 0..(min - 1) {
            parsing.classes[[i / 100, i % 100]] = 5;
        }
        assert!(ItemAggregator::aggregate(&parsing, labels, min).is_empty());

        // One more pixel reaches the threshold
        parsing.classes[[(min - 1) / 100, (min - 1) % 100]] = 5;
        let items = ItemAggregator::aggregate(&parsing, labels, min);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].category, ItemCategory::Top);
        assert_eq!(items[0].area(), min);
    }

    #[test]
    fn test_category_union() {
        let labels = Dataset::Lip.config().labels;
        // Left-shoe (18) and Right-shoe (19), disjoint regions
        let parsing = parsing_with(60, 60, &[(18, 0, 40, 20, 60), (19, 40, 40, 60, 60)]);

        let items = ItemAggregator::aggregate(&parsing, labels, 150);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].category, ItemCategory::Shoes);
        assert_eq!(items[0].classes, vec!["Left-shoe", "Right-shoe"]);
        assert_eq!(items[0].area(), 800);
        assert_eq!(items[0].mask.get_pixel(5, 45)[0], 255);
        assert_eq!(items[0].mask.get_pixel(45, 45)[0], 255);
        assert_eq!(items[0].mask.get_pixel(30, 45)[0], 0);
    }

    #[test]
    fn test_first_seen_order_and_ignored_labels() {
        let labels = Dataset::Lip.config().labels;
        // Pants (9), Coat (7), Face (13), Hat (1)
        let parsing = parsing_with(
            80,
            80,
            &[(9, 0, 0, 20, 20), (7, 20, 0, 40, 20), (13, 40, 0, 60, 20), (1, 60, 0, 80, 20)],
        );

        let items = ItemAggregator::aggregate(&parsing, labels, 150);
        assert_eq!(
            ItemAggregator::categories(&items),
            vec![ItemCategory::Hat, ItemCategory::Outerwear, ItemCategory::Pants]
        );
    }

    #[test]
    fn test_empty_parsing_yields_no_items() {
        let labels = Dataset::Atr.config().labels;
        let parsing = parsing_with(50, 50, &[]);
        assert!(ItemAggregator::aggregate(&parsing, labels, 150).is_empty());
    }
}
