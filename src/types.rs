//! Core types for parsing results and service responses

use crate::models::ItemCategory;
use image::{GrayImage, Luma, RgbaImage};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Per-pixel arg-max class indices at original image resolution
#[derive(Debug, Clone, PartialEq)]
pub struct ParsingMap {
    /// Class index per pixel, indexed `[y, x]`
    pub classes: Array2<u8>,
}

impl ParsingMap {
    #[must_use]
    pub fn new(classes: Array2<u8>) -> Self {
        Self { classes }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.classes.ncols() as u32
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.classes.nrows() as u32
    }

    /// Number of pixels assigned to `class_index`
    #[must_use]
    pub fn pixel_count(&self, class_index: u8) -> usize {
        self.classes.iter().filter(|&&c| c == class_index).count()
    }

    /// Binary mask (0/255) of the pixels assigned to `class_index`
    #[must_use]
    pub fn class_mask(&self, class_index: u8) -> GrayImage {
        GrayImage::from_fn(self.width(), self.height(), |x, y| {
            let hit = self.classes[[y as usize, x as usize]] == class_index;
            Luma([if hit { 255 } else { 0 }])
        })
    }
}

/// Merged mask for one wardrobe item
#[derive(Debug, Clone)]
pub struct ItemMask {
    pub category: ItemCategory,
    /// Union of the contributing class masks (0/255)
    pub mask: GrayImage,
    /// Labels of the classes that contributed, in label order
    pub classes: Vec<&'static str>,
}

impl ItemMask {
    /// Number of foreground pixels
    #[must_use]
    pub fn area(&self) -> usize {
        self.mask.pixels().filter(|p| p[0] > 0).count()
    }
}

/// One extracted wardrobe item
#[derive(Debug, Clone)]
pub struct ParsedItem {
    pub category: ItemCategory,
    /// Transparent cutout cropped to the padded item bounds
    pub cutout: RgbaImage,
}

/// Full output of one pipeline run
#[derive(Debug, Clone)]
pub struct ParseOutput {
    /// Items in aggregation order
    pub items: Vec<ParsedItem>,
    /// The arg-max parsing the items were derived from
    pub parsing: ParsingMap,
    /// Original image dimensions (width, height)
    pub dimensions: (u32, u32),
    pub timings: ProcessingTimings,
}

impl ParseOutput {
    /// Categories of the extracted items, in output order
    #[must_use]
    pub fn categories(&self) -> Vec<ItemCategory> {
        self.items.iter().map(|item| item.category).collect()
    }
}

/// Wire form of one item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseItem {
    #[serde(rename = "type")]
    pub item_type: ItemCategory,
    pub image_png_base64: String,
}

/// JSON body returned by `POST /parse`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub items: Vec<ResponseItem>,
}

impl ParseResponse {
    #[must_use]
    pub fn success(items: Vec<ResponseItem>) -> Self {
        Self {
            ok: true,
            message: None,
            items,
        }
    }

    /// Soft failure: the request was well-formed but the pipeline failed
    pub fn failure<S: Into<String>>(message: S) -> Self {
        Self {
            ok: false,
            message: Some(message.into()),
            items: Vec::new(),
        }
    }
}

/// Detailed timing breakdown for one parse
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingTimings {
    /// Decoding the uploaded bytes (zero when given a decoded image)
    pub image_decode_ms: u64,

    /// Affine warp and normalization
    pub preprocessing_ms: u64,

    /// Backend execution plus head selection and frame resize
    pub inference_ms: u64,

    /// Logit remap to original resolution and arg-max
    pub remap_ms: u64,

    /// Class to item aggregation and morphological cleanup
    pub postprocessing_ms: u64,

    /// Cutout composition and cropping
    pub cutout_ms: u64,

    /// PNG + base64 encoding of the response (service path only)
    pub encode_ms: Option<u64>,

    /// Total end-to-end processing time
    pub total_ms: u64,
}

impl ProcessingTimings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fraction of the total spent inside the backend
    #[must_use]
    pub fn inference_ratio(&self) -> f64 {
        if self.total_ms == 0 {
            0.0
        } else {
            self.inference_ms as f64 / self.total_ms as f64
        }
    }
}
