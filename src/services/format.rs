//! Transport encoding for cutouts
//!
//! Cutouts leave the service as PNG (RGBA) wrapped in standard base64 with
//! padding.

use crate::{
    error::{Result, WardrobeError},
    types::{ParsedItem, ResponseItem},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{codecs::png::PngEncoder, ImageEncoder, RgbaImage};

/// Service for encoding cutouts into the response format
pub struct OutputFormatHandler;

impl OutputFormatHandler {
    /// Encode an RGBA image as PNG bytes
    ///
    /// # Errors
    /// - PNG encoder failure
    pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        PngEncoder::new(&mut bytes)
            .write_image(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ExtendedColorType::Rgba8,
            )
            .map_err(|e| {
                WardrobeError::processing_stage_error(
                    "encode",
                    &format!("PNG encoding failed: {e}"),
                    Some(&format!("{}x{}", image.width(), image.height())),
                )
            })?;
        Ok(bytes)
    }

    /// Standard base64 with padding
    #[must_use]
    pub fn to_base64(bytes: &[u8]) -> String {
        STANDARD.encode(bytes)
    }

    /// Encode one parsed item for the wire
    ///
    /// # Errors
    /// - PNG encoder failure
    pub fn encode_item(item: &ParsedItem) -> Result<ResponseItem> {
        let png = Self::encode_png(&item.cutout)?;
        Ok(ResponseItem {
            item_type: item.category,
            image_png_base64: Self::to_base64(&png),
        })
    }

    /// Get the file extension used for saved cutouts
    #[must_use]
    pub fn get_extension() -> &'static str {
        "png"
    }
}
