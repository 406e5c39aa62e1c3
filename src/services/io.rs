//! Image I/O operations service
//!
//! Keeps file and byte decoding out of the pipeline so it can be tested on
//! in-memory images.

use crate::error::{Result, WardrobeError};
use crate::utils::TensorValidator;
use image::{DynamicImage, ImageFormat, ImageReader, Limits, RgbaImage};
use std::io::Cursor;
use std::path::Path;

/// Service for handling image input/output operations
pub struct ImageIOService;

impl ImageIOService {
    /// Decode an image from raw bytes (JPEG, PNG, WebP, BMP, TIFF, GIF)
    ///
    /// The header is read first; an image over `max_pixels` is rejected before
    /// any pixel buffer is allocated, and the decoder is then held to the
    /// header dimensions.
    ///
    /// # Errors
    /// - Bytes are not a decodable image; reported as [`WardrobeError::Decode`]
    /// - Image exceeds `max_pixels`
    pub fn load_from_bytes(bytes: &[u8], max_pixels: u64) -> Result<DynamicImage> {
        if bytes.is_empty() {
            return Err(WardrobeError::decode("empty upload"));
        }

        let (width, height) = Self::reader(bytes)?
            .into_dimensions()
            .map_err(|e| WardrobeError::decode(e.to_string()))?;
        TensorValidator::validate_pixel_budget(width, height, max_pixels)?;

        let mut limits = Limits::default();
        limits.max_image_width = Some(width);
        limits.max_image_height = Some(height);

        let mut reader = Self::reader(bytes)?;
        reader.limits(limits);
        reader
            .decode()
            .map_err(|e| WardrobeError::decode(e.to_string()))
    }

    fn reader(bytes: &[u8]) -> Result<ImageReader<Cursor<&[u8]>>> {
        ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| WardrobeError::decode(e.to_string()))
    }

    /// Save an RGBA cutout as PNG, creating parent directories as needed
    ///
    /// # Errors
    /// - Output directory cannot be created
    /// - PNG encoding or write failure
    pub fn save_png<P: AsRef<Path>>(image: &RgbaImage, path: P) -> Result<()> {
        let path_ref = path.as_ref();

        if let Some(parent) = path_ref.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                WardrobeError::file_io_error("create output directory", parent, &e)
            })?;
        }

        image
            .save_with_format(path_ref, ImageFormat::Png)
            .map_err(|e| {
                WardrobeError::processing_stage_error(
                    "image save",
                    &format!("Failed to save as PNG: {e}"),
                    Some(&format!("path: {}", path_ref.display())),
                )
            })
    }

    /// Check if a file path has a supported image extension
    #[must_use]
    pub fn is_supported_format<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref()
            .extension()
            .and_then(|extension| extension.to_str())
            .is_some_and(|ext| {
                matches!(
                    ext.to_lowercase().as_str(),
                    "jpg" | "jpeg" | "png" | "webp" | "tiff" | "tif" | "bmp" | "gif"
                )
            })
    }
}
