//! Tensor validation utilities
//!
//! Shape and value checks applied at the boundary between the pipeline and
//! the inference backend.

use crate::error::{Result, WardrobeError};
use ndarray::Array4;

/// Validator for tensor operations and shape validation
pub struct TensorValidator;

impl TensorValidator {
    /// Validate tensor shape matches expected dimensions
    ///
    /// # Errors
    /// - Shape differs from `expected_shape`
    pub fn validate_tensor_shape(
        tensor: &Array4<f32>,
        expected_shape: (usize, usize, usize, usize),
    ) -> Result<()> {
        let actual = tensor.dim();
        if actual != expected_shape {
            let (batch, channels, height, width) = expected_shape;
            return Err(WardrobeError::processing(format!(
                "Tensor shape mismatch. Expected [{}, {}, {}, {}], got [{}, {}, {}, {}]",
                batch, channels, height, width, actual.0, actual.1, actual.2, actual.3
            )));
        }

        Ok(())
    }

    /// Validate an output head: batch size 1 and non-empty spatial dimensions
    ///
    /// # Errors
    /// - Batch size other than 1
    /// - Zero channels, height or width
    pub fn validate_output_head(head: &Array4<f32>) -> Result<()> {
        let (batch, channels, height, width) = head.dim();
        if batch != 1 {
            return Err(WardrobeError::inference(format!(
                "Output head must have batch size 1, got {}",
                batch
            )));
        }
        if channels == 0 || height == 0 || width == 0 {
            return Err(WardrobeError::inference(format!(
                "Output head is empty: [{}, {}, {}, {}]",
                batch, channels, height, width
            )));
        }
        Ok(())
    }

    /// Validate image dimensions are within reasonable bounds
    ///
    /// # Errors
    /// - Either side is zero or larger than 16384 px
    pub fn validate_image_dimensions(width: u32, height: u32) -> Result<()> {
        const MAX_DIMENSION: u32 = 16384; // 16K pixels
        const MIN_DIMENSION: u32 = 1;

        if width < MIN_DIMENSION || height < MIN_DIMENSION {
            return Err(WardrobeError::processing(format!(
                "Image dimensions too small: {}x{}. Minimum: {}x{}",
                width, height, MIN_DIMENSION, MIN_DIMENSION
            )));
        }

        if width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(WardrobeError::processing(format!(
                "Image dimensions too large: {}x{}. Maximum: {}x{}",
                width, height, MAX_DIMENSION, MAX_DIMENSION
            )));
        }

        Ok(())
    }

    /// Validate that `width * height` fits in the pixel budget
    ///
    /// # Errors
    /// - Image has more than `max_pixels` pixels
    pub fn validate_pixel_budget(width: u32, height: u32, max_pixels: u64) -> Result<()> {
        let pixels = u64::from(width) * u64::from(height);
        if pixels > max_pixels {
            return Err(WardrobeError::processing(format!(
                "Image too large: {}x{} is {} pixels, limit is {}",
                width, height, pixels, max_pixels
            )));
        }
        Ok(())
    }

    /// Validate that every value is finite
    ///
    /// # Errors
    /// - Tensor contains NaN or infinity
    pub fn validate_finite(tensor: &Array4<f32>) -> Result<()> {
        if tensor.iter().any(|value| !value.is_finite()) {
            return Err(WardrobeError::inference(
                "Tensor contains non-finite values (NaN or infinity)",
            ));
        }
        Ok(())
    }
}
