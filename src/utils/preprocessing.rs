//! Image preprocessing into the network input frame
//!
//! The image is warped (not resized) into the frame with the affine from
//! [`FrameGeometry`], so the aspect ratio is preserved and the uncovered parts
//! of the frame stay black before normalization.

use crate::{
    error::{Result, WardrobeError},
    models::PreprocessingConfig,
    utils::transform::{warp_affine, FrameGeometry},
};
use image::RgbImage;
use ndarray::{Array3, Array4};

/// Shared image preprocessing utilities
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Produce the NCHW input tensor for one image
    ///
    /// 1. RGB pixels are reordered into network plane order (BGR for the
    ///    parsing presets);
    /// 2. warped into the frame with bilinear sampling;
    /// 3. scaled to [0, 1] and standardized per plane.
    ///
    /// # Errors
    /// - Image dimensions do not match `geometry.source_size`
    /// - Singular frame transform
    pub fn prepare(
        image: &RgbImage,
        geometry: &FrameGeometry,
        preprocessing_config: &PreprocessingConfig,
    ) -> Result<Array4<f32>> {
        if image.dimensions() != geometry.source_size {
            return Err(WardrobeError::processing_stage_error(
                "preprocessing",
                "image does not match the frame geometry",
                Some(&format!(
                    "{}x{} vs {}x{}",
                    image.width(),
                    image.height(),
                    geometry.source_size.0,
                    geometry.source_size.1
                )),
            ));
        }

        let (frame_h, frame_w) = (
            geometry.frame_size.0 as usize,
            geometry.frame_size.1 as usize,
        );

        let planes = Self::to_planar_hwc(image, preprocessing_config);
        let warped = warp_affine(&planes, &geometry.forward, frame_h, frame_w)?;

        Ok(Self::normalize_to_tensor(&warped, preprocessing_config))
    }

    /// RGB image to float HWC in network plane order, values 0-255
    #[allow(clippy::indexing_slicing)]
    fn to_planar_hwc(image: &RgbImage, preprocessing_config: &PreprocessingConfig) -> Array3<f32> {
        let order = preprocessing_config.channel_order.source_indices();
        let (width, height) = image.dimensions();
        let mut planes = Array3::<f32>::zeros((height as usize, width as usize, 3));

        for (x, y, pixel) in image.enumerate_pixels() {
            for (plane, &source) in order.iter().enumerate() {
                planes[[y as usize, x as usize, plane]] = f32::from(pixel[source]);
            }
        }

        planes
    }

    /// Scale to [0, 1], standardize, and transpose HWC to NCHW
    #[allow(clippy::indexing_slicing)]
    // Safe: tensor dimensions pre-allocated to match the warped frame
    fn normalize_to_tensor(
        frame: &Array3<f32>,
        preprocessing_config: &PreprocessingConfig,
    ) -> Array4<f32> {
        let (height, width, channels) = frame.dim();
        let mut tensor = Array4::<f32>::zeros((1, channels, height, width));

        for ((y, x, c), &value) in frame.indexed_iter() {
            tensor[[0, c, y, x]] = (value / 255.0 - preprocessing_config.normalization_mean[c])
                / preprocessing_config.normalization_std[c];
        }

        tensor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Dataset, PreprocessingConfig};
    use image::Rgb;

    #[test]
    fn test_prepare_shape_and_channel_order() {
        let dataset = Dataset::Lip.config();
        let config = PreprocessingConfig::for_dataset(&dataset);
        // Pure red image
        let image = RgbImage::from_pixel(40, 40, Rgb([255, 0, 0]));
        let geometry = FrameGeometry::for_image(40, 40, dataset.input_size).unwrap();

        let tensor = ImagePreprocessor::prepare(&image, &geometry, &config).unwrap();
        assert_eq!(tensor.dim(), (1, 3, 473, 473));

        // Square image fills the frame; red lands in the last (R) plane
        let expected_red = (1.0 - 0.485) / 0.229;
        let expected_blue = (0.0 - 0.406) / 0.225;
        assert!((tensor[[0, 2, 236, 236]] - expected_red).abs() < 1e-4);
        assert!((tensor[[0, 0, 236, 236]] - expected_blue).abs() < 1e-4);
    }

    #[test]
    fn test_prepare_letterbox_is_black_before_normalization() {
        let dataset = Dataset::Atr.config();
        let config = PreprocessingConfig::for_dataset(&dataset);
        // Wide image leaves rows at the top and bottom of the frame uncovered
        let image = RgbImage::from_pixel(200, 50, Rgb([255, 255, 255]));
        let geometry = FrameGeometry::for_image(200, 50, dataset.input_size).unwrap();

        let tensor = ImagePreprocessor::prepare(&image, &geometry, &config).unwrap();
        let black_green = (0.0 - 0.456) / 0.224;
        let white_green = (1.0 - 0.456) / 0.224;
        assert!((tensor[[0, 1, 5, 255]] - black_green).abs() < 1e-4);
        assert!((tensor[[0, 1, 255, 255]] - white_green).abs() < 1e-4);
    }

    #[test]
    fn test_prepare_rejects_mismatched_geometry() {
        let config = PreprocessingConfig::for_dataset(&Dataset::Lip.config());
        let image = RgbImage::new(10, 10);
        let geometry = FrameGeometry::for_image(20, 10, (473, 473)).unwrap();
        assert!(ImagePreprocessor::prepare(&image, &geometry, &config).is_err());
    }
}
