//! Pipeline building blocks
//!
//! Each stage of the parsing pipeline lives in its own module:
//! geometry and preprocessing, logit remapping, item aggregation,
//! morphological cleanup and cutout extraction.

pub mod aggregate;
pub mod cutout;
pub mod morphology;
pub mod preprocessing;
pub mod providers;
pub mod remap;
pub mod transform;
pub mod validation;

pub use aggregate::{ItemAggregator, MinPixelRule};
pub use cutout::{bounding_box, BoundingBox, CutoutExtractor};
pub use morphology::MaskCleaner;
pub use preprocessing::ImagePreprocessor;
pub use providers::{ExecutionProviderManager, ProviderInfo};
pub use remap::{resize_bilinear_align_corners, LogitRemapper};
pub use transform::{get_affine_transform, warp_affine, AffineTransform, FrameGeometry};
pub use validation::TensorValidator;
