//! Dataset presets, label vocabularies and weight-file management
//!
//! A parsing network is trained against one dataset's label vocabulary. The
//! dataset fixes the network input resolution, the number of output classes
//! and the meaning of every class index, so it is resolved once at startup
//! and never changes for the lifetime of the process.

use crate::{
    config::ParserConfig,
    error::{Result, WardrobeError},
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const LIP_LABELS: [&str; 20] = [
    "Background",
    "Hat",
    "Hair",
    "Glove",
    "Sunglasses",
    "Upper-clothes",
    "Dress",
    "Coat",
    "Socks",
    "Pants",
    "Jumpsuits",
    "Scarf",
    "Skirt",
    "Face",
    "Left-arm",
    "Right-arm",
    "Left-leg",
    "Right-leg",
    "Left-shoe",
    "Right-shoe",
];

const ATR_LABELS: [&str; 18] = [
    "Background",
    "Hat",
    "Hair",
    "Sunglasses",
    "Upper-clothes",
    "Skirt",
    "Pants",
    "Dress",
    "Belt",
    "Left-shoe",
    "Right-shoe",
    "Face",
    "Left-leg",
    "Right-leg",
    "Left-arm",
    "Right-arm",
    "Bag",
    "Scarf",
];

const PASCAL_LABELS: [&str; 7] = [
    "Background",
    "Head",
    "Torso",
    "Upper Arms",
    "Lower Arms",
    "Upper Legs",
    "Lower Legs",
];

/// Human-parsing datasets with a known label vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dataset {
    /// Look Into Person, 20 classes
    Lip,
    /// ATR, 18 classes
    Atr,
    /// Pascal-Person-Part, 7 classes
    Pascal,
}

impl Dataset {
    /// All supported datasets, in display order
    pub const ALL: [Dataset; 3] = [Dataset::Lip, Dataset::Atr, Dataset::Pascal];

    /// Identifier used in configuration (`SCHP_DATASET`)
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Lip => "lip",
            Self::Atr => "atr",
            Self::Pascal => "pascal",
        }
    }

    /// Resolve the fixed settings for this dataset
    #[must_use]
    pub fn config(self) -> DatasetConfig {
        match self {
            Self::Lip => DatasetConfig {
                dataset: self,
                input_size: (473, 473),
                num_classes: LIP_LABELS.len(),
                labels: &LIP_LABELS,
            },
            Self::Atr => DatasetConfig {
                dataset: self,
                input_size: (512, 512),
                num_classes: ATR_LABELS.len(),
                labels: &ATR_LABELS,
            },
            Self::Pascal => DatasetConfig {
                dataset: self,
                input_size: (512, 512),
                num_classes: PASCAL_LABELS.len(),
                labels: &PASCAL_LABELS,
            },
        }
    }
}

impl Default for Dataset {
    fn default() -> Self {
        Self::Lip
    }
}

impl std::fmt::Display for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dataset {
    type Err = WardrobeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lip" => Ok(Self::Lip),
            "atr" => Ok(Self::Atr),
            "pascal" => Ok(Self::Pascal),
            other => {
                let known: Vec<&str> = Self::ALL.iter().map(|d| d.name()).collect();
                Err(WardrobeError::invalid_config(format!(
                    "Unknown dataset '{}'. Use one of: {}",
                    other,
                    known.join(", ")
                )))
            },
        }
    }
}

/// Fixed per-dataset settings: input frame, class count and label order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetConfig {
    pub dataset: Dataset,
    /// Network input frame as (height, width)
    pub input_size: (u32, u32),
    pub num_classes: usize,
    /// Label of every class index, in network output order
    pub labels: &'static [&'static str],
}

impl DatasetConfig {
    /// Label for a class index, if the index is in the vocabulary
    #[must_use]
    pub fn label(&self, class_index: usize) -> Option<&'static str> {
        self.labels.get(class_index).copied()
    }
}

/// Coarse wardrobe-item categories produced by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemCategory {
    Top,
    Outerwear,
    Dress,
    Pants,
    Skirt,
    Shoes,
    Hat,
    Scarf,
    Bag,
    Belt,
}

impl ItemCategory {
    /// Wire name used in the `type` field of the response
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Top => "top",
            Self::Outerwear => "outerwear",
            Self::Dress => "dress",
            Self::Pants => "pants",
            Self::Skirt => "skirt",
            Self::Shoes => "shoes",
            Self::Hat => "hat",
            Self::Scarf => "scarf",
            Self::Bag => "bag",
            Self::Belt => "belt",
        }
    }
}

impl std::fmt::Display for ItemCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a parsing label to the wardrobe item it belongs to.
///
/// Body parts, hair, background and accessories that are not stored in a
/// wardrobe map to `None` and are ignored during aggregation.
#[must_use]
pub fn item_for_label(label: &str) -> Option<ItemCategory> {
    match label {
        "Upper-clothes" => Some(ItemCategory::Top),
        "Coat" => Some(ItemCategory::Outerwear),
        "Dress" => Some(ItemCategory::Dress),
        "Pants" => Some(ItemCategory::Pants),
        "Skirt" => Some(ItemCategory::Skirt),
        "Left-shoe" | "Right-shoe" => Some(ItemCategory::Shoes),
        "Hat" => Some(ItemCategory::Hat),
        "Scarf" => Some(ItemCategory::Scarf),
        // ATR only
        "Bag" => Some(ItemCategory::Bag),
        "Belt" => Some(ItemCategory::Belt),
        _ => None,
    }
}

/// Order of the color planes the network expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelOrder {
    Rgb,
    Bgr,
}

impl ChannelOrder {
    /// RGB pixel index feeding each network input plane
    #[must_use]
    pub fn source_indices(self) -> [usize; 3] {
        match self {
            Self::Rgb => [0, 1, 2],
            Self::Bgr => [2, 1, 0],
        }
    }
}

/// Input normalization expected by the network
///
/// `normalization_mean` and `normalization_std` are indexed by *network*
/// plane, so with `ChannelOrder::Bgr` index 0 is the blue plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    /// Input frame as [height, width]
    pub target_size: [u32; 2],
    pub normalization_mean: [f32; 3],
    pub normalization_std: [f32; 3],
    pub channel_order: ChannelOrder,
}

impl PreprocessingConfig {
    /// Normalization used by the self-correcting human parsing checkpoints.
    ///
    /// Those networks were trained on OpenCV-decoded frames, so the planes are
    /// B, G, R and the ImageNet statistics are listed in that order.
    #[must_use]
    pub fn for_dataset(dataset: &DatasetConfig) -> Self {
        Self {
            target_size: [dataset.input_size.0, dataset.input_size.1],
            normalization_mean: [0.406, 0.456, 0.485],
            normalization_std: [0.225, 0.224, 0.229],
            channel_order: ChannelOrder::Bgr,
        }
    }
}

/// Model information and metadata
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub name: String,
    pub dataset: Dataset,
    pub size_bytes: u64,
    pub input_shape: (usize, usize, usize, usize), // NCHW format
    pub num_classes: usize,
}

/// Locates and loads the exported parsing network for the configured dataset
#[derive(Debug, Clone)]
pub struct ModelManager {
    weights_path: PathBuf,
    dataset: DatasetConfig,
}

impl ModelManager {
    /// Create a model manager from the parser configuration
    ///
    /// # Errors
    /// - Weight file does not exist or is not a regular file
    pub fn from_config(config: &ParserConfig) -> Result<Self> {
        Self::with_weights(&config.weights_path, config.dataset.config())
    }

    /// Create a model manager for an explicit weight file
    ///
    /// # Errors
    /// - Weight file does not exist or is not a regular file
    pub fn with_weights<P: AsRef<Path>>(weights_path: P, dataset: DatasetConfig) -> Result<Self> {
        let weights_path = weights_path.as_ref();
        if !weights_path.is_file() {
            return Err(WardrobeError::model_error_with_context(
                "locate",
                weights_path,
                "weight file not found",
                &[
                    "set SCHP_CKPT to the exported ONNX network",
                    "check that the file is readable",
                ],
            ));
        }

        Ok(Self {
            weights_path: weights_path.to_path_buf(),
            dataset,
        })
    }

    /// Read the raw network bytes
    ///
    /// # Errors
    /// - File I/O errors when reading the weight file
    pub fn load_model(&self) -> Result<Vec<u8>> {
        fs::read(&self.weights_path)
            .map_err(|e| WardrobeError::file_io_error("read weight file", &self.weights_path, &e))
    }

    /// Get model information
    ///
    /// # Errors
    /// - Weight file metadata cannot be read
    pub fn get_info(&self) -> Result<ModelInfo> {
        let metadata = fs::metadata(&self.weights_path).map_err(|e| {
            WardrobeError::file_io_error("inspect weight file", &self.weights_path, &e)
        })?;
        let name = self
            .weights_path
            .file_stem()
            .map_or_else(|| "parsing-network".to_string(), |s| s.to_string_lossy().to_string());

        Ok(ModelInfo {
            name,
            dataset: self.dataset.dataset,
            size_bytes: metadata.len(),
            input_shape: (
                1,
                3,
                self.dataset.input_size.0 as usize,
                self.dataset.input_size.1 as usize,
            ),
            num_classes: self.dataset.num_classes,
        })
    }

    /// Preprocessing configuration for the managed network
    #[must_use]
    pub fn get_preprocessing_config(&self) -> PreprocessingConfig {
        PreprocessingConfig::for_dataset(&self.dataset)
    }

    #[must_use]
    pub fn weights_path(&self) -> &Path {
        &self.weights_path
    }

    #[must_use]
    pub fn dataset(&self) -> &DatasetConfig {
        &self.dataset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_dataset_parsing() {
        assert_eq!("lip".parse::<Dataset>().unwrap(), Dataset::Lip);
        assert_eq!(" ATR ".parse::<Dataset>().unwrap(), Dataset::Atr);
        assert_eq!("pascal".parse::<Dataset>().unwrap(), Dataset::Pascal);

        let err = "coco".parse::<Dataset>().unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("lip, atr, pascal"));
    }

    #[test]
    fn test_dataset_settings_are_consistent() {
        for dataset in Dataset::ALL {
            let config = dataset.config();
            assert_eq!(config.labels.len(), config.num_classes);
            assert_eq!(config.labels[0], "Background");
            assert_eq!(config.dataset, dataset);
        }

        let lip = Dataset::Lip.config();
        assert_eq!(lip.input_size, (473, 473));
        assert_eq!(lip.num_classes, 20);
        assert_eq!(lip.label(5), Some("Upper-clothes"));
        assert_eq!(lip.label(20), None);

        let atr = Dataset::Atr.config();
        assert_eq!(atr.input_size, (512, 512));
        assert_eq!(atr.num_classes, 18);
    }

    #[test]
    fn test_item_mapping() {
        assert_eq!(item_for_label("Upper-clothes"), Some(ItemCategory::Top));
        assert_eq!(item_for_label("Coat"), Some(ItemCategory::Outerwear));
        assert_eq!(item_for_label("Left-shoe"), Some(ItemCategory::Shoes));
        assert_eq!(item_for_label("Right-shoe"), Some(ItemCategory::Shoes));
        assert_eq!(item_for_label("Belt"), Some(ItemCategory::Belt));
        assert_eq!(item_for_label("Face"), None);
        assert_eq!(item_for_label("Background"), None);
        assert_eq!(item_for_label("Torso"), None);
    }

    #[test]
    fn test_pascal_has_no_wardrobe_items() {
        let pascal = Dataset::Pascal.config();
        assert!(pascal.labels.iter().all(|label| item_for_label(label).is_none()));
    }

    #[test]
    fn test_item_category_wire_names() {
        assert_eq!(ItemCategory::Top.as_str(), "top");
        assert_eq!(
            serde_json::to_string(&ItemCategory::Outerwear).unwrap(),
            "\"outerwear\""
        );
    }

    #[test]
    fn test_preprocessing_uses_bgr_statistics() {
        let config = PreprocessingConfig::for_dataset(&Dataset::Lip.config());
        assert_eq!(config.channel_order, ChannelOrder::Bgr);
        assert_eq!(config.target_size, [473, 473]);
        // Blue plane first: ImageNet blue mean/std
        assert!((config.normalization_mean[0] - 0.406).abs() < f32::EPSILON);
        assert!((config.normalization_std[0] - 0.225).abs() < f32::EPSILON);
        assert_eq!(ChannelOrder::Bgr.source_indices(), [2, 1, 0]);
    }

    #[test]
    fn test_model_manager_missing_weights() {
        let err = ModelManager::with_weights("/nonexistent/lip.onnx", Dataset::Lip.config())
            .unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("/nonexistent/lip.onnx"));
    }

    #[test]
    fn test_model_manager_reads_weights() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"not really onnx").unwrap();

        let manager = ModelManager::with_weights(file.path(), Dataset::Atr.config()).unwrap();
        assert_eq!(manager.load_model().unwrap(), b"not really onnx");

        let info = manager.get_info().unwrap();
        assert_eq!(info.size_bytes, 15);
        assert_eq!(info.input_shape, (1, 3, 512, 512));
        assert_eq!(info.num_classes, 18);
        assert_eq!(info.dataset, Dataset::Atr);
    }
}
