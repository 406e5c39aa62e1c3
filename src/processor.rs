//! Wardrobe parsing processor
//!
//! `WardrobeParser` owns the initialized inference engine and runs the full
//! pipeline: frame warp, inference, inverse remap, item aggregation, mask
//! cleanup and cutout extraction. The HTTP server and the CLI both go through
//! it, so behavior is identical on every surface.

use crate::{
    config::ParserConfig,
    error::{Result, WardrobeError},
    inference::{InferenceBackend, ParsingEngine},
    models::ModelManager,
    services::{ImageIOService, OutputFormatHandler},
    types::{
        ParseOutput, ParseResponse, ParsedItem, ParsingMap, ProcessingTimings, ResponseItem,
    },
    utils::{
        CutoutExtractor, FrameGeometry, ImagePreprocessor, ItemAggregator, LogitRemapper,
        MaskCleaner, TensorValidator,
    },
};
use image::DynamicImage;
use instant::Instant;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{info as trace_info, instrument, span, warn as trace_warn, Level};

/// Backend type enumeration for runtime selection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// ONNX Runtime backend (supports GPU acceleration)
    Onnx,
    /// Tract backend (pure Rust, no external dependencies)
    Tract,
}

impl Default for BackendType {
    fn default() -> Self {
        if cfg!(feature = "onnx") {
            Self::Onnx
        } else {
            Self::Tract
        }
    }
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Onnx => f.write_str("onnx"),
            Self::Tract => f.write_str("tract"),
        }
    }
}

impl FromStr for BackendType {
    type Err = WardrobeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "onnx" | "ort" => Ok(Self::Onnx),
            "tract" => Ok(Self::Tract),
            other => Err(WardrobeError::invalid_config(format!(
                "Unknown backend: {other}. Valid backends: onnx, tract"
            ))),
        }
    }
}

/// Factory trait for creating inference backends
pub trait BackendFactory: Send + Sync {
    /// Create a backend instance of the specified type with the given model manager
    ///
    /// # Errors
    /// - Backend not compiled into this build
    fn create_backend(
        &self,
        backend_type: BackendType,
        model_manager: ModelManager,
    ) -> Result<Box<dyn InferenceBackend>>;

    /// List available backend types
    fn available_backends(&self) -> Vec<BackendType>;
}

/// Builds the backends compiled into this crate
pub struct DefaultBackendFactory;

impl BackendFactory for DefaultBackendFactory {
    fn create_backend(
        &self,
        backend_type: BackendType,
        model_manager: ModelManager,
    ) -> Result<Box<dyn InferenceBackend>> {
        match backend_type {
            BackendType::Onnx => {
                #[cfg(feature = "onnx")]
                {
                    Ok(Box::new(crate::backends::OnnxBackend::with_model_manager(
                        model_manager,
                    )))
                }
                #[cfg(not(feature = "onnx"))]
                {
                    drop(model_manager);
                    Err(WardrobeError::invalid_config(
                        "ONNX backend not compiled in; rebuild with the `onnx` feature",
                    ))
                }
            },
            BackendType::Tract => {
                #[cfg(feature = "tract")]
                {
                    Ok(Box::new(crate::backends::TractBackend::with_model_manager(
                        model_manager,
                    )))
                }
                #[cfg(not(feature = "tract"))]
                {
                    drop(model_manager);
                    Err(WardrobeError::invalid_config(
                        "Tract backend not compiled in; rebuild with the `tract` feature",
                    ))
                }
            },
        }
    }

    fn available_backends(&self) -> Vec<BackendType> {
        let mut backends = Vec::new();
        if cfg!(feature = "onnx") {
            backends.push(BackendType::Onnx);
        }
        if cfg!(feature = "tract") {
            backends.push(BackendType::Tract);
        }
        backends
    }
}

/// The parsing service object.
///
/// Built once at startup; the network is loaded before construction returns,
/// so a configuration or weight problem surfaces here rather than on the
/// first request. Share it behind an `Arc`.
pub struct WardrobeParser {
    config: ParserConfig,
    engine: ParsingEngine,
    cleaner: MaskCleaner,
}

impl WardrobeParser {
    /// Create a parser using the backends compiled into this crate
    ///
    /// # Errors
    /// - Invalid configuration
    /// - Weight file missing or unloadable
    /// - Backend initialization failures
    pub fn new(config: ParserConfig) -> Result<Self> {
        Self::with_factory(config, Box::new(DefaultBackendFactory))
    }

    /// Create a parser with a custom backend factory
    ///
    /// # Errors
    /// - Invalid configuration
    /// - Weight file missing or unloadable
    /// - Backend initialization failures
    pub fn with_factory(config: ParserConfig, factory: Box<dyn BackendFactory>) -> Result<Self> {
        config.validate()?;
        let model_manager = ModelManager::from_config(&config)?;
        let backend = factory.create_backend(config.backend_type, model_manager)?;
        Self::with_backend(config, backend)
    }

    /// Create a parser around an already constructed backend
    ///
    /// # Errors
    /// - Invalid configuration
    /// - Backend initialization failures
    pub fn with_backend(config: ParserConfig, backend: Box<dyn InferenceBackend>) -> Result<Self> {
        config.validate()?;

        info!("Initializing wardrobe parser");
        debug!("Dataset: {}", config.dataset);
        debug!("Backend type: {}", config.backend_type);
        debug!("Execution provider: {}", config.execution_provider);

        let engine = ParsingEngine::new(backend, &config)?;
        let model = engine.model_info()?;
        info!(
            "Model: {} ({}, {:.1} MB)",
            model.name,
            model.dataset,
            model.size_bytes as f64 / (1024.0 * 1024.0)
        );
        if let Some(load_time) = engine.model_load_time() {
            info!(
                "Wardrobe parser ready ({} classes, model loaded in {}ms)",
                engine.dataset().num_classes,
                load_time.as_millis()
            );
        }

        Ok(Self {
            config,
            engine,
            cleaner: MaskCleaner::default(),
        })
    }

    #[must_use]
    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    #[must_use]
    pub fn engine(&self) -> &ParsingEngine {
        &self.engine
    }

    /// Run the full pipeline on a decoded image
    ///
    /// Items come back in aggregation order. An image with no wardrobe item
    /// above the area threshold yields an empty list, not an error.
    ///
    /// # Errors
    /// - Image dimensions out of range or over the pixel budget
    /// - Image smaller than 2 px on both sides
    /// - Inference failures
    #[instrument(
        skip(self, image),
        fields(
            dataset = %self.config.dataset,
            backend = %self.config.backend_type,
            dimensions = %format!("{}x{}", image.width(), image.height())
        )
    )]
    pub fn parse_image(&self, image: &DynamicImage) -> Result<ParseOutput> {
        let total_start = Instant::now();
        let mut timings = ProcessingTimings::new();
        let (width, height) = (image.width(), image.height());
        TensorValidator::validate_image_dimensions(width, height)?;
        TensorValidator::validate_pixel_budget(width, height, self.config.max_image_pixels)?;

        let dataset = *self.engine.dataset();
        let rgb = image.to_rgb8();

        let (geometry, input) = {
            let _span = span!(Level::DEBUG, "preprocessing", width, height).entered();
            let start = Instant::now();
            let geometry = FrameGeometry::for_image(width, height, dataset.input_size)?;
            let input = ImagePreprocessor::prepare(&rgb, &geometry, self.engine.preprocessing())?;
            timings.preprocessing_ms = start.elapsed().as_millis() as u64;
            (geometry, input)
        };

        let frame_logits = {
            let _span = span!(Level::INFO, "inference", backend = %self.config.backend_type)
                .entered();
            let start = Instant::now();
            let logits = self.engine.infer(&input)?;
            timings.inference_ms = start.elapsed().as_millis() as u64;
            logits
        };

        let parsing = {
            let _span = span!(Level::DEBUG, "remap").entered();
            let start = Instant::now();
            let logits = LogitRemapper::remap(&frame_logits, &geometry)?;
            let parsing = LogitRemapper::argmax(&logits)?;
            timings.remap_ms = start.elapsed().as_millis() as u64;
            if self.config.debug {
                self.log_class_areas(&parsing);
            }
            parsing
        };

        let masks = {
            let min_pixels = self.config.min_pixels.threshold(width, height);
            let _span = span!(Level::DEBUG, "postprocessing", min_pixels).entered();
            let start = Instant::now();
            let mut masks = ItemAggregator::aggregate(&parsing, dataset.labels, min_pixels);
            for item in &mut masks {
                item.mask = self.cleaner.clean(&item.mask);
                if self.config.debug {
                    debug!(
                        "{}: {} px after cleanup, from [{}]",
                        item.category,
                        item.area(),
                        item.classes.join(", ")
                    );
                }
            }
            timings.postprocessing_ms = start.elapsed().as_millis() as u64;
            masks
        };

        let items: Vec<ParsedItem> = {
            let _span = span!(Level::DEBUG, "cutout", items = masks.len()).entered();
            let start = Instant::now();
            let items = masks
                .into_iter()
                .map(|item| ParsedItem {
                    category: item.category,
                    cutout: CutoutExtractor::extract(&rgb, &item.mask, self.config.cutout_padding),
                })
                .collect();
            timings.cutout_ms = start.elapsed().as_millis() as u64;
            items
        };

        timings.total_ms = total_start.elapsed().as_millis() as u64;
        trace_info!(
            items = items.len(),
            total_ms = timings.total_ms,
            inference_ms = timings.inference_ms,
            "Parsing complete"
        );
        if self.config.debug {
            debug!(
                "Stage timings: {:?} ({:.0}% inference)",
                timings,
                timings.inference_ratio() * 100.0
            );
        }

        Ok(ParseOutput {
            items,
            parsing,
            dimensions: (width, height),
            timings,
        })
    }

    /// Decode raw upload bytes, then run the pipeline
    ///
    /// # Errors
    /// - Bytes are not a decodable image ([`WardrobeError::Decode`])
    /// - Any [`Self::parse_image`] failure
    pub fn parse_bytes(&self, image_bytes: &[u8]) -> Result<ParseOutput> {
        let decode_start = Instant::now();
        let image = ImageIOService::load_from_bytes(image_bytes, self.config.max_image_pixels)?;
        let decode_ms = decode_start.elapsed().as_millis() as u64;

        let mut output = self.parse_image(&image)?;
        output.timings.image_decode_ms = decode_ms;
        output.timings.total_ms += decode_ms;
        Ok(output)
    }

    /// Parse and encode for the wire. Never fails: every error becomes a
    /// soft-failure response carrying the error message.
    pub fn respond(&self, image_bytes: &[u8]) -> ParseResponse {
        match self.encode_items(image_bytes) {
            Ok(items) => ParseResponse::success(items),
            Err(e) => {
                trace_warn!(error = %e, "Parse request failed");
                ParseResponse::failure(e.to_string())
            },
        }
    }

    fn encode_items(&self, image_bytes: &[u8]) -> Result<Vec<ResponseItem>> {
        let mut output = self.parse_bytes(image_bytes)?;

        let encode_start = Instant::now();
        let items = output
            .items
            .iter()
            .map(OutputFormatHandler::encode_item)
            .collect::<Result<Vec<_>>>()?;
        let encode_ms = encode_start.elapsed().as_millis() as u64;
        output.timings.encode_ms = Some(encode_ms);
        output.timings.total_ms += encode_ms;

        trace_info!(
            items = items.len(),
            encode_ms,
            total_ms = output.timings.total_ms,
            "Response encoded"
        );
        debug!("Encoded categories: {:?}", output.categories());
        Ok(items)
    }

    /// Pixel count of every class present in the parsing map
    fn log_class_areas(&self, parsing: &ParsingMap) {
        let dataset = self.engine.dataset();
        for class_index in 0..dataset.num_classes {
            let Ok(class) = u8::try_from(class_index) else {
                break;
            };
            let count = parsing.pixel_count(class);
            if count > 0 {
                debug!(
                    "class {} ({}): {} px",
                    class_index,
                    dataset.label(class_index).unwrap_or("unknown"),
                    count
                );
            }
        }
    }
}

impl std::fmt::Debug for WardrobeParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WardrobeParser")
            .field("config", &self.config)
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}
