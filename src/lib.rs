#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # Wardrobe Parse
//!
//! Human-parsing wardrobe extractor. Given a photo of a person, the pipeline
//! segments clothing regions with a self-correcting human-parsing network,
//! merges the regions into wardrobe items (top, outerwear, pants, shoes, ...)
//! and returns each item as a transparent PNG cutout.
//!
//! ## Pipeline
//!
//! 1. **Frame warp**: the image is fitted, aspect preserved, into the network
//!    frame with an affine warp ([`utils::transform`]).
//! 2. **Inference**: the exported network runs on ONNX Runtime or Tract
//!    ([`backends`]); the finest parsing head is kept.
//! 3. **Remap**: logits are warped back to original resolution and reduced to
//!    a per-pixel class map ([`utils::remap`]).
//! 4. **Aggregation**: classes are merged into items and small regions dropped
//!    ([`utils::aggregate`]).
//! 5. **Cleanup**: each item mask is opened then closed with an elliptical
//!    element ([`utils::morphology`]).
//! 6. **Cutout**: masks become alpha channels and are cropped with padding
//!    ([`utils::cutout`]).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use wardrobe_parse::{Dataset, ParserConfig, WardrobeParser};
//!
//! # fn example() -> anyhow::Result<()> {
//! let config = ParserConfig::builder()
//!     .dataset(Dataset::Lip)
//!     .weights_path("checkpoints/lip.onnx")
//!     .build()?;
//! let parser = WardrobeParser::new(config)?;
//!
//! let image = image::open("person.jpg")?;
//! for item in parser.parse_image(&image)?.items {
//!     item.cutout.save(format!("{}.png", item.category))?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `onnx` (default): ONNX Runtime backend with CUDA and CoreML support
//! - `tract` (default): Pure Rust backend
//! - `server`: HTTP API (`POST /parse`, `GET /health`)
//! - `cli` (default): `wardrobe-parse` binary, implies `server`
//! - `tracing-json`: JSON log output

pub mod backends;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod inference;
pub mod models;
pub mod processor;
#[cfg(feature = "server")]
pub mod server;
pub mod services;
pub mod tracing_config;
pub mod types;
pub mod utils;

// Public API exports
pub use backends::MockBackend;
#[cfg(feature = "onnx")]
pub use backends::OnnxBackend;
#[cfg(feature = "tract")]
pub use backends::TractBackend;
pub use config::{ExecutionProvider, ParserConfig, ParserConfigBuilder};
pub use error::{Result, WardrobeError};
pub use inference::{InferenceBackend, ParsingEngine};
pub use models::{Dataset, DatasetConfig, ItemCategory, ModelManager};
pub use processor::{BackendFactory, BackendType, DefaultBackendFactory, WardrobeParser};
pub use services::{ImageIOService, OutputFormatHandler};
pub use types::{
    ItemMask, ParseOutput, ParseResponse, ParsedItem, ParsingMap, ProcessingTimings, ResponseItem,
};
pub use utils::{ExecutionProviderManager, MinPixelRule, ProviderInfo};

#[cfg(feature = "cli")]
pub use tracing_config::init_cli_tracing;
pub use tracing_config::{spans, TracingConfig, TracingFormat};
