//! Backend implementations for different inference engines
//!
//! - ONNX Runtime backend (GPU acceleration through CUDA or CoreML)
//! - Tract backend (pure Rust, no external dependencies)
//! - Mock backend (deterministic output for tests and benchmarks)

#[cfg(feature = "onnx")]
pub mod onnx;

#[cfg(feature = "tract")]
pub mod tract;

pub mod mock;

// Re-export backends based on enabled features
#[cfg(feature = "onnx")]
pub use self::onnx::OnnxBackend;

#[cfg(feature = "tract")]
pub use self::tract::TractBackend;

pub use self::mock::MockBackend;
