//! Validation helpers for tensors and network parameters

pub mod tensor;
pub mod weights;

pub use tensor::TensorValidator;
pub use weights::ParameterReport;
