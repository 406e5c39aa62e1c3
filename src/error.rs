//! Error types for wardrobe parsing operations

use thiserror::Error;

/// Result type alias for wardrobe parsing operations
pub type Result<T> = std::result::Result<T, WardrobeError>;

/// Error types for the parsing pipeline and its service surface
#[derive(Error, Debug)]
pub enum WardrobeError {
    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image encoding or buffer errors
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Uploaded bytes could not be decoded as an image
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// Backend inference errors
    #[error("Inference error: {0}")]
    Inference(String),

    /// Invalid configuration or parameters (unknown dataset, device, backend)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Weight file loading or model initialization errors
    #[error("Model error: {0}")]
    Model(String),

    /// Tensor preparation, shape and geometry errors
    #[error("Processing error: {0}")]
    Processing(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WardrobeError {
    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new decode error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a new model error
    pub fn model<S: Into<String>>(msg: S) -> Self {
        Self::Model(msg.into())
    }

    /// Create a new processing error
    pub fn processing<S: Into<String>>(msg: S) -> Self {
        Self::Processing(msg.into())
    }

    /// Create a new inference error
    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error must stop the process from serving requests.
    ///
    /// Configuration and model errors are raised at startup; everything else
    /// is a per-request failure.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::InvalidConfig(_) | Self::Model(_))
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {} '{}': {}", operation, path_display, error),
        ))
    }

    /// Create model error with troubleshooting context
    pub fn model_error_with_context<P: AsRef<std::path::Path>>(
        operation: &str,
        model_path: P,
        error: &str,
        suggestions: &[&str],
    ) -> Self {
        let path_display = model_path.as_ref().display();
        let suggestion_text = if suggestions.is_empty() {
            String::new()
        } else {
            format!(" Suggestions: {}", suggestions.join(", "))
        };

        Self::Model(format!(
            "Failed to {} model '{}': {}.{}",
            operation, path_display, error, suggestion_text
        ))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
        recommended: Option<T>,
    ) -> Self {
        let recommendation = match recommended {
            Some(rec) => format!(" Recommended: {}", rec),
            None => String::new(),
        };

        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid range: {}).{}",
            parameter, value, valid_range, recommendation
        ))
    }

    /// Create processing error with stage context
    pub fn processing_stage_error(stage: &str, details: &str, input_info: Option<&str>) -> Self {
        let input_context = match input_info {
            Some(info) => format!(" (input: {})", info),
            None => String::new(),
        };

        Self::Processing(format!(
            "Processing failed at stage '{}'{}: {}",
            stage, input_context, details
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_error_creation() {
        let err = WardrobeError::invalid_config("unknown dataset");
        assert!(matches!(err, WardrobeError::InvalidConfig(_)));

        let err = WardrobeError::decode("not an image");
        assert!(matches!(err, WardrobeError::Decode(_)));
    }

    #[test]
    fn test_error_display() {
        let err = WardrobeError::invalid_config("Unknown dataset 'coco'");
        assert_eq!(
            err.to_string(),
            "Invalid configuration: Unknown dataset 'coco'"
        );
    }

    #[test]
    fn test_configuration_classification() {
        assert!(WardrobeError::invalid_config("x").is_configuration());
        assert!(WardrobeError::model("x").is_configuration());
        assert!(!WardrobeError::decode("x").is_configuration());
        assert!(!WardrobeError::inference("x").is_configuration());
        assert!(!WardrobeError::processing("x").is_configuration());
    }

    #[test]
    fn test_enhanced_error_context() {
        let err = WardrobeError::model_error_with_context(
            "load",
            Path::new("checkpoints/lip.onnx"),
            "file not found",
            &["check SCHP_CKPT", "export the checkpoint to ONNX"],
        );
        let error_string = err.to_string();
        assert!(error_string.contains("load"));
        assert!(error_string.contains("checkpoints/lip.onnx"));
        assert!(error_string.contains("Suggestions"));

        let err = WardrobeError::config_value_error("min pixel ratio", 1.5, "0.0-1.0", Some(0.0005));
        let error_string = err.to_string();
        assert!(error_string.contains("min pixel ratio"));
        assert!(error_string.contains("0.0-1.0"));
        assert!(error_string.contains("Recommended: 0.0005"));

        let err = WardrobeError::processing_stage_error(
            "remap",
            "singular transform",
            Some("640x480 RGB"),
        );
        let error_string = err.to_string();
        assert!(error_string.contains("remap"));
        assert!(error_string.contains("640x480 RGB"));
    }
}
