//! Deterministic stand-in backend for tests and benchmarks
//!
//! `MockBackend` behaves like a tiny parsing network: any frame pixel whose
//! normalized value exceeds 1.0 in some plane is labelled with a configurable
//! foreground class, everything else is background. It emits the same head
//! layout as a self-correcting parsing network (a coarse head, a parsing head,
//! a fused head and a one-channel edge head), so head selection is exercised
//! too.

use crate::{
    config::ParserConfig,
    error::{Result, WardrobeError},
    inference::InferenceBackend,
    models::{DatasetConfig, ModelInfo, PreprocessingConfig},
};
use instant::Duration;
use ndarray::Array4;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Logit assigned to the winning class of a pixel
const WINNING_LOGIT: f32 = 4.0;

/// Mock backend for testing
#[derive(Debug, Clone)]
pub struct MockBackend {
    dataset: DatasetConfig,
    foreground_class: usize,
    initialized: bool,
    should_fail_init: bool,
    should_fail_inference: bool,
    should_emit_nan: bool,
    calls: Arc<AtomicUsize>,
}

impl MockBackend {
    /// Mock for `dataset`; the foreground class defaults to `Upper-clothes`
    /// when the dataset has it, otherwise class 1.
    #[must_use]
    pub fn new(dataset: DatasetConfig) -> Self {
        let foreground_class = dataset
            .labels
            .iter()
            .position(|&label| label == "Upper-clothes")
            .unwrap_or(1);

        Self {
            dataset,
            foreground_class,
            initialized: false,
            should_fail_init: false,
            should_fail_inference: false,
            should_emit_nan: false,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Label bright pixels with `class_index` instead
    #[must_use]
    pub fn with_foreground_class(mut self, class_index: usize) -> Self {
        self.foreground_class = class_index;
        self
    }

    /// Create a mock backend that will fail during initialization
    #[must_use]
    pub fn failing_init(mut self) -> Self {
        self.should_fail_init = true;
        self
    }

    /// Create a mock backend that will fail during inference
    #[must_use]
    pub fn failing_inference(mut self) -> Self {
        self.should_fail_inference = true;
        self
    }

    /// Create a mock backend whose fused head contains a NaN logit
    #[must_use]
    pub fn emitting_nan(mut self) -> Self {
        self.should_emit_nan = true;
        self
    }

    /// Shared counter of `infer` calls, readable after the backend is boxed
    #[must_use]
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    #[allow(clippy::indexing_slicing)]
    fn fused_head(&self, input: &Array4<f32>) -> Array4<f32> {
        let (_, planes, height, width) = input.dim();
        let num_classes = self.dataset.num_classes;
        let mut head = Array4::<f32>::zeros((1, num_classes, height, width));

        for y in 0..height {
            for x in 0..width {
                let bright = (0..planes).any(|p| input[[0, p, y, x]] > 1.0);
                let class = if bright { self.foreground_class } else { 0 };
                head[[0, class, y, x]] = WINNING_LOGIT;
            }
        }

        head
    }
}

impl InferenceBackend for MockBackend {
    fn initialize(&mut self, _config: &ParserConfig) -> Result<Option<Duration>> {
        if self.should_fail_init {
            return Err(WardrobeError::model("Mock initialization failure"));
        }
        if self.foreground_class >= self.dataset.num_classes {
            return Err(WardrobeError::invalid_config(format!(
                "Mock foreground class {} outside {} classes",
                self.foreground_class, self.dataset.num_classes
            )));
        }
        if self.initialized {
            return Ok(None);
        }

        self.initialized = true;
        Ok(Some(Duration::from_millis(1)))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Vec<Array4<f32>>> {
        if !self.initialized {
            return Err(WardrobeError::internal("Backend not initialized"));
        }
        if self.should_fail_inference {
            return Err(WardrobeError::inference("Mock inference failure"));
        }
        self.calls.fetch_add(1, Ordering::SeqCst);

        let (_, _, height, width) = input.dim();
        let num_classes = self.dataset.num_classes;

        let coarse = Array4::<f32>::zeros((1, num_classes, (height / 2).max(1), (width / 2).max(1)));
        // Plain parsing head: background everywhere, same size as the fused head
        let mut parsing = Array4::<f32>::zeros((1, num_classes, height, width));
        parsing
            .index_axis_mut(ndarray::Axis(1), 0)
            .fill(WINNING_LOGIT);
        let mut fused = self.fused_head(input);
        if self.should_emit_nan {
            if let Some(first) = fused.iter_mut().next() {
                *first = f32::NAN;
            }
        }
        let edge = Array4::<f32>::zeros((1, 1, height, width));

        Ok(vec![coarse, parsing, fused, edge])
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        (
            1,
            3,
            self.dataset.input_size.0 as usize,
            self.dataset.input_size.1 as usize,
        )
    }

    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig> {
        Ok(PreprocessingConfig::for_dataset(&self.dataset))
    }

    fn get_model_info(&self) -> Result<ModelInfo> {
        Ok(ModelInfo {
            name: "mock-parsing-network".to_string(),
            dataset: self.dataset.dataset,
            size_bytes: 0,
            input_shape: self.input_shape(),
            num_classes: self.dataset.num_classes,
        })
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Dataset;

    #[test]
    fn test_mock_heads_layout() {
        let mut backend = MockBackend::new(Dataset::Lip.config());
        backend.initialize(&ParserConfig::default()).unwrap();

        let heads = backend.infer(&Array4::zeros((1, 3, 16, 16))).unwrap();
        let shapes: Vec<_> = heads.iter().map(|h| h.dim()).collect();
        assert_eq!(
            shapes,
            vec![(1, 20, 8, 8), (1, 20, 16, 16), (1, 20, 16, 16), (1, 1, 16, 16)]
        );
    }

    #[test]
    fn test_mock_labels_bright_pixels() {
        let mut backend = MockBackend::new(Dataset::Lip.config()).with_foreground_class(7);
        backend.initialize(&ParserConfig::default()).unwrap();

        let mut input = Array4::<f32>::from_elem((1, 3, 4, 4), -1.8);
        input[[0, 2, 1, 1]] = 2.2;

        let heads = backend.infer(&input).unwrap();
        let fused = &heads[2];
        assert_eq!(fused[[0, 7, 1, 1]], WINNING_LOGIT);
        assert_eq!(fused[[0, 0, 1, 1]], 0.0);
        assert_eq!(fused[[0, 0, 0, 0]], WINNING_LOGIT);
        assert_eq!(backend.call_counter().load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_mock_requires_initialization() {
        let mut backend = MockBackend::new(Dataset::Lip.config());
        assert!(!backend.is_initialized());
        assert!(backend.infer(&Array4::zeros((1, 3, 4, 4))).is_err());
    }

    #[test]
    fn test_mock_failure_modes() {
        let mut backend = MockBackend::new(Dataset::Lip.config()).failing_init();
        assert!(backend.initialize(&ParserConfig::default()).is_err());

        let mut backend = MockBackend::new(Dataset::Lip.config()).failing_inference();
        backend.initialize(&ParserConfig::default()).unwrap();
        assert!(backend.infer(&Array4::zeros((1, 3, 4, 4))).is_err());
    }

    #[test]
    fn test_mock_default_foreground_for_pascal() {
        // Pascal has no Upper-clothes label
        let mut backend = MockBackend::new(Dataset::Pascal.config());
        backend.initialize(&ParserConfig::default()).unwrap();
        let info = backend.get_model_info().unwrap();
        assert_eq!(info.num_classes, 7);
    }
}
