//! Error constructor helpers.
//!
//! Ergonomic functions for building [`SegError`] values with the right context
//! and error chaining, so call sites stay one line long.

use super::types::{ProcessingStage, SegError, SimpleError};
use std::path::Path;

impl SegError {
    /// Wraps an error that happened in a given processing stage.
    pub fn processing(
        kind: ProcessingStage,
        context: impl Into<String>,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Processing {
            kind,
            context: context.into(),
            source: Box::new(error),
        }
    }

    /// A processing error with a message and no underlying cause.
    pub fn processing_message(kind: ProcessingStage, message: impl Into<String>) -> Self {
        let message = message.into();
        Self::Processing {
            kind,
            context: message.clone(),
            source: Box::new(SimpleError::new(message)),
        }
    }

    /// Creates an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Creates a configuration error for an invalid field value.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use fetal_seg::core::SegError;
    /// let err = SegError::invalid_field("nr_out_channels", "a value >= 1", "0");
    /// assert!(matches!(err, SegError::ConfigError { .. }));
    /// ```
    pub fn invalid_field(
        field: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::ConfigError {
            message: format!(
                "invalid value for field '{}': expected {}, got {}",
                field.into(),
                expected.into(),
                actual.into()
            ),
        }
    }

    /// Creates a NIfTI read/write error.
    pub fn nifti(
        path: impl AsRef<Path>,
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Nifti {
            path: path.as_ref().to_path_buf(),
            message: message.into(),
            source,
        }
    }

    /// Creates an inference error for the named model.
    pub fn inference_error(
        model_name: &str,
        context: &str,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Inference {
            model_name: model_name.to_string(),
            context: context.to_string(),
            source: Box::new(error),
        }
    }

    /// Creates a detailed forward-pass error.
    pub fn model_inference_error(
        model_name: &str,
        operation: &str,
        batch_index: usize,
        input_shape: &[usize],
        context: &str,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::ModelInference {
            model_name: model_name.to_string(),
            operation: operation.to_string(),
            batch_index,
            input_shape: input_shape.to_vec(),
            context: context.to_string(),
            source: Box::new(error),
        }
    }

    /// Creates a model loading error with an optional suggested fix.
    pub fn model_load_error(
        model_path: impl AsRef<Path>,
        reason: impl Into<String>,
        suggestion: Option<&str>,
        source: Option<impl std::error::Error + Send + Sync + 'static>,
    ) -> Self {
        let suggestion = suggestion
            .map(|s| format!("; suggested fix: {}", s))
            .unwrap_or_default();
        Self::ModelLoad {
            model_path: model_path.as_ref().display().to_string(),
            reason: reason.into(),
            suggestion,
            source: source.map(|e| Box::new(e) as _),
        }
    }

    /// Creates a tensor error with expected and actual shapes.
    pub fn tensor_operation_error(
        operation: &str,
        expected_shape: &[usize],
        actual_shape: &[usize],
        context: &str,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::TensorOperation {
            operation: operation.to_string(),
            expected_shape: expected_shape.to_vec(),
            actual_shape: actual_shape.to_vec(),
            context: context.to_string(),
            source: Box::new(error),
        }
    }

    /// Shape mismatch without an underlying cause.
    pub fn shape_mismatch(
        operation: &str,
        expected_shape: &[usize],
        actual_shape: &[usize],
        context: &str,
    ) -> Self {
        Self::tensor_operation_error(
            operation,
            expected_shape,
            actual_shape,
            context,
            SimpleError::new("shape mismatch"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_load_error_formats_suggestion() {
        let err = SegError::model_load_error(
            "models/dynunet.onnx",
            "trained model not found",
            Some("check inference.model_to_load"),
            None::<std::io::Error>,
        );
        assert_eq!(
            err.to_string(),
            "model load failed for 'models/dynunet.onnx': trained model not found; suggested fix: check inference.model_to_load"
        );
    }

    #[test]
    fn shape_mismatch_keeps_shapes() {
        let err = SegError::shape_mismatch("flip", &[1, 4, 4, 2], &[1, 4, 2], "tta");
        match err {
            SegError::TensorOperation {
                expected_shape,
                actual_shape,
                ..
            } => {
                assert_eq!(expected_shape, vec![1, 4, 4, 2]);
                assert_eq!(actual_shape, vec![1, 4, 2]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
