//! Core error types for the segmentation pipeline.
//!
//! This module defines the fundamental error types used throughout the crate,
//! including the main [`SegError`] enum and the [`ProcessingStage`] enum used to
//! tag where a processing failure happened.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by volume-level operations (resampling, flipping, tiling).
#[derive(Debug, Error)]
pub enum VolumeError {
    /// The volume has a zero-sized axis.
    #[error("volume has an empty axis: shape {shape:?}")]
    EmptyAxis {
        /// Shape of the offending volume.
        shape: Vec<usize>,
    },
    /// The target spacing is not a positive finite number.
    #[error("invalid target spacing {0}")]
    InvalidSpacing(f64),
    /// The affine matrix cannot be inverted.
    #[error("affine matrix is singular")]
    SingularAffine,
}

/// Stages of the pipeline, used to give processing errors context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Reading a volume from disk.
    Loading,
    /// In-plane resampling to the target spacing.
    Spacing,
    /// Tensor operations (reshape, flip, tile).
    TensorOperation,
    /// Sliding-window inference.
    SlidingWindow,
    /// Activation and discretization of the prediction.
    PostProcessing,
    /// Resampling back to the original geometry.
    Resampling,
    /// Writing the mask to disk.
    Saving,
}

impl std::fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingStage::Loading => write!(f, "loading"),
            ProcessingStage::Spacing => write!(f, "in-plane spacing"),
            ProcessingStage::TensorOperation => write!(f, "tensor operation"),
            ProcessingStage::SlidingWindow => write!(f, "sliding window inference"),
            ProcessingStage::PostProcessing => write!(f, "post-processing"),
            ProcessingStage::Resampling => write!(f, "resampling"),
            ProcessingStage::Saving => write!(f, "saving"),
        }
    }
}

/// Enum representing the errors that can occur in the segmentation pipeline.
#[derive(Error, Debug)]
pub enum SegError {
    /// An input file named on the command line does not exist.
    #[error("expected image file: {} not found", path.display())]
    InputNotFound {
        /// The missing path.
        path: PathBuf,
    },

    /// Error occurred while reading or writing a NIfTI volume.
    #[error("nifti '{}': {message}", path.display())]
    Nifti {
        /// The file being read or written.
        path: PathBuf,
        /// What went wrong.
        message: String,
        /// The underlying error, when one exists.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Error occurred during processing.
    #[error("{kind} failed: {context}")]
    Processing {
        /// The stage of processing where the error occurred.
        kind: ProcessingStage,
        /// Additional context about the error.
        context: String,
        /// The underlying error that caused this error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Error occurred during inference.
    #[error("inference failed in model '{model_name}': {context}")]
    Inference {
        /// The name of the model where inference failed.
        model_name: String,
        /// Additional context about the inference error.
        context: String,
        /// The underlying error that caused this error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Error occurred during a forward pass with detailed context.
    #[error(
        "model '{model_name}' inference failed: {operation} on batch[{batch_index}] with input shape {input_shape:?}"
    )]
    ModelInference {
        /// The name of the model where inference failed.
        model_name: String,
        /// The operation that failed (e.g. "forward_pass").
        operation: String,
        /// Index of the window batch that failed.
        batch_index: usize,
        /// The input tensor shape.
        input_shape: Vec<usize>,
        /// Additional context about the error.
        context: String,
        /// The underlying error that caused this error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Error indicating invalid input.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// A message describing the invalid input.
        message: String,
    },

    /// Error indicating a configuration problem.
    #[error("configuration: {message}")]
    ConfigError {
        /// A message describing the configuration error.
        message: String,
    },

    /// Error from the ONNX Runtime session.
    #[error(transparent)]
    Session(#[from] ort::Error),

    /// Error from tensor operations with detailed context.
    #[error(
        "tensor operation '{operation}' failed: expected shape {expected_shape:?}, got {actual_shape:?} in {context}"
    )]
    TensorOperation {
        /// The tensor operation that failed.
        operation: String,
        /// The expected tensor shape.
        expected_shape: Vec<usize>,
        /// The actual tensor shape.
        actual_shape: Vec<usize>,
        /// Additional context about where the error occurred.
        context: String,
        /// The underlying error that caused this error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Error from basic tensor operations (fallback for ndarray errors).
    #[error("tensor operation")]
    Tensor(#[from] ndarray::ShapeError),

    /// IO error.
    #[error("io")]
    Io(#[from] std::io::Error),

    /// Error loading a model file, with context and suggestions.
    #[error("model load failed for '{model_path}': {reason}{suggestion}")]
    ModelLoad {
        /// Path to the model that failed to load
        model_path: String,
        /// Short reason string
        reason: String,
        /// Optional suggestion (prefixed with '; ' when present)
        suggestion: String,
        /// Underlying source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Convenient result alias used across the crate.
pub type SegResult<T> = Result<T, SegError>;

impl From<crate::core::config::ConfigError> for SegError {
    fn from(error: crate::core::config::ConfigError) -> Self {
        Self::ConfigError {
            message: error.to_string(),
        }
    }
}

impl From<VolumeError> for SegError {
    fn from(error: VolumeError) -> Self {
        Self::Processing {
            kind: ProcessingStage::TensorOperation,
            context: "volume operation failed".to_string(),
            source: Box::new(error),
        }
    }
}

/// A plain message error, used as the `source` of wrapped errors that have no
/// underlying cause of their own.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct SimpleError(String);

impl SimpleError {
    /// Creates a new message error.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_not_found_names_the_path() {
        let err = SegError::InputNotFound {
            path: PathBuf::from("/data/image/case_reo/x.nii.gz"),
        };
        assert_eq!(
            err.to_string(),
            "expected image file: /data/image/case_reo/x.nii.gz not found"
        );
    }

    #[test]
    fn volume_error_maps_to_tensor_stage() {
        let err: SegError = VolumeError::SingularAffine.into();
        match err {
            SegError::Processing { kind, .. } => assert_eq!(kind, ProcessingStage::TensorOperation),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
