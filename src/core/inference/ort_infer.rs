//! ONNX Runtime engine holding one session for the loaded network.

use crate::core::{batch::Tensor4D, errors::SegError, traits::InferenceEngine};
use ort::session::Session;
use std::path::PathBuf;
use std::sync::Mutex;

#[path = "ort_infer_builders.rs"]
mod ort_infer_builders;
#[path = "ort_infer_config.rs"]
mod ort_infer_config;
#[path = "ort_infer_execution.rs"]
mod ort_infer_execution;

/// A loaded ONNX model.
///
/// `Session::run` needs exclusive access, so window batches from parallel
/// callers are serialized on the mutex.
pub struct OrtInfer {
    pub(super) session: Mutex<Session>,
    pub(super) input_name: String,
    pub(super) output_name: String,
    pub(super) input_shape: Option<Vec<i64>>,
    pub(super) model_path: PathBuf,
    pub(super) model_name: String,
}

impl std::fmt::Debug for OrtInfer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrtInfer")
            .field("input_name", &self.input_name)
            .field("output_name", &self.output_name)
            .field("input_shape", &self.input_shape)
            .field("model_path", &self.model_path)
            .finish()
    }
}

impl OrtInfer {
    /// Shape of the first model input as declared in the graph.
    ///
    /// Dynamic dimensions are reported as -1. `None` when the input is not a tensor.
    pub fn primary_input_shape(&self) -> Option<&[i64]> {
        self.input_shape.as_deref()
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }
}

impl InferenceEngine for OrtInfer {
    type Input = Tensor4D;
    type Output = Tensor4D;

    fn infer(&self, input: &Self::Input) -> Result<Self::Output, SegError> {
        self.infer_4d(input)
    }

    fn engine_info(&self) -> String {
        format!(
            "ONNX Runtime '{}' ({} -> {})",
            self.model_name, self.input_name, self.output_name
        )
    }

    fn validate_inference_input(&self, input: &Self::Input) -> Result<(), SegError> {
        if input.is_empty() {
            return Err(SegError::invalid_input(format!(
                "empty input batch for model '{}': shape {:?}",
                self.model_name,
                input.shape()
            )));
        }
        Ok(())
    }
}
