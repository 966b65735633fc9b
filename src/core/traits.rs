//! Traits at the seams of the segmentation pipeline.
//!
//! ```text
//! ┌───────────────┐    ┌────────────────────┐    ┌───────────────┐
//! │VolumeTransform│───▶│SegmentationNetwork │───▶│ Postprocessing│
//! │• apply        │    │• infer             │    │ (activation,  │
//! │• name         │    │• out_channels      │    │  discretize)  │
//! └───────────────┘    └────────────────────┘    └───────────────┘
//! ```

use crate::core::batch::Tensor4D;
use crate::core::errors::SegError;
use crate::domain::CaseData;
use std::fmt::Debug;

/// Trait for inference engine operations.
///
/// This trait handles running the actual model inference, whether through
/// ONNX Runtime or an in-process stand-in used by tests.
pub trait InferenceEngine: Send + Sync + Debug {
    /// Input type for inference (typically a tensor)
    type Input: Send + Sync + Debug;

    /// Output type from inference (typically a tensor)
    type Output: Send + Sync + Debug;

    /// Perform inference on preprocessed input.
    fn infer(&self, input: &Self::Input) -> Result<Self::Output, SegError>;

    /// Get information about the inference engine.
    fn engine_info(&self) -> String;

    /// Validate that the input is suitable for inference.
    fn validate_inference_input(&self, _input: &Self::Input) -> Result<(), SegError> {
        Ok(())
    }
}

/// A 2D segmentation network mapping `(B, C_in, h, w)` windows to
/// `(B, C_out, h, w)` logits.
pub trait SegmentationNetwork: InferenceEngine<Input = Tensor4D, Output = Tensor4D> {
    /// Number of output channels produced per pixel.
    fn out_channels(&self) -> usize;
}

/// One step of the preprocessing chain.
///
/// Transforms take the case by value and hand it back modified, so metadata
/// updates (affine, spacing) travel with the array they describe.
pub trait VolumeTransform: Send + Sync + Debug {
    /// Applies the transform.
    fn apply(&self, data: CaseData) -> Result<CaseData, SegError>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}
