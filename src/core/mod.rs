//! The core module of the segmentation pipeline.
//!
//! This module contains the fundamental components of the pipeline, including:
//! - Tensor aliases
//! - Configuration management
//! - Error handling
//! - Inference engine integration
//! - Traits defining the seams between pipeline stages
//!
//! It also provides re-exports of commonly used types for convenience.

pub mod batch;
pub mod config;
pub mod errors;
pub mod inference;
pub mod traits;

pub use batch::{Tensor3D, Tensor4D};
pub use config::{
    ConfigError, ConfigValidator, FailurePolicy, NamingMode, OrtExecutionProvider,
    OrtSessionConfig, ParallelPolicy, SegmentationConfig,
};
pub use errors::{ProcessingStage, SegError, SegResult, SimpleError, VolumeError};
pub use inference::OrtInfer;
pub use traits::{InferenceEngine, SegmentationNetwork, VolumeTransform};
