//! Configuration management for the segmentation pipeline.
//!
//! This module provides the YAML run configuration, validation traits, ONNX
//! Runtime session options and the parallel processing policy.

pub mod errors;
pub mod inference;
pub mod onnx;
pub mod parallel;

pub use errors::{ConfigError, ConfigValidator};
pub use inference::{
    DEFAULT_MODEL_KEYWORD, DeviceSection, FailurePolicy, InferenceSection, NamingMode,
    OutputSection, SegmentationConfig,
};
pub use onnx::*;
pub use parallel::ParallelPolicy;
