//! Structures and helpers for ONNX Runtime inference.
//!
//! This module holds the low level inference engine used by the segmentation
//! network wrapper in [`crate::models`].

pub mod ort_infer;

pub use ort_infer::OrtInfer;
