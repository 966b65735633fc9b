//! Error types for the segmentation pipeline.
//!
//! # Usage
//!
//! ```rust
//! use fetal_seg::core::errors::{ProcessingStage, SegError};
//!
//! let error = SegError::processing(
//!     ProcessingStage::Spacing,
//!     "failed to resample case_01",
//!     std::io::Error::new(std::io::ErrorKind::InvalidData, "empty axis"),
//! );
//! assert!(error.to_string().starts_with("in-plane spacing failed"));
//! ```

mod constructors;
mod types;

pub use types::{ProcessingStage, SegError, SegResult, SimpleError, VolumeError};
