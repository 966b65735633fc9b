//! The segmentation pipeline.
//!
//! # Main APIs
//!
//! - [`create_case_list`] and [`discover_cases`] build the work list
//! - [`SegmentationPipelineBuilder`] wires preprocessing, the network and the
//!   saver into a [`SegmentationPipeline`]
//! - [`SegmentationSaver`] writes masks using an [`OutputNaming`] rule

pub mod discovery;
pub mod runner;
pub mod saver;

pub use discovery::{create_case_list, discover_cases, is_nifti};
pub use runner::{
    FailedCase, ProcessedCase, RunReport, SegmentationPipeline, SegmentationPipelineBuilder,
};
pub use saver::{OutputNaming, SegmentationSaver};
