//! # fetal-seg
//!
//! Fetal brain MRI segmentation. Volumes are resampled in-plane to the
//! training spacing, normalized, segmented slice by slice with a 2D DynUNet
//! exported to ONNX, and written back as NIfTI label maps on the input grid.
//!
//! ## Modules
//!
//! * [`core`] - Configuration, errors, traits and the ONNX Runtime engine
//! * [`domain`] - Case descriptors, metadata and predictions
//! * [`models`] - DynUNet topology and its binding to an ONNX export
//! * [`predictors`] - Sliding-window inference, flip averaging, discretization
//! * [`processors`] - Loading, spacing, normalization and resampling
//! * [`pipeline`] - Case discovery, orchestration and saving
//! * [`utils`] - NIfTI I/O and logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fetal_seg::prelude::*;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = SegmentationConfig::from_yaml_file("config.yml")?;
//! config.resolve_model_path(Some(Path::new("models/dynunet.onnx")))?;
//!
//! let mut pipeline = SegmentationPipelineBuilder::new(config).build()?;
//! let cases = discover_cases(Path::new("/data/image"), pipeline.naming())?;
//! let report = pipeline.run(cases)?;
//! println!("{} masks written, {} failed", report.processed.len(), report.failed.len());
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod domain;
pub mod models;
pub mod pipeline;
pub mod predictors;
pub mod processors;
pub mod utils;

/// Prelude module for convenient imports.
///
/// ```rust
/// use fetal_seg::prelude::*;
/// ```
pub mod prelude {
    pub use crate::core::{SegError, SegResult, SegmentationConfig};
    pub use crate::domain::{CaseDescriptor, Prediction};
    pub use crate::pipeline::{
        OutputNaming, RunReport, SegmentationPipeline, SegmentationPipelineBuilder,
        create_case_list, discover_cases,
    };
    pub use crate::utils::NiftiVolume;
}
