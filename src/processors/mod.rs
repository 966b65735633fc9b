//! Volume processing for the segmentation pipeline.
//!
//! # Modules
//!
//! * `load` - NIfTI loading into a case
//! * `channel` - Channel axis insertion and tensor finalization
//! * `spacing` - In-plane resampling to a target voxel spacing
//! * `normalization` - Channel-wise intensity normalization
//! * `compose` - Sequential composition of the above
//! * `resample` - Nearest-neighbour resampling between affine grids

mod channel;
mod compose;
mod load;
mod normalization;
pub mod resample;
pub mod spacing;

pub use channel::{AddChannel, ToTensor};
pub use compose::Compose;
pub use load::LoadNifti;
pub use normalization::NormalizeIntensity;
pub use resample::resample_nearest;
pub use spacing::{InPlaneSpacing, inplane_output_size, resample_inplane};
