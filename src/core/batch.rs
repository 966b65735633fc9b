//! Tensor aliases shared by the preprocessing, inference and post-processing
//! stages.
//!
//! Volumes are stored in `(H, W, D)` order, channel-first data in
//! `(C, H, W, D)` order and network batches in `(B, C, H, W)` order.

use ndarray::{Array3, Array4};

/// A single-channel volume, `(H, W, D)`.
pub type Tensor3D = Array3<f32>;

/// Channel-first volume `(C, H, W, D)` or a 2D network batch `(B, C, H, W)`.
pub type Tensor4D = Array4<f32>;
