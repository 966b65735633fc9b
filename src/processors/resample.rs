//! Affine-to-affine resampling of label volumes.
//!
//! Used to map a prediction made on the preprocessed grid back onto the grid
//! of the input image. Nearest-neighbour sampling keeps labels discrete;
//! coordinates falling outside the source are clamped to its border.

use crate::core::errors::VolumeError;
use nalgebra::{Matrix4, Vector4};
use ndarray::{Array3, ArrayView3, Zip};

/// Resamples `source` (on `source_affine`) onto a grid of `target_shape`
/// voxels described by `target_affine`.
pub fn resample_nearest(
    source: ArrayView3<f32>,
    source_affine: &Matrix4<f64>,
    target_affine: &Matrix4<f64>,
    target_shape: [usize; 3],
) -> Result<Array3<f32>, VolumeError> {
    let (h, w, d) = source.dim();
    if h == 0 || w == 0 || d == 0 {
        return Err(VolumeError::EmptyAxis {
            shape: source.shape().to_vec(),
        });
    }
    let inverse = source_affine
        .try_inverse()
        .ok_or(VolumeError::SingularAffine)?;
    // target voxel -> world -> source voxel
    let mapping = inverse * target_affine;
    let limits = [h - 1, w - 1, d - 1];

    let mut out = Array3::<f32>::zeros((target_shape[0], target_shape[1], target_shape[2]));
    Zip::indexed(&mut out).par_for_each(|(i, j, k), value| {
        let voxel = mapping * Vector4::new(i as f64, j as f64, k as f64, 1.0);
        let mut idx = [0usize; 3];
        for axis in 0..3 {
            let rounded = voxel[axis].round();
            idx[axis] = if rounded <= 0.0 {
                0
            } else {
                (rounded as usize).min(limits[axis])
            };
        }
        *value = source[idx];
    });
    Ok(out)
}
