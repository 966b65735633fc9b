//! In-plane resampling to a target voxel spacing.
//!
//! Only the two in-plane axes (H, W) are resampled; the through-plane axis is
//! left untouched so every output slice comes from exactly one input slice.
//! Voxel 0 keeps its world position, which makes the voxel-space mapping a
//! pure per-axis scaling: `old = new * target / current`.

use crate::core::errors::{ProcessingStage, SegError, SegResult, VolumeError};
use crate::core::traits::VolumeTransform;
use crate::domain::CaseData;
use crate::utils::nifti::voxel_sizes;
use nalgebra::Matrix4;
use ndarray::{Array4, ArrayView2, ArrayView4, Axis, Zip};
use tracing::debug;

/// Number of samples along an axis of `n` voxels after resampling from
/// `current` to `target` spacing.
pub fn inplane_output_size(n: usize, current: f64, target: f64) -> usize {
    if n == 0 {
        return 0;
    }
    ((n - 1) as f64 * current / target).round() as usize + 1
}

/// Bilinear sample of a plane at fractional coordinates, clamped to the border.
fn sample_bilinear(plane: &ArrayView2<f32>, x: f64, y: f64) -> f32 {
    let (h, w) = plane.dim();
    let x = x.clamp(0.0, (h - 1) as f64);
    let y = y.clamp(0.0, (w - 1) as f64);
    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(h - 1);
    let y1 = (y0 + 1).min(w - 1);
    let fx = (x - x0 as f64) as f32;
    let fy = (y - y0 as f64) as f32;

    let top = plane[[x0, y0]] * (1.0 - fy) + plane[[x0, y1]] * fy;
    let bottom = plane[[x1, y0]] * (1.0 - fy) + plane[[x1, y1]] * fy;
    top * (1.0 - fx) + bottom * fx
}

/// Resamples the in-plane axes of a `(C, H, W, D)` volume.
pub fn resample_inplane(
    volume: ArrayView4<f32>,
    current: [f64; 2],
    target: [f64; 2],
) -> Result<Array4<f32>, VolumeError> {
    for &t in &target {
        if !t.is_finite() || t <= 0.0 {
            return Err(VolumeError::InvalidSpacing(t));
        }
    }
    for &c in &current {
        if !c.is_finite() || c <= 0.0 {
            return Err(VolumeError::InvalidSpacing(c));
        }
    }
    let (channels, h, w, d) = volume.dim();
    if channels == 0 || h == 0 || w == 0 || d == 0 {
        return Err(VolumeError::EmptyAxis {
            shape: volume.shape().to_vec(),
        });
    }

    let new_h = inplane_output_size(h, current[0], target[0]);
    let new_w = inplane_output_size(w, current[1], target[1]);
    let scale = [target[0] / current[0], target[1] / current[1]];

    let mut out = Array4::<f32>::zeros((channels, new_h, new_w, d));
    Zip::indexed(&mut out).par_for_each(|(c, i, j, k), value| {
        let plane = volume
            .index_axis(Axis(0), c)
            .index_axis_move(Axis(2), k);
        *value = sample_bilinear(&plane, i as f64 * scale[0], j as f64 * scale[1]);
    });
    Ok(out)
}

/// Scales the first two affine columns so voxel sizes become `target`.
pub fn zoom_inplane_affine(affine: &Matrix4<f64>, target: [f64; 2]) -> Matrix4<f64> {
    let current = voxel_sizes(affine);
    let mut zoomed = *affine;
    for axis in 0..2 {
        if current[axis] > 0.0 {
            let factor = target[axis] / current[axis];
            for row in 0..3 {
                zoomed[(row, axis)] *= factor;
            }
        }
    }
    zoomed
}

/// Resamples the image in-plane to the configured spacing and updates the
/// case affine; `original_affine` is left as loaded.
#[derive(Debug, Clone)]
pub struct InPlaneSpacing {
    target: [f64; 2],
}

impl InPlaneSpacing {
    pub fn new(target: [f64; 2]) -> SegResult<Self> {
        if let Some(bad) = target.iter().find(|t| !t.is_finite() || **t <= 0.0) {
            return Err(SegError::invalid_field(
                "inference.spacing",
                "positive in-plane spacing",
                bad.to_string(),
            ));
        }
        Ok(Self { target })
    }
}

impl VolumeTransform for InPlaneSpacing {
    fn apply(&self, mut data: CaseData) -> SegResult<CaseData> {
        let affine = data.metadata()?.affine;
        let current = voxel_sizes(&affine);
        let resampled = resample_inplane(
            data.channel_first()?,
            [current[0], current[1]],
            self.target,
        )
        .map_err(|e| {
            SegError::processing(
                ProcessingStage::Spacing,
                format!("case '{}'", data.descriptor.input.display()),
                e,
            )
        })?;
        debug!(
            "in-plane spacing {:?} -> {:?}: shape {:?} -> {:?}",
            [current[0], current[1]],
            self.target,
            data.image.shape(),
            resampled.shape()
        );

        let metadata = data.metadata_mut()?;
        metadata.affine = zoom_inplane_affine(&affine, self.target);
        metadata.pixdim = voxel_sizes(&metadata.affine);
        data.image = resampled.into_dyn();
        Ok(data)
    }

    fn name(&self) -> &'static str {
        "InPlaneSpacing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CaseDescriptor, CaseMetadata};
    use ndarray::Array4;

    #[test]
    fn output_size_keeps_voxel_zero() {
        assert_eq!(inplane_output_size(10, 1.0, 1.0), 10);
        assert_eq!(inplane_output_size(10, 1.0, 0.5), 19);
        assert_eq!(inplane_output_size(10, 1.0, 2.0), 6);
        assert_eq!(inplane_output_size(1, 1.0, 0.8), 1);
        assert_eq!(inplane_output_size(0, 1.0, 0.8), 0);
    }

    #[test]
    fn identity_spacing_is_a_no_op() {
        let volume = Array4::from_shape_fn((1, 4, 3, 2), |(_, i, j, k)| (i * 10 + j + k * 100) as f32);
        let out = resample_inplane(volume.view(), [0.8, 0.8], [0.8, 0.8]).unwrap();
        assert_eq!(out, volume);
    }

    #[test]
    fn upsampling_interpolates_linearly_and_leaves_depth_alone() {
        // Values grow linearly along H, so bilinear samples stay on the line.
        let volume = Array4::from_shape_fn((1, 3, 2, 4), |(_, i, _, _)| i as f32 * 2.0);
        let out = resample_inplane(volume.view(), [1.0, 1.0], [0.5, 1.0]).unwrap();
        assert_eq!(out.dim(), (1, 5, 2, 4));
        for i in 0..5 {
            assert!((out[[0, i, 1, 3]] - i as f32).abs() < 1e-6);
        }
    }

    #[test]
    fn rejects_non_positive_spacing() {
        let volume = Array4::<f32>::zeros((1, 2, 2, 1));
        assert!(matches!(
            resample_inplane(volume.view(), [1.0, 1.0], [0.0, 1.0]),
            Err(VolumeError::InvalidSpacing(_))
        ));
        assert!(InPlaneSpacing::new([-1.0, 1.0]).is_err());
    }

    #[test]
    fn transform_updates_affine_but_not_original() {
        let affine = Matrix4::new(
            1.0, 0.0, 0.0, 3.0, //
            0.0, 1.0, 0.0, 4.0, //
            0.0, 0.0, 2.0, 5.0, //
            0.0, 0.0, 0.0, 1.0,
        );
        let mut descriptor = CaseDescriptor::new("case.nii.gz");
        descriptor.metadata = Some(CaseMetadata::loaded(
            "case.nii.gz",
            affine,
            [5, 5, 2],
            [1.0, 1.0, 2.0],
        ));
        let mut data = CaseData::new(descriptor);
        data.image = Array4::<f32>::ones((1, 5, 5, 2)).into_dyn();

        let out = InPlaneSpacing::new([0.5, 2.0]).unwrap().apply(data).unwrap();
        assert_eq!(out.image.shape(), &[1, 9, 3, 2]);
        let meta = out.metadata().unwrap();
        assert_eq!(meta.original_affine, affine);
        assert_eq!(meta.affine[(0, 0)], 0.5);
        assert_eq!(meta.affine[(1, 1)], 2.0);
        assert_eq!(meta.affine[(2, 2)], 2.0);
        assert_eq!(meta.affine[(0, 3)], 3.0);
        assert_eq!(meta.pixdim, [0.5, 2.0, 2.0]);
    }
}
