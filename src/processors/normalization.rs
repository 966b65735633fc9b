//! Intensity normalization for MRI volumes.
//!
//! Each channel is shifted and scaled to zero mean and unit variance over all
//! of its voxels, background included.

use crate::core::errors::{SegError, SegResult};
use crate::core::traits::VolumeTransform;
use crate::domain::CaseData;
use ndarray::{ArrayViewMut, Axis, Dimension};
use rayon::prelude::*;

/// Channel-wise z-score normalization.
///
/// Statistics are accumulated in `f64`. A channel with zero standard
/// deviation is only mean-shifted.
#[derive(Debug, Clone, Default)]
pub struct NormalizeIntensity;

impl NormalizeIntensity {
    pub fn new() -> Self {
        Self
    }

    /// Normalizes one channel in place, returning the `(mean, std)` used.
    pub fn normalize_channel<D: Dimension>(channel: &mut ArrayViewMut<f32, D>) -> (f64, f64) {
        let n = channel.len();
        if n == 0 {
            return (0.0, 1.0);
        }
        let (sum, sum_sq) = channel.iter().fold((0.0f64, 0.0f64), |(s, sq), &v| {
            let v = f64::from(v);
            (s + v, sq + v * v)
        });
        let mean = sum / n as f64;
        let variance = (sum_sq / n as f64 - mean * mean).max(0.0);
        let std = variance.sqrt();
        let divisor = if std > 0.0 { std } else { 1.0 };

        let (mean_f, div_f) = (mean as f32, divisor as f32);
        channel.mapv_inplace(|v| (v - mean_f) / div_f);
        (mean, std)
    }
}

impl VolumeTransform for NormalizeIntensity {
    fn apply(&self, mut data: CaseData) -> SegResult<CaseData> {
        if data.image.ndim() < 2 {
            return Err(SegError::invalid_input(format!(
                "normalization needs a channel-first image, got shape {:?}",
                data.image.shape()
            )));
        }
        data.image
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .for_each(|mut channel| {
                Self::normalize_channel(&mut channel);
            });
        Ok(data)
    }

    fn name(&self) -> &'static str {
        "NormalizeIntensity"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CaseDescriptor;
    use ndarray::{Array1, Array4};

    #[test]
    fn channels_get_zero_mean_unit_std() {
        let mut data = CaseData::new(CaseDescriptor::new("x.nii"));
        let mut image = Array4::<f32>::zeros((2, 2, 2, 1));
        image
            .index_axis_mut(Axis(0), 0)
            .iter_mut()
            .enumerate()
            .for_each(|(i, v)| *v = i as f32);
        image.index_axis_mut(Axis(0), 1).fill(100.0);
        data.image = image.into_dyn();

        let out = NormalizeIntensity::new().apply(data).unwrap();
        let first = out.image.index_axis(Axis(0), 0);
        let mean: f32 = first.iter().sum::<f32>() / first.len() as f32;
        let var: f32 = first.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / first.len() as f32;
        assert!(mean.abs() < 1e-5);
        assert!((var - 1.0).abs() < 1e-4);

        // Constant channel: std is zero, so only the mean is removed.
        assert!(out.image.index_axis(Axis(0), 1).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn reports_statistics() {
        let mut values = Array1::from(vec![1.0f32, 3.0]);
        let (mean, std) = NormalizeIntensity::normalize_channel(&mut values.view_mut());
        assert_eq!(mean, 2.0);
        assert_eq!(std, 1.0);
        assert_eq!(values.to_vec(), vec![-1.0, 1.0]);
    }
}
