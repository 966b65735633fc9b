//! Layout transforms: channel axis insertion and tensor finalization.

use crate::core::errors::{SegError, SegResult};
use crate::core::traits::VolumeTransform;
use crate::domain::CaseData;
use ndarray::Axis;

/// Turns an `(H, W, D)` volume into `(1, H, W, D)`.
#[derive(Debug, Clone, Default)]
pub struct AddChannel;

impl VolumeTransform for AddChannel {
    fn apply(&self, mut data: CaseData) -> SegResult<CaseData> {
        if data.image.ndim() != 3 {
            return Err(SegError::invalid_input(format!(
                "AddChannel expects a 3D volume, got shape {:?}",
                data.image.shape()
            )));
        }
        data.image = data.image.insert_axis(Axis(0));
        Ok(data)
    }

    fn name(&self) -> &'static str {
        "AddChannel"
    }
}

/// Makes the image a contiguous, row-major `(C, H, W, D)` f32 tensor.
#[derive(Debug, Clone, Default)]
pub struct ToTensor;

impl VolumeTransform for ToTensor {
    fn apply(&self, mut data: CaseData) -> SegResult<CaseData> {
        data.channel_first()?;
        if !data.image.is_standard_layout() {
            data.image = data.image.as_standard_layout().into_owned();
        }
        Ok(data)
    }

    fn name(&self) -> &'static str {
        "ToTensor"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CaseDescriptor;
    use ndarray::{Array3, Array4};

    #[test]
    fn add_channel_prepends_axis() {
        let mut data = CaseData::new(CaseDescriptor::new("x.nii"));
        data.image = Array3::<f32>::zeros((4, 5, 6)).into_dyn();
        let out = AddChannel.apply(data).unwrap();
        assert_eq!(out.image.shape(), &[1, 4, 5, 6]);
        assert!(AddChannel.apply(out).is_err());
    }

    #[test]
    fn to_tensor_makes_layout_standard() {
        let mut data = CaseData::new(CaseDescriptor::new("x.nii"));
        let mut image = Array4::<f32>::zeros((1, 3, 4, 2));
        image.swap_axes(1, 2);
        data.image = image.into_dyn();
        assert!(!data.image.is_standard_layout());
        let out = ToTensor.apply(data).unwrap();
        assert!(out.image.is_standard_layout());
        assert_eq!(out.image.shape(), &[1, 4, 3, 2]);
    }
}
