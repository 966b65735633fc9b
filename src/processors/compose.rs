//! Sequential composition of volume transforms.

use crate::core::errors::SegResult;
use crate::core::traits::VolumeTransform;
use crate::domain::CaseData;
use crate::processors::{AddChannel, InPlaneSpacing, LoadNifti, NormalizeIntensity, ToTensor};
use tracing::debug;

/// Applies transforms in order, threading the case through each.
#[derive(Debug, Default)]
pub struct Compose {
    transforms: Vec<Box<dyn VolumeTransform>>,
}

impl Compose {
    pub fn new(transforms: Vec<Box<dyn VolumeTransform>>) -> Self {
        Self { transforms }
    }

    /// The preprocessing chain the network was trained with:
    /// load, add channel, in-plane spacing, normalize, to tensor.
    pub fn inference_chain(target_spacing: [f64; 2]) -> SegResult<Self> {
        Ok(Self::new(vec![
            Box::new(LoadNifti),
            Box::new(AddChannel),
            Box::new(InPlaneSpacing::new(target_spacing)?),
            Box::new(NormalizeIntensity::new()),
            Box::new(ToTensor),
        ]))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.transforms.iter().map(|t| t.name()).collect()
    }

    pub fn apply(&self, mut data: CaseData) -> SegResult<CaseData> {
        for transform in &self.transforms {
            data = transform.apply(data)?;
            debug!("{} -> shape {:?}", transform.name(), data.image.shape());
        }
        Ok(data)
    }
}
