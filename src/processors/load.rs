//! Volume loading as the first step of the preprocessing chain.

use crate::core::errors::{ProcessingStage, SegError, SegResult};
use crate::core::traits::VolumeTransform;
use crate::domain::{CaseData, CaseMetadata};
use crate::utils::nifti::NiftiVolume;
use tracing::debug;

/// Reads the case's input file and records its geometry.
#[derive(Debug, Clone, Default)]
pub struct LoadNifti;

impl VolumeTransform for LoadNifti {
    fn apply(&self, mut data: CaseData) -> SegResult<CaseData> {
        let path = data.descriptor.input.clone();
        let volume = NiftiVolume::load(&path).map_err(|e| match e {
            SegError::InputNotFound { .. } | SegError::Nifti { .. } => e,
            other => SegError::processing(
                ProcessingStage::Loading,
                format!("reading '{}'", path.display()),
                other,
            ),
        })?;
        let (h, w, d) = volume.data.dim();
        debug!(
            "loaded {}: shape {:?}, pixdim {:?}",
            path.display(),
            [h, w, d],
            volume.pixdim
        );
        data.descriptor.metadata = Some(CaseMetadata::loaded(
            path,
            volume.affine,
            [h, w, d],
            volume.pixdim,
        ));
        data.image = volume.data.into_dyn();
        Ok(data)
    }

    fn name(&self) -> &'static str {
        "LoadNifti"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CaseDescriptor;
    use nalgebra::Matrix4;
    use ndarray::Array3;

    #[test]
    fn loads_volume_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("case.nii");
        let affine = Matrix4::new(
            0.7, 0.0, 0.0, 1.0, //
            0.0, 0.7, 0.0, 2.0, //
            0.0, 0.0, 3.5, 3.0, //
            0.0, 0.0, 0.0, 1.0,
        );
        NiftiVolume::new(Array3::from_elem((3, 4, 2), 7.0), affine)
            .save(&path)
            .unwrap();

        let out = LoadNifti
            .apply(CaseData::new(CaseDescriptor::new(&path)))
            .unwrap();
        assert_eq!(out.image.shape(), &[3, 4, 2]);
        let meta = out.metadata().unwrap();
        assert_eq!(meta.spatial_shape, [3, 4, 2]);
        assert_eq!(meta.filename_or_obj, path);
        assert!((meta.affine[(2, 2)] - 3.5).abs() < 1e-6);
        assert_eq!(meta.affine, meta.original_affine);
    }

    #[test]
    fn missing_input_is_reported_as_not_found() {
        let err = LoadNifti
            .apply(CaseData::new(CaseDescriptor::new("/nope/case.nii.gz")))
            .unwrap_err();
        assert!(matches!(err, SegError::InputNotFound { .. }));
    }
}
