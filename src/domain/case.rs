//! Per-case data model.

use crate::core::batch::Tensor4D;
use crate::core::errors::{SegError, SegResult};
use nalgebra::Matrix4;
use ndarray::{ArrayD, ArrayView4, Ix4, IxDyn};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Geometry of a case, captured at load time and updated by resampling.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseMetadata {
    /// File the volume was read from.
    pub filename_or_obj: PathBuf,
    /// Voxel-to-world affine of the current image grid.
    pub affine: Matrix4<f64>,
    /// Affine as loaded, used to resample the prediction back.
    pub original_affine: Matrix4<f64>,
    /// Volume shape as loaded.
    pub spatial_shape: [usize; 3],
    /// Voxel sizes of the current image grid.
    pub pixdim: [f64; 3],
}

impl CaseMetadata {
    /// Metadata for a freshly loaded volume; current and original geometry coincide.
    pub fn loaded(
        path: impl Into<PathBuf>,
        affine: Matrix4<f64>,
        spatial_shape: [usize; 3],
        pixdim: [f64; 3],
    ) -> Self {
        Self {
            filename_or_obj: path.into(),
            affine,
            original_affine: affine,
            spatial_shape,
            pixdim,
        }
    }
}

/// One input file and what is known about it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseDescriptor {
    /// Image to segment.
    pub input: PathBuf,
    /// Where the mask goes, once decided.
    pub output: Option<PathBuf>,
    /// Filled by the loader.
    #[serde(skip)]
    pub metadata: Option<CaseMetadata>,
}

impl CaseDescriptor {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: None,
            metadata: None,
        }
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }
}

/// File name of `path` with a trailing `.nii.gz` or single extension removed.
pub fn nifti_stem(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if let Some(stripped) = name.strip_suffix(".nii.gz") {
        return stripped.to_string();
    }
    match name.rfind('.') {
        Some(idx) if idx > 0 => name[..idx].to_string(),
        _ => name,
    }
}

/// A case in flight through the preprocessing chain.
///
/// `image` is `(H, W, D)` right after loading and `(C, H, W, D)` once a
/// channel axis has been added.
#[derive(Debug, Clone)]
pub struct CaseData {
    pub descriptor: CaseDescriptor,
    pub image: ArrayD<f32>,
}

impl CaseData {
    /// Wraps a descriptor with no image loaded yet.
    pub fn new(descriptor: CaseDescriptor) -> Self {
        Self {
            descriptor,
            image: ArrayD::zeros(IxDyn(&[0])),
        }
    }

    /// Metadata written by the loader.
    pub fn metadata(&self) -> SegResult<&CaseMetadata> {
        self.descriptor.metadata.as_ref().ok_or_else(|| {
            SegError::invalid_input(format!(
                "case '{}' has no metadata; was it loaded?",
                self.descriptor.input.display()
            ))
        })
    }

    pub fn metadata_mut(&mut self) -> SegResult<&mut CaseMetadata> {
        let input = self.descriptor.input.display().to_string();
        self.descriptor
            .metadata
            .as_mut()
            .ok_or_else(|| SegError::invalid_input(format!("case '{input}' has no metadata")))
    }

    /// The image as a channel-first `(C, H, W, D)` view.
    pub fn channel_first(&self) -> SegResult<ArrayView4<'_, f32>> {
        self.image.view().into_dimensionality::<Ix4>().map_err(|e| {
            SegError::tensor_operation_error(
                "channel_first_view",
                &[0, 0, 0, 0],
                self.image.shape(),
                &format!("case '{}'", self.descriptor.input.display()),
                e,
            )
        })
    }
}

/// Network output for one case, `(C, H, W, D)` on the preprocessed grid.
#[derive(Debug, Clone)]
pub struct Prediction {
    pub data: Tensor4D,
}

impl Prediction {
    pub fn new(data: Tensor4D) -> Self {
        Self { data }
    }

    pub fn channels(&self) -> usize {
        self.data.shape()[0]
    }
}
