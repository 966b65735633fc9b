//! Writing label maps back to disk.

use crate::core::config::{NamingMode, OutputSection};
use crate::core::errors::{ProcessingStage, SegError, SegResult};
use crate::domain::{CaseMetadata, Prediction, nifti_stem};
use crate::processors::resample_nearest;
use crate::utils::nifti::NiftiVolume;
use ndarray::Axis;
use std::path::{Path, PathBuf};
use tracing::info;

/// How an output path is derived from an input path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputNaming {
    /// Replace every `image` with `mask`, then every `_reo/` with `_seg/`.
    Substitution,
    /// `out_dir/<stem>/<stem>_<postfix><ext>`.
    Postfix {
        out_dir: PathBuf,
        postfix: String,
        ext: String,
    },
}

impl OutputNaming {
    /// Builds the naming rule from the `output` section.
    pub fn from_config(output: &OutputSection) -> SegResult<Self> {
        match output.naming {
            NamingMode::Substitution => Ok(OutputNaming::Substitution),
            NamingMode::Postfix => {
                let out_dir = output.out_dir.clone().ok_or_else(|| {
                    SegError::config_error("postfix naming requires output.out_dir")
                })?;
                Ok(OutputNaming::Postfix {
                    out_dir,
                    postfix: output.out_postfix.clone(),
                    ext: output.out_ext.clone(),
                })
            }
        }
    }

    /// Output path for `input`.
    pub fn output_path(&self, input: &Path) -> PathBuf {
        match self {
            OutputNaming::Substitution => PathBuf::from(
                input
                    .to_string_lossy()
                    .replace("image", "mask")
                    .replace("_reo/", "_seg/"),
            ),
            OutputNaming::Postfix {
                out_dir,
                postfix,
                ext,
            } => {
                let stem = nifti_stem(input);
                out_dir.join(&stem).join(format!("{stem}_{postfix}{ext}"))
            }
        }
    }

    /// Directory that receives outputs for inputs found under `input_dir`.
    pub fn output_root(&self, input_dir: &Path) -> PathBuf {
        match self {
            OutputNaming::Substitution => self.output_path(input_dir),
            OutputNaming::Postfix { out_dir, .. } => out_dir.clone(),
        }
    }
}

/// Writes discretized predictions as NIfTI label maps.
#[derive(Debug)]
pub struct SegmentationSaver {
    naming: OutputNaming,
    resample: bool,
    saved: usize,
}

impl SegmentationSaver {
    pub fn new(naming: OutputNaming, resample: bool) -> Self {
        Self {
            naming,
            resample,
            saved: 0,
        }
    }

    pub fn naming(&self) -> &OutputNaming {
        &self.naming
    }

    /// Number of files written so far.
    pub fn saved_count(&self) -> usize {
        self.saved
    }

    /// Writes a single-channel prediction and returns the output path.
    ///
    /// `explicit` is the path already chosen for the case, if any; otherwise
    /// the naming rule derives one from the input. With resampling on, the label map is mapped from the preprocessed grid
    /// (`metadata.affine`) back onto the input grid (`original_affine`,
    /// `spatial_shape`) and written with the original affine.
    pub fn save(
        &mut self,
        prediction: &Prediction,
        metadata: &CaseMetadata,
        explicit: Option<&Path>,
    ) -> SegResult<PathBuf> {
        if prediction.channels() != 1 {
            return Err(SegError::shape_mismatch(
                "save_prediction",
                &[1],
                &[prediction.channels()],
                "only single-channel label maps can be written",
            ));
        }
        let input = &metadata.filename_or_obj;
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => self.naming.output_path(input),
        };
        if path == *input {
            return Err(SegError::processing_message(
                ProcessingStage::Saving,
                format!(
                    "output path for '{}' equals the input path; refusing to overwrite",
                    input.display()
                ),
            ));
        }

        let labels = prediction.data.index_axis(Axis(0), 0);
        let (data, affine) = if self.resample {
            let resampled = resample_nearest(
                labels,
                &metadata.affine,
                &metadata.original_affine,
                metadata.spatial_shape,
            )
            .map_err(|e| {
                SegError::processing(
                    ProcessingStage::Resampling,
                    format!("mapping '{}' back to its input grid", input.display()),
                    e,
                )
            })?;
            (resampled, metadata.original_affine)
        } else {
            (labels.to_owned(), metadata.affine)
        };

        NiftiVolume::new(data, affine).save(&path).map_err(|e| match e {
            SegError::Io(io) => SegError::processing(
                ProcessingStage::Saving,
                format!("writing '{}'", path.display()),
                io,
            ),
            other => other,
        })?;
        self.saved += 1;
        info!("saved {} ({} so far)", path.display(), self.saved);
        Ok(path)
    }
}
