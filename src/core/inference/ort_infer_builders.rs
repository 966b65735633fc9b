use super::*;
use crate::core::config::OrtSessionConfig;
use crate::core::errors::SimpleError;
use ort::value::ValueType;
use std::path::Path;

impl OrtInfer {
    /// Loads the model at `model_path` with the session settings in `cfg`.
    ///
    /// The first declared input and output are the ones fed and read by
    /// [`OrtInfer::infer_4d`].
    pub fn from_config(cfg: &OrtSessionConfig, model_path: impl AsRef<Path>) -> Result<Self, SegError> {
        let path = model_path.as_ref();
        let session = Self::session_builder(cfg)?.commit_from_file(path).map_err(|e| {
            SegError::model_load_error(
                path,
                "failed to create ONNX session",
                Some("check the device setting and the model file"),
                Some(e),
            )
        })?;

        let input = session.inputs.first().ok_or_else(|| {
            SegError::model_load_error(
                path,
                "model declares no inputs",
                Some("export the network with a single image input"),
                None::<SimpleError>,
            )
        })?;
        let input_name = input.name.clone();
        let input_shape = match &input.input_type {
            ValueType::Tensor { shape, .. } => Some(shape.iter().copied().collect()),
            _ => None,
        };
        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .ok_or_else(|| {
                SegError::model_load_error(
                    path,
                    "model declares no outputs",
                    Some("export the network with its logits as the first output"),
                    None::<SimpleError>,
                )
            })?;

        let model_name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown_model")
            .to_string();

        Ok(OrtInfer {
            session: Mutex::new(session),
            input_name,
            output_name,
            input_shape,
            model_path: path.to_path_buf(),
            model_name,
        })
    }
}
