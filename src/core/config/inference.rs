//! YAML configuration of a segmentation run.
//!
//! The file layout follows the inference configs shipped with the trained
//! DynUNet checkpoints:
//!
//! ```yaml
//! device:
//!   num_workers: 1
//! inference:
//!   nr_out_channels: 2
//!   spacing: [0.8, 0.8, -1.0]
//!   probability_threshold: 0.5
//!   model_to_load: default
//!   inplane_size: [448, 512]
//! ```
//!
//! The `output` section is usually filled from the command line.

use super::errors::{ConfigError, ConfigValidator};
use super::onnx::{OrtSessionConfig, parse_device};
use super::parallel::ParallelPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Literal used in config files to request the bundled model.
pub const DEFAULT_MODEL_KEYWORD: &str = "default";

/// Inference parameters of the trained network.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InferenceSection {
    /// Number of output channels of the network (1 = sigmoid, >1 = softmax).
    pub nr_out_channels: usize,
    /// Target spacing in mm; only the first two (in-plane) entries are used.
    pub spacing: Vec<f64>,
    /// Threshold applied when discretizing the prediction.
    pub probability_threshold: f32,
    /// Path to the ONNX model, or `default`.
    pub model_to_load: String,
    /// In-plane patch size the network was trained on.
    pub inplane_size: Vec<usize>,
    /// Number of windows sent through the network at once.
    #[serde(default = "InferenceSection::default_sw_batch_size")]
    pub sw_batch_size: usize,
    /// Fractional overlap between neighbouring windows.
    #[serde(default)]
    pub overlap: f32,
    /// Whether to average predictions over flipped copies of the input.
    #[serde(default = "default_true")]
    pub flip_augmentation: bool,
}

impl InferenceSection {
    fn default_sw_batch_size() -> usize {
        4
    }
}

fn default_true() -> bool {
    true
}

/// Device and worker settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceSection {
    /// Worker threads for preprocessing (0 = rayon default).
    #[serde(default)]
    pub num_workers: usize,
    /// Device string: `cpu`, `cuda` or `cuda:N`.
    #[serde(default = "DeviceSection::default_device")]
    pub device: String,
    /// Extra ONNX Runtime session options.
    #[serde(default)]
    pub ort_session: Option<OrtSessionConfig>,
}

impl DeviceSection {
    fn default_device() -> String {
        "cpu".to_string()
    }
}

impl Default for DeviceSection {
    fn default() -> Self {
        Self {
            num_workers: 0,
            device: Self::default_device(),
            ort_session: None,
        }
    }
}

/// How output filenames are derived from input filenames.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum NamingMode {
    /// Replace `image` with `mask` and `_reo/` with `_seg/` in the input path.
    #[default]
    Substitution,
    /// `out_dir/<stem>/<stem>_<postfix><ext>`.
    Postfix,
}

/// What the runner does when one case fails.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Log the failure, record it in the report and move on.
    #[default]
    Continue,
    /// Stop at the first failing case.
    FailFast,
}

/// Output settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputSection {
    /// Output directory (required for [`NamingMode::Postfix`]).
    #[serde(default)]
    pub out_dir: Option<PathBuf>,
    /// Postfix appended to output stems.
    #[serde(default = "OutputSection::default_postfix")]
    pub out_postfix: String,
    /// Output extension.
    #[serde(default = "OutputSection::default_ext")]
    pub out_ext: String,
    /// Output naming strategy.
    #[serde(default)]
    pub naming: NamingMode,
    /// Resample the mask back to the input geometry before writing.
    #[serde(default = "default_true")]
    pub resample: bool,
    /// Behaviour on a per-case failure.
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

impl OutputSection {
    fn default_postfix() -> String {
        "seg".to_string()
    }

    fn default_ext() -> String {
        ".nii.gz".to_string()
    }
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            out_dir: None,
            out_postfix: Self::default_postfix(),
            out_ext: Self::default_ext(),
            naming: NamingMode::default(),
            resample: true,
            failure_policy: FailurePolicy::default(),
        }
    }
}

/// Complete configuration of a segmentation run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SegmentationConfig {
    /// Network and inference parameters.
    pub inference: InferenceSection,
    /// Device settings.
    #[serde(default)]
    pub device: DeviceSection,
    /// Output settings.
    #[serde(default)]
    pub output: OutputSection,
}

impl SegmentationConfig {
    /// Reads the configuration from a YAML file.
    ///
    /// A missing file is reported as [`ConfigError::FileNotFound`]. The result
    /// is not validated; call [`ConfigValidator::validate`] once the model path
    /// has been resolved.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_yaml_str(&text).map_err(|e| match e {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })
    }

    /// Parses the configuration from a YAML string.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(text).map_err(|e| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            message: e.to_string(),
        })
    }

    /// Serializes the effective configuration for logging.
    pub fn to_yaml(&self) -> String {
        serde_yaml::to_string(self).unwrap_or_else(|e| format!("<unserializable config: {e}>"))
    }

    /// Replaces the `default` model keyword with `default_model`.
    ///
    /// Leaves explicit paths untouched. Fails if the keyword is used and no
    /// default model was supplied.
    pub fn resolve_model_path(&mut self, default_model: Option<&Path>) -> Result<(), ConfigError> {
        if self.inference.model_to_load != DEFAULT_MODEL_KEYWORD {
            return Ok(());
        }
        match default_model {
            Some(path) => {
                self.inference.model_to_load = path.display().to_string();
                Ok(())
            }
            None => Err(ConfigError::InvalidConfig {
                message: "model_to_load is 'default' but no default model path was given"
                    .to_string(),
            }),
        }
    }

    /// Path of the ONNX model.
    pub fn model_path(&self) -> PathBuf {
        PathBuf::from(&self.inference.model_to_load)
    }

    /// In-plane target spacing.
    pub fn inplane_spacing(&self) -> [f64; 2] {
        [self.inference.spacing[0], self.inference.spacing[1]]
    }

    /// In-plane patch size.
    pub fn inplane_size(&self) -> [usize; 2] {
        [self.inference.inplane_size[0], self.inference.inplane_size[1]]
    }

    /// Rayon policy derived from `device.num_workers`.
    pub fn parallel_policy(&self) -> ParallelPolicy {
        ParallelPolicy::from_num_workers(self.device.num_workers)
    }

    /// ONNX Runtime session options with the device string applied.
    ///
    /// Explicit `execution_providers` in `ort_session` win over `device`.
    pub fn session_config(&self) -> Result<OrtSessionConfig, ConfigError> {
        let mut session = self.device.ort_session.clone().unwrap_or_default();
        if session.execution_providers.is_none() {
            let providers = parse_device(&self.device.device)
                .map_err(|message| ConfigError::InvalidConfig { message })?;
            session = session.with_execution_providers(providers);
        }
        Ok(session)
    }
}

impl SegmentationConfig {
    /// Checks everything except the model path.
    pub fn validate_parameters(&self) -> Result<(), ConfigError> {
        let inference = &self.inference;
        if inference.nr_out_channels == 0 {
            return Err(ConfigError::IncompatibleOutputChannels(0));
        }
        if inference.spacing.len() < 2 {
            return Err(ConfigError::InvalidConfig {
                message: format!(
                    "spacing needs at least two in-plane values, got {:?}",
                    inference.spacing
                ),
            });
        }
        self.validate_spacing(&inference.spacing[..2])?;
        if inference.inplane_size.len() != 2 {
            return Err(ConfigError::InvalidConfig {
                message: format!(
                    "inplane_size needs exactly two values, got {:?}",
                    inference.inplane_size
                ),
            });
        }
        self.validate_patch_size(&inference.inplane_size)?;
        self.validate_probability_threshold(inference.probability_threshold)?;
        if inference.sw_batch_size == 0 {
            return Err(ConfigError::InvalidConfig {
                message: "sw_batch_size must be greater than 0".to_string(),
            });
        }
        if !(0.0..1.0).contains(&inference.overlap) {
            return Err(ConfigError::InvalidConfig {
                message: format!("overlap must be in [0, 1), got {}", inference.overlap),
            });
        }
        if self.output.naming == NamingMode::Postfix && self.output.out_dir.is_none() {
            return Err(ConfigError::InvalidConfig {
                message: "postfix naming requires output.out_dir".to_string(),
            });
        }
        Ok(())
    }
}

impl ConfigValidator for SegmentationConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.validate_parameters()?;
        if self.inference.model_to_load == DEFAULT_MODEL_KEYWORD {
            return Err(ConfigError::InvalidConfig {
                message: "model_to_load is still 'default'; resolve it before validation"
                    .to_string(),
            });
        }
        self.validate_model_path(&self.model_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
device:
  num_workers: 2
inference:
  nr_out_channels: 2
  spacing: [0.8, 0.8, -1.0]
  probability_threshold: 0.5
  model_to_load: default
  inplane_size: [448, 512]
"#;

    #[test]
    fn parses_sample_with_defaults() {
        let config = SegmentationConfig::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(config.inference.nr_out_channels, 2);
        assert_eq!(config.inplane_spacing(), [0.8, 0.8]);
        assert_eq!(config.inplane_size(), [448, 512]);
        assert_eq!(config.inference.sw_batch_size, 4);
        assert_eq!(config.inference.overlap, 0.0);
        assert!(config.inference.flip_augmentation);
        assert_eq!(config.device.num_workers, 2);
        assert_eq!(config.device.device, "cpu");
        assert_eq!(config.output.out_postfix, "seg");
        assert_eq!(config.output.out_ext, ".nii.gz");
        assert_eq!(config.output.naming, NamingMode::Substitution);
        assert_eq!(config.output.failure_policy, FailurePolicy::Continue);
        assert_eq!(config.parallel_policy().max_threads, Some(2));
    }

    #[test]
    fn missing_file_is_fatal() {
        let err = SegmentationConfig::from_yaml_file("/no/such/config.yml").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn default_model_is_resolved_and_validated() {
        let mut model = tempfile::NamedTempFile::new().unwrap();
        model.write_all(b"onnx").unwrap();

        let mut config = SegmentationConfig::from_yaml_str(SAMPLE).unwrap();
        assert!(config.validate().is_err());
        config.resolve_model_path(Some(model.path())).unwrap();
        assert_eq!(config.model_path(), model.path());
        config.validate().unwrap();
    }

    #[test]
    fn default_model_without_fallback_fails() {
        let mut config = SegmentationConfig::from_yaml_str(SAMPLE).unwrap();
        assert!(config.resolve_model_path(None).is_err());
    }

    #[test]
    fn zero_output_channels_is_fatal() {
        let model = tempfile::NamedTempFile::new().unwrap();
        let mut config = SegmentationConfig::from_yaml_str(SAMPLE).unwrap();
        config.resolve_model_path(Some(model.path())).unwrap();
        config.inference.nr_out_channels = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::IncompatibleOutputChannels(0))
        ));
    }

    #[test]
    fn missing_model_is_fatal() {
        let mut config = SegmentationConfig::from_yaml_str(SAMPLE).unwrap();
        config.inference.model_to_load = "/no/such/model.onnx".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ModelPathNotFound { .. })
        ));
    }

    #[test]
    fn device_string_drives_providers() {
        let mut config = SegmentationConfig::from_yaml_str(SAMPLE).unwrap();
        config.device.device = "cuda:0".to_string();
        let session = config.session_config().unwrap();
        assert_eq!(session.get_execution_providers().len(), 2);

        config.device.device = "quantum".to_string();
        assert!(config.session_config().is_err());
    }

    #[test]
    fn yaml_dump_round_trips_sections() {
        let config = SegmentationConfig::from_yaml_str(SAMPLE).unwrap();
        let dumped = config.to_yaml();
        assert!(dumped.contains("nr_out_channels: 2"));
        assert_eq!(SegmentationConfig::from_yaml_str(&dumped).unwrap(), config);
    }
}
