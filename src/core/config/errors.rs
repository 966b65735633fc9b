//! Configuration error types and validation traits.

use std::path::Path;
use thiserror::Error;

/// Errors that can occur while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file does not exist.
    #[error("expected config file: {} not found", path.display())]
    FileNotFound { path: std::path::PathBuf },

    /// The configuration file could not be parsed.
    #[error("failed to parse config file {}: {message}", path.display())]
    Parse {
        path: std::path::PathBuf,
        message: String,
    },

    /// The trained model does not exist.
    #[error("trained model not found: {}", path.display())]
    ModelPathNotFound { path: std::path::PathBuf },

    /// The number of output channels cannot drive an activation.
    #[error("incompatible number of output channels: {0}")]
    IncompatibleOutputChannels(usize),

    /// Error indicating that a configuration is invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },
}

/// A trait for validating configuration parameters.
///
/// Implementors provide [`ConfigValidator::validate`]; the provided methods
/// cover the checks shared by the inference and device sections.
pub trait ConfigValidator {
    /// Validates the configuration.
    fn validate(&self) -> Result<(), ConfigError>;

    /// Checks that the model path exists and is a file.
    fn validate_model_path(&self, path: &Path) -> Result<(), ConfigError> {
        if !path.exists() {
            Err(ConfigError::ModelPathNotFound {
                path: path.to_path_buf(),
            })
        } else if !path.is_file() {
            Err(ConfigError::InvalidConfig {
                message: format!("model path is not a file: {}", path.display()),
            })
        } else {
            Ok(())
        }
    }

    /// Checks that a probability threshold lies in `[0, 1]`.
    fn validate_probability_threshold(&self, threshold: f32) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&threshold) {
            Err(ConfigError::InvalidConfig {
                message: format!(
                    "probability threshold must be between 0.0 and 1.0, got {}",
                    threshold
                ),
            })
        } else {
            Ok(())
        }
    }

    /// Checks that every spacing entry is finite and strictly positive.
    fn validate_spacing(&self, spacing: &[f64]) -> Result<(), ConfigError> {
        match spacing.iter().find(|s| !s.is_finite() || **s <= 0.0) {
            Some(bad) => Err(ConfigError::InvalidConfig {
                message: format!("spacing values must be positive, got {}", bad),
            }),
            None => Ok(()),
        }
    }

    /// Checks that every patch dimension is non-zero.
    fn validate_patch_size(&self, patch: &[usize]) -> Result<(), ConfigError> {
        if patch.iter().any(|&p| p == 0) {
            Err(ConfigError::InvalidConfig {
                message: format!("patch size must be positive, got {:?}", patch),
            })
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Checker;

    impl ConfigValidator for Checker {
        fn validate(&self) -> Result<(), ConfigError> {
            Ok(())
        }
    }

    #[test]
    fn threshold_bounds() {
        assert!(Checker.validate_probability_threshold(0.5).is_ok());
        assert!(Checker.validate_probability_threshold(1.0).is_ok());
        assert!(Checker.validate_probability_threshold(1.5).is_err());
        assert!(Checker.validate_probability_threshold(-0.1).is_err());
    }

    #[test]
    fn spacing_rejects_zero_and_nan() {
        assert!(Checker.validate_spacing(&[0.8, 0.8]).is_ok());
        assert!(Checker.validate_spacing(&[0.0, 0.8]).is_err());
        assert!(Checker.validate_spacing(&[f64::NAN, 0.8]).is_err());
    }

    #[test]
    fn missing_model_is_reported() {
        let err = Checker
            .validate_model_path(Path::new("/definitely/not/here.onnx"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::ModelPathNotFound { .. }));
    }
}
