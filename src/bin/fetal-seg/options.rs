//! Turning command line flags into a run configuration.

use crate::RunArgs;
use fetal_seg::core::config::{FailurePolicy, NamingMode, SegmentationConfig};
use fetal_seg::core::errors::SegResult;
use tracing::info;

/// Loads the config file and applies the flags on top of it.
///
/// The effective configuration is logged as YAML.
pub fn load_config(args: &RunArgs) -> SegResult<SegmentationConfig> {
    let mut config = SegmentationConfig::from_yaml_file(&args.config_file)?;
    apply_overrides(&mut config, args);
    config.resolve_model_path(args.default_model.as_deref())?;
    info!(
        "configuration from {}:\n{}",
        args.config_file.display(),
        config.to_yaml()
    );
    Ok(config)
}

fn apply_overrides(config: &mut SegmentationConfig, args: &RunArgs) {
    if let Some(out_folder) = &args.out_folder {
        config.output.out_dir = Some(out_folder.clone());
        config.output.naming = NamingMode::Postfix;
    }
    if let Some(postfix) = &args.out_postfix {
        config.output.out_postfix = postfix.clone();
    }
    if let Some(device) = &args.device {
        config.device.device = device.clone();
    }
    if args.fail_fast {
        config.output.failure_policy = FailurePolicy::FailFast;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OutputFormat;
    use std::path::PathBuf;

    const YAML: &str = r#"
inference:
  nr_out_channels: 1
  spacing: [0.8, 0.8]
  probability_threshold: 0.5
  model_to_load: default
  inplane_size: [448, 512]
"#;

    fn args() -> RunArgs {
        RunArgs {
            config_file: PathBuf::from("config.yml"),
            out_folder: None,
            out_postfix: None,
            default_model: None,
            device: None,
            fail_fast: false,
            output: OutputFormat::Pretty,
        }
    }

    #[test]
    fn no_flags_keep_file_settings() {
        let mut config = SegmentationConfig::from_yaml_str(YAML).unwrap();
        apply_overrides(&mut config, &args());
        assert_eq!(config.output.naming, NamingMode::Substitution);
        assert_eq!(config.device.device, "cpu");
        assert_eq!(config.output.failure_policy, FailurePolicy::Continue);
    }

    #[test]
    fn out_folder_switches_to_postfix_naming() {
        let mut config = SegmentationConfig::from_yaml_str(YAML).unwrap();
        let args = RunArgs {
            out_folder: Some(PathBuf::from("/out")),
            out_postfix: Some("brain".to_string()),
            device: Some("cuda:1".to_string()),
            fail_fast: true,
            ..args()
        };
        apply_overrides(&mut config, &args);
        assert_eq!(config.output.naming, NamingMode::Postfix);
        assert_eq!(config.output.out_dir, Some(PathBuf::from("/out")));
        assert_eq!(config.output.out_postfix, "brain");
        assert_eq!(config.device.device, "cuda:1");
        assert_eq!(config.output.failure_policy, FailurePolicy::FailFast);
    }
}
