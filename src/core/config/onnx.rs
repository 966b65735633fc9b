//! ONNX Runtime session configuration.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Graph optimization levels for ONNX Runtime.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum OrtGraphOptimizationLevel {
    /// Disable all optimizations.
    DisableAll,
    /// Enable basic optimizations.
    #[default]
    Level1,
    /// Enable extended optimizations.
    Level2,
    /// Enable all optimizations.
    Level3,
}

/// Execution providers the segmentation network can run on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum OrtExecutionProvider {
    /// CPU execution provider (always available)
    #[default]
    CPU,
    /// NVIDIA CUDA execution provider
    CUDA {
        /// CUDA device ID (default: 0)
        device_id: Option<i32>,
        /// Memory limit in bytes (optional)
        gpu_mem_limit: Option<usize>,
    },
    /// TensorRT execution provider
    TensorRT {
        /// TensorRT device ID (default: 0)
        device_id: Option<i32>,
        /// FP16 enable flag
        fp16_enable: Option<bool>,
    },
}

impl OrtExecutionProvider {
    /// Whether this build can create the provider.
    pub fn is_compiled_in(&self) -> bool {
        match self {
            OrtExecutionProvider::CPU => true,
            OrtExecutionProvider::CUDA { .. } => cfg!(feature = "cuda"),
            OrtExecutionProvider::TensorRT { .. } => cfg!(feature = "tensorrt"),
        }
    }
}

/// Configuration for ONNX Runtime sessions.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OrtSessionConfig {
    /// Number of threads used to parallelize execution within nodes
    #[serde(default)]
    pub intra_threads: Option<usize>,
    /// Number of threads used to parallelize execution across nodes
    #[serde(default)]
    pub inter_threads: Option<usize>,
    /// Graph optimization level
    #[serde(default)]
    pub optimization_level: Option<OrtGraphOptimizationLevel>,
    /// Execution providers in order of preference
    #[serde(default)]
    pub execution_providers: Option<Vec<OrtExecutionProvider>>,
    /// Log severity level (0=Verbose, 1=Info, 2=Warning, 3=Error, 4=Fatal)
    #[serde(default)]
    pub log_severity_level: Option<i32>,
}

impl OrtSessionConfig {
    /// Creates a new OrtSessionConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of intra-op threads.
    pub fn with_intra_threads(mut self, threads: usize) -> Self {
        self.intra_threads = Some(threads);
        self
    }

    /// Sets the number of inter-op threads.
    pub fn with_inter_threads(mut self, threads: usize) -> Self {
        self.inter_threads = Some(threads);
        self
    }

    /// Sets the graph optimization level.
    pub fn with_optimization_level(mut self, level: OrtGraphOptimizationLevel) -> Self {
        self.optimization_level = Some(level);
        self
    }

    /// Sets the execution providers, in order of preference.
    pub fn with_execution_providers(mut self, providers: Vec<OrtExecutionProvider>) -> Self {
        self.execution_providers = Some(providers);
        self
    }

    /// Sets the log severity level.
    pub fn with_log_severity_level(mut self, level: i32) -> Self {
        self.log_severity_level = Some(level);
        self
    }

    /// Gets the execution providers, defaulting to CPU.
    pub fn get_execution_providers(&self) -> Vec<OrtExecutionProvider> {
        self.execution_providers
            .clone()
            .unwrap_or_else(|| vec![OrtExecutionProvider::CPU])
    }

    /// Requested providers this build can create, in order, ending with CPU.
    ///
    /// Providers whose cargo feature is off are dropped with a warning, so a
    /// `cuda` device on a CPU-only build runs on the CPU.
    pub fn usable_execution_providers(&self) -> Vec<OrtExecutionProvider> {
        let mut usable: Vec<OrtExecutionProvider> = self
            .get_execution_providers()
            .into_iter()
            .filter(|provider| {
                let available = provider.is_compiled_in();
                if !available {
                    warn!(
                        "{:?} requested but this build lacks its cargo feature; skipping it",
                        provider
                    );
                }
                available
            })
            .collect();
        if !usable.contains(&OrtExecutionProvider::CPU) {
            usable.push(OrtExecutionProvider::CPU);
        }
        usable
    }
}

/// Parses a device string (`cpu`, `cuda`, `cuda:N`) into execution providers.
///
/// CUDA devices keep CPU as a fallback provider, mirroring how the network was
/// run when no GPU is present.
pub fn parse_device(device: &str) -> Result<Vec<OrtExecutionProvider>, String> {
    let device_lower = device.trim().to_lowercase();
    if device_lower == "cpu" {
        return Ok(vec![OrtExecutionProvider::CPU]);
    }

    if let Some(rest) = device_lower.strip_prefix("cuda") {
        let device_id = match rest.strip_prefix(':') {
            None if rest.is_empty() => 0,
            Some(id) => id.parse::<i32>().map_err(|_| {
                format!(
                    "invalid CUDA device ID: {}. Expected format: 'cuda' or 'cuda:N'",
                    device
                )
            })?,
            None => {
                return Err(format!(
                    "invalid device format: {}. Expected 'cuda' or 'cuda:N'",
                    device
                ));
            }
        };
        return Ok(vec![
            OrtExecutionProvider::CUDA {
                device_id: Some(device_id),
                gpu_mem_limit: None,
            },
            OrtExecutionProvider::CPU,
        ]);
    }

    Err(format!(
        "unsupported device '{}'. Supported: cpu, cuda, cuda:N",
        device
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let config = OrtSessionConfig::new()
            .with_intra_threads(4)
            .with_inter_threads(2)
            .with_optimization_level(OrtGraphOptimizationLevel::Level2);

        assert_eq!(config.intra_threads, Some(4));
        assert_eq!(config.inter_threads, Some(2));
        assert_eq!(
            config.optimization_level,
            Some(OrtGraphOptimizationLevel::Level2)
        );
        assert_eq!(
            config.get_execution_providers(),
            vec![OrtExecutionProvider::CPU]
        );
    }

    #[test]
    fn parses_device_strings() {
        assert_eq!(parse_device("cpu").unwrap(), vec![OrtExecutionProvider::CPU]);

        let providers = parse_device("cuda:1").unwrap();
        assert_eq!(
            providers[0],
            OrtExecutionProvider::CUDA {
                device_id: Some(1),
                gpu_mem_limit: None
            }
        );
        assert_eq!(providers[1], OrtExecutionProvider::CPU);

        assert!(matches!(
            parse_device("cuda").unwrap()[0],
            OrtExecutionProvider::CUDA {
                device_id: Some(0),
                ..
            }
        ));
        assert!(parse_device("cuda:x").is_err());
        assert!(parse_device("cudax").is_err());
        assert!(parse_device("tpu").is_err());
    }

    #[test]
    fn cuda_device_falls_back_to_cpu_without_the_feature() {
        let config =
            OrtSessionConfig::new().with_execution_providers(parse_device("cuda").unwrap());
        let usable = config.usable_execution_providers();
        assert_eq!(usable.last(), Some(&OrtExecutionProvider::CPU));
        if cfg!(feature = "cuda") {
            assert_eq!(usable.len(), 2);
        } else {
            assert_eq!(usable, vec![OrtExecutionProvider::CPU]);
        }
    }

    #[test]
    fn explicit_gpu_only_list_still_gets_cpu() {
        let config = OrtSessionConfig::new().with_execution_providers(vec![
            OrtExecutionProvider::TensorRT {
                device_id: None,
                fp16_enable: Some(true),
            },
        ]);
        let usable = config.usable_execution_providers();
        assert_eq!(usable.last(), Some(&OrtExecutionProvider::CPU));
        assert_eq!(usable.len(), if cfg!(feature = "tensorrt") { 2 } else { 1 });
    }
}
