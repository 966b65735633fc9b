use super::*;
use crate::core::config::{
    OrtExecutionProvider, OrtGraphOptimizationLevel, OrtSessionConfig,
};
use ort::execution_providers::ExecutionProviderDispatch;
use ort::logging::LogLevel;
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};

impl OrtInfer {
    /// Session builder with threads, optimization, logging and providers from `cfg`.
    pub(super) fn session_builder(cfg: &OrtSessionConfig) -> Result<SessionBuilder, ort::Error> {
        let mut builder = Session::builder()?
            .with_log_level(log_level(cfg.log_severity_level.unwrap_or(3)))?;
        if let Some(intra) = cfg.intra_threads {
            builder = builder.with_intra_threads(intra)?;
        }
        if let Some(inter) = cfg.inter_threads {
            builder = builder.with_inter_threads(inter)?;
        }
        if let Some(level) = cfg.optimization_level {
            builder = builder.with_optimization_level(optimization_level(level))?;
        }
        let providers = provider_dispatches(&cfg.usable_execution_providers());
        builder.with_execution_providers(providers)
    }
}

fn optimization_level(level: OrtGraphOptimizationLevel) -> GraphOptimizationLevel {
    match level {
        OrtGraphOptimizationLevel::DisableAll => GraphOptimizationLevel::Disable,
        OrtGraphOptimizationLevel::Level1 => GraphOptimizationLevel::Level1,
        OrtGraphOptimizationLevel::Level2 => GraphOptimizationLevel::Level2,
        OrtGraphOptimizationLevel::Level3 => GraphOptimizationLevel::Level3,
    }
}

/// ORT severity: 0 verbose, 1 info, 2 warning, 3 error, anything higher fatal.
fn log_level(severity: i32) -> LogLevel {
    match severity {
        i32::MIN..=0 => LogLevel::Verbose,
        1 => LogLevel::Info,
        2 => LogLevel::Warning,
        3 => LogLevel::Error,
        _ => LogLevel::Fatal,
    }
}

/// Dispatches for providers already filtered to the ones compiled in.
fn provider_dispatches(providers: &[OrtExecutionProvider]) -> Vec<ExecutionProviderDispatch> {
    providers
        .iter()
        .filter_map(|provider| match provider {
            OrtExecutionProvider::CPU => {
                Some(ort::execution_providers::CPUExecutionProvider::default().build())
            }
            #[cfg(feature = "cuda")]
            OrtExecutionProvider::CUDA {
                device_id,
                gpu_mem_limit,
            } => {
                let mut cuda = ort::execution_providers::CUDAExecutionProvider::default();
                if let Some(id) = device_id {
                    cuda = cuda.with_device_id(*id);
                }
                if let Some(limit) = gpu_mem_limit {
                    cuda = cuda.with_memory_limit(*limit);
                }
                Some(cuda.build())
            }
            #[cfg(feature = "tensorrt")]
            OrtExecutionProvider::TensorRT {
                device_id,
                fp16_enable,
            } => {
                let mut trt = ort::execution_providers::TensorRTExecutionProvider::default();
                if let Some(id) = device_id {
                    trt = trt.with_device_id(*id);
                }
                if let Some(fp16) = fp16_enable {
                    trt = trt.with_fp16(*fp16);
                }
                Some(trt.build())
            }
            #[allow(unreachable_patterns)]
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::parse_device;

    #[test]
    fn severity_maps_onto_ort_levels() {
        assert!(matches!(log_level(-1), LogLevel::Verbose));
        assert!(matches!(log_level(2), LogLevel::Warning));
        assert!(matches!(log_level(3), LogLevel::Error));
        assert!(matches!(log_level(9), LogLevel::Fatal));
    }

    #[test]
    fn disable_all_turns_optimization_off() {
        assert!(matches!(
            optimization_level(OrtGraphOptimizationLevel::DisableAll),
            GraphOptimizationLevel::Disable
        ));
        assert!(matches!(
            optimization_level(OrtGraphOptimizationLevel::Level3),
            GraphOptimizationLevel::Level3
        ));
    }

    #[test]
    fn cuda_device_builds_a_dispatch_per_usable_provider() {
        let cfg = OrtSessionConfig::new().with_execution_providers(parse_device("cuda:0").unwrap());
        let usable = cfg.usable_execution_providers();
        let expected = if cfg!(feature = "cuda") { 2 } else { 1 };
        assert_eq!(usable.len(), expected);
        assert_eq!(provider_dispatches(&usable).len(), expected);
    }
}
