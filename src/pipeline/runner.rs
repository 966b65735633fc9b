//! Per-case orchestration.
//!
//! Cases are processed strictly one after another:
//! preprocess, infer (optionally flip-averaged), activate, discretize, save.

use crate::core::batch::Tensor4D;
use crate::core::config::{ConfigValidator, FailurePolicy, SegmentationConfig};
use crate::core::errors::{ProcessingStage, SegError, SegResult};
use crate::core::traits::SegmentationNetwork;
use crate::domain::{CaseData, CaseDescriptor, Prediction};
use crate::models::{DynUnet, DynUnetTopology};
use crate::pipeline::saver::{OutputNaming, SegmentationSaver};
use crate::predictors::{Activation, AsDiscrete, SlidingWindowInferer2D, flip_averaged_prediction};
use crate::processors::Compose;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, info};

/// A case that produced a mask.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedCase {
    pub input: PathBuf,
    pub output: PathBuf,
}

/// A case that failed, with the rendered error.
#[derive(Debug, Clone, Serialize)]
pub struct FailedCase {
    pub input: PathBuf,
    pub error: String,
}

/// Outcome of [`SegmentationPipeline::run`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub processed: Vec<ProcessedCase>,
    pub failed: Vec<FailedCase>,
    pub elapsed_secs: f64,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Builder for [`SegmentationPipeline`].
///
/// ```no_run
/// use fetal_seg::core::config::SegmentationConfig;
/// use fetal_seg::pipeline::SegmentationPipelineBuilder;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = SegmentationConfig::from_yaml_file("config.yml")?;
/// let mut pipeline = SegmentationPipelineBuilder::new(config).build()?;
/// let report = pipeline.run(Vec::new())?;
/// println!("{} written", report.processed.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SegmentationPipelineBuilder {
    config: SegmentationConfig,
    network: Option<Box<dyn SegmentationNetwork>>,
}

impl SegmentationPipelineBuilder {
    pub fn new(config: SegmentationConfig) -> Self {
        Self {
            config,
            network: None,
        }
    }

    /// Uses `network` instead of loading the ONNX model named in the config.
    pub fn network(mut self, network: impl SegmentationNetwork + 'static) -> Self {
        self.network = Some(Box::new(network));
        self
    }

    pub fn build(self) -> SegResult<SegmentationPipeline> {
        let config = self.config;
        let inference = &config.inference;

        let network: Box<dyn SegmentationNetwork> = match self.network {
            Some(network) => {
                config.validate_parameters()?;
                network
            }
            None => {
                config.validate()?;
                let topology =
                    DynUnetTopology::derive(config.inplane_spacing(), config.inplane_size())?;
                debug!("DynUNet strides {:?}", topology.strides);
                Box::new(DynUnet::load(
                    config.model_path(),
                    &config.session_config()?,
                    topology,
                    config.inplane_size(),
                    inference.nr_out_channels,
                )?)
            }
        };
        if network.out_channels() != inference.nr_out_channels {
            return Err(SegError::config_error(format!(
                "network produces {} channels but nr_out_channels is {}",
                network.out_channels(),
                inference.nr_out_channels
            )));
        }

        let preprocessing = Compose::inference_chain(config.inplane_spacing())?;
        debug!("preprocessing: {}", preprocessing.names().join(" -> "));

        Ok(SegmentationPipeline {
            preprocessing,
            inferer: SlidingWindowInferer2D::new(
                config.inplane_size(),
                inference.sw_batch_size,
                inference.overlap,
            )?,
            activation: Activation::for_channels(inference.nr_out_channels)?,
            discretize: AsDiscrete::new(inference.probability_threshold)?,
            flip_augmentation: inference.flip_augmentation,
            saver: SegmentationSaver::new(
                OutputNaming::from_config(&config.output)?,
                config.output.resample,
            ),
            failure_policy: config.output.failure_policy,
            network,
        })
    }
}

/// Segments NIfTI volumes with a 2D network and writes label maps.
#[derive(Debug)]
pub struct SegmentationPipeline {
    preprocessing: Compose,
    network: Box<dyn SegmentationNetwork>,
    inferer: SlidingWindowInferer2D,
    activation: Activation,
    discretize: AsDiscrete,
    flip_augmentation: bool,
    saver: SegmentationSaver,
    failure_policy: FailurePolicy,
}

impl SegmentationPipeline {
    pub fn naming(&self) -> &OutputNaming {
        self.saver.naming()
    }

    /// Raw network output for a preprocessed `(C, H, W, D)` volume.
    pub fn predict(&self, input: &Tensor4D) -> SegResult<Tensor4D> {
        if self.flip_augmentation {
            flip_averaged_prediction(&self.inferer, self.network.as_ref(), input)
        } else {
            self.inferer.infer(input, self.network.as_ref())
        }
    }

    fn segment_case(&mut self, case: CaseDescriptor) -> SegResult<PathBuf> {
        let explicit_output = case.output.clone();
        let data = self.preprocessing.apply(CaseData::new(case))?;
        let metadata = data.metadata()?.clone();
        let input = data.channel_first()?.to_owned();
        drop(data);

        let mut logits = self.predict(&input).map_err(|e| {
            SegError::inference_error(
                &self.network.engine_info(),
                &format!("forward pass for '{}'", metadata.filename_or_obj.display()),
                e,
            )
        })?;
        self.activation.apply(&mut logits);
        let labels = self.discretize.apply(&logits).map_err(|e| {
            SegError::processing(ProcessingStage::PostProcessing, "discretizing prediction", e)
        })?;
        self.saver
            .save(&Prediction::new(labels), &metadata, explicit_output.as_deref())
    }

    /// Segments every case in order.
    ///
    /// With [`FailurePolicy::Continue`] a failing case is logged and recorded
    /// in the report; with [`FailurePolicy::FailFast`] its error is returned.
    pub fn run(&mut self, cases: Vec<CaseDescriptor>) -> SegResult<RunReport> {
        let started = Instant::now();
        let total = cases.len();
        let mut report = RunReport::default();

        for (idx, case) in cases.into_iter().enumerate() {
            let input = case.input.clone();
            info!("[{}/{}] segmenting {}", idx + 1, total, input.display());
            match self.segment_case(case) {
                Ok(output) => report.processed.push(ProcessedCase { input, output }),
                Err(err) => {
                    error!(
                        input = %input.display(),
                        error = %err,
                        "segmentation failed"
                    );
                    if self.failure_policy == FailurePolicy::FailFast {
                        return Err(err);
                    }
                    report.failed.push(FailedCase {
                        input,
                        error: err.to_string(),
                    });
                }
            }
        }

        report.elapsed_secs = started.elapsed().as_secs_f64();
        info!(
            "segmented {} of {} cases in {:.1}s ({} saved in total)",
            report.processed.len(),
            total,
            report.elapsed_secs,
            self.saver.saved_count()
        );
        Ok(report)
    }
}
