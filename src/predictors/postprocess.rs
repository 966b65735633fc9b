//! Activation and discretization of network output.

use crate::core::batch::Tensor4D;
use crate::core::config::ConfigError;
use crate::core::errors::{SegError, SegResult};
use ndarray::{Axis, Zip};

/// Final activation, chosen from the number of output channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// Single-channel foreground probability.
    Sigmoid,
    /// Class probabilities over the channel axis.
    Softmax,
}

impl Activation {
    pub fn for_channels(nr_out_channels: usize) -> Result<Self, ConfigError> {
        match nr_out_channels {
            0 => Err(ConfigError::IncompatibleOutputChannels(0)),
            1 => Ok(Activation::Sigmoid),
            _ => Ok(Activation::Softmax),
        }
    }

    /// Applies the activation in place to a `(C, H, W, D)` prediction.
    pub fn apply(self, prediction: &mut Tensor4D) {
        match self {
            Activation::Sigmoid => prediction.mapv_inplace(|x| 1.0 / (1.0 + (-x).exp())),
            Activation::Softmax => {
                for mut lane in prediction.lanes_mut(Axis(0)) {
                    let max = lane.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
                    lane.mapv_inplace(|v| (v - max).exp());
                    let total = lane.sum();
                    lane.mapv_inplace(|v| v / total);
                }
            }
        }
    }
}

/// Turns probabilities into a single-channel binary label map.
///
/// Multi-channel input is reduced with argmax over channels and the label
/// index is then compared with the threshold; single-channel input compares
/// the probability itself.
#[derive(Debug, Clone, Copy)]
pub struct AsDiscrete {
    threshold: f32,
}

impl AsDiscrete {
    pub fn new(threshold: f32) -> SegResult<Self> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(SegError::invalid_field(
                "inference.probability_threshold",
                "a value in [0, 1]",
                threshold.to_string(),
            ));
        }
        Ok(Self { threshold })
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Returns a `(1, H, W, D)` map of 0.0 / 1.0 values.
    pub fn apply(&self, probabilities: &Tensor4D) -> SegResult<Tensor4D> {
        let (channels, h, w, d) = probabilities.dim();
        if channels == 0 {
            return Err(SegError::shape_mismatch(
                "as_discrete",
                &[1, h, w, d],
                probabilities.shape(),
                "prediction has no channels",
            ));
        }
        let threshold = self.threshold;
        let mut labels = Tensor4D::zeros((1, h, w, d));
        if channels == 1 {
            Zip::from(labels.index_axis_mut(Axis(0), 0))
                .and(probabilities.index_axis(Axis(0), 0))
                .for_each(|out, &p| *out = if p >= threshold { 1.0 } else { 0.0 });
        } else {
            Zip::from(labels.index_axis_mut(Axis(0), 0))
                .and(probabilities.lanes(Axis(0)))
                .for_each(|out, lane| {
                    let (argmax, _) = lane.iter().enumerate().fold(
                        (0usize, f32::NEG_INFINITY),
                        |(best, best_v), (idx, &v)| if v > best_v { (idx, v) } else { (best, best_v) },
                    );
                    *out = if argmax as f32 >= threshold { 1.0 } else { 0.0 };
                });
        }
        Ok(labels)
    }
}
