//! 2D DynUNet: topology derivation and ONNX binding.

use crate::core::batch::Tensor4D;
use crate::core::config::OrtSessionConfig;
use crate::core::errors::{SegError, SegResult};
use crate::core::inference::OrtInfer;
use crate::core::traits::{InferenceEngine, SegmentationNetwork};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info};

/// Smallest in-plane size that is still halved by a stride-2 level.
const MIN_HALVABLE_SIZE: f64 = 8.0;
/// Spacing anisotropy above which an axis is neither convolved nor strided.
const MAX_SPACING_RATIO: f64 = 2.0;

/// Kernel and stride schedule of a DynUNet, one entry per resolution level.
///
/// `strides[0]` is always `[1, 1]` (the input block), the last kernel is
/// always `[3, 3]` (the bottleneck), and the transposed-convolution kernels of
/// the decoder mirror `strides[1..]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DynUnetTopology {
    pub kernels: Vec<[usize; 2]>,
    pub strides: Vec<[usize; 2]>,
    pub upsample_kernels: Vec<[usize; 2]>,
}

impl DynUnetTopology {
    /// Derives the schedule from the in-plane training spacing and patch size.
    ///
    /// Each level strides an axis by 2 while its spacing is within twice the
    /// finest spacing and its size is at least 8; axes more anisotropic than
    /// that get a kernel of 1. Striding an axis doubles its effective spacing,
    /// so coarse axes join in once the fine ones have caught up.
    pub fn derive(spacing: [f64; 2], patch_size: [usize; 2]) -> SegResult<Self> {
        if let Some(bad) = spacing.iter().find(|s| !s.is_finite() || **s <= 0.0) {
            return Err(SegError::invalid_field(
                "inference.spacing",
                "positive in-plane spacing",
                bad.to_string(),
            ));
        }
        if patch_size.contains(&0) {
            return Err(SegError::invalid_field(
                "inference.inplane_size",
                "non-zero patch size",
                format!("{:?}", patch_size),
            ));
        }

        let mut spacings = spacing;
        let mut sizes = [patch_size[0] as f64, patch_size[1] as f64];
        let mut strides = Vec::new();
        let mut kernels = Vec::new();
        loop {
            let min_spacing = spacings[0].min(spacings[1]);
            let ratio = [spacings[0] / min_spacing, spacings[1] / min_spacing];
            let mut stride = [1usize; 2];
            let mut kernel = [1usize; 2];
            for axis in 0..2 {
                if ratio[axis] <= MAX_SPACING_RATIO {
                    kernel[axis] = 3;
                    if sizes[axis] >= MIN_HALVABLE_SIZE {
                        stride[axis] = 2;
                    }
                }
            }
            if stride == [1, 1] {
                break;
            }
            for axis in 0..2 {
                sizes[axis] /= stride[axis] as f64;
                spacings[axis] *= stride[axis] as f64;
            }
            kernels.push(kernel);
            strides.push(stride);
        }
        strides.insert(0, [1, 1]);
        kernels.push([3, 3]);
        let upsample_kernels = strides[1..].to_vec();

        Ok(Self {
            kernels,
            strides,
            upsample_kernels,
        })
    }

    /// Number of resolution levels, including the input block.
    pub fn depth(&self) -> usize {
        self.strides.len()
    }

    /// Product of all strides per axis: the total downsampling factor.
    pub fn total_stride(&self) -> [usize; 2] {
        self.strides
            .iter()
            .fold([1, 1], |acc, s| [acc[0] * s[0], acc[1] * s[1]])
    }

    /// Checks that a patch survives every downsampling step without remainder.
    pub fn check_patch(&self, patch_size: [usize; 2]) -> SegResult<()> {
        let total = self.total_stride();
        if patch_size[0] % total[0] != 0 || patch_size[1] % total[1] != 0 {
            return Err(SegError::config_error(format!(
                "patch size {:?} is not divisible by the total stride {:?}",
                patch_size, total
            )));
        }
        Ok(())
    }
}

/// The segmentation network: a derived topology bound to an inference engine.
#[derive(Debug)]
pub struct DynUnet<E = OrtInfer> {
    engine: E,
    topology: DynUnetTopology,
    patch_size: [usize; 2],
    in_channels: usize,
    out_channels: usize,
}

impl DynUnet<OrtInfer> {
    /// Opens the ONNX export at `model_path` and binds it to `topology`.
    ///
    /// Static input dimensions declared by the model are checked against one
    /// input channel and `patch_size`.
    pub fn load(
        model_path: impl AsRef<Path>,
        session: &OrtSessionConfig,
        topology: DynUnetTopology,
        patch_size: [usize; 2],
        out_channels: usize,
    ) -> SegResult<Self> {
        let model_path = model_path.as_ref();
        if !model_path.is_file() {
            return Err(SegError::model_load_error(
                model_path,
                "trained model not found",
                Some("point inference.model_to_load or --default-model at an ONNX export"),
                None::<crate::core::errors::SimpleError>,
            ));
        }
        let engine = OrtInfer::from_config(session, model_path)?;
        if let Some(shape) = engine.primary_input_shape() {
            debug!("model '{}' declares input shape {:?}", engine.model_name(), shape);
            Self::check_declared_input(shape, patch_size)?;
        }
        info!("loaded {}", engine.engine_info());
        Self::new(engine, topology, patch_size, out_channels)
    }

    fn check_declared_input(shape: &[i64], patch_size: [usize; 2]) -> SegResult<()> {
        if shape.len() != 4 {
            return Err(SegError::config_error(format!(
                "model input must be (B, C, H, W), declared {:?}",
                shape
            )));
        }
        if shape[1] > 0 && shape[1] != 1 {
            return Err(SegError::config_error(format!(
                "model expects {} input channels, pipeline provides 1",
                shape[1]
            )));
        }
        for (axis, &size) in shape[2..].iter().enumerate() {
            if size > 0 && size as usize != patch_size[axis] {
                return Err(SegError::config_error(format!(
                    "model input is fixed to {:?} but inplane_size is {:?}",
                    &shape[2..],
                    patch_size
                )));
            }
        }
        Ok(())
    }
}

impl<E> DynUnet<E>
where
    E: InferenceEngine<Input = Tensor4D, Output = Tensor4D>,
{
    /// Binds an engine to a topology after checking the patch size fits it.
    pub fn new(
        engine: E,
        topology: DynUnetTopology,
        patch_size: [usize; 2],
        out_channels: usize,
    ) -> SegResult<Self> {
        if out_channels == 0 {
            return Err(SegError::config_error(
                "incompatible number of output channels: 0",
            ));
        }
        topology.check_patch(patch_size)?;
        Ok(Self {
            engine,
            topology,
            patch_size,
            in_channels: 1,
            out_channels,
        })
    }
}

impl<E> InferenceEngine for DynUnet<E>
where
    E: InferenceEngine<Input = Tensor4D, Output = Tensor4D>,
{
    type Input = Tensor4D;
    type Output = Tensor4D;

    fn infer(&self, input: &Tensor4D) -> SegResult<Tensor4D> {
        self.validate_inference_input(input)?;
        let output = self.engine.infer(input)?;
        let (b, _, h, w) = input.dim();
        let expected = [b, self.out_channels, h, w];
        if output.shape() != expected {
            return Err(SegError::shape_mismatch(
                "dynunet_output",
                &expected,
                output.shape(),
                "network output does not match batch, channel count and window size",
            ));
        }
        Ok(output)
    }

    fn engine_info(&self) -> String {
        format!(
            "DynUNet(levels={}, patch={:?}, out_channels={}) on {}",
            self.topology.depth(),
            self.patch_size,
            self.out_channels,
            self.engine.engine_info()
        )
    }

    fn validate_inference_input(&self, input: &Tensor4D) -> SegResult<()> {
        let (b, c, h, w) = input.dim();
        if b == 0 || c != self.in_channels {
            return Err(SegError::shape_mismatch(
                "dynunet_input",
                &[b.max(1), self.in_channels, h, w],
                input.shape(),
                "window batch",
            ));
        }
        let total = self.topology.total_stride();
        if h % total[0] != 0 || w % total[1] != 0 {
            return Err(SegError::invalid_input(format!(
                "window {}x{} is not divisible by the total stride {:?}",
                h, w, total
            )));
        }
        self.engine.validate_inference_input(input)
    }
}

impl<E> SegmentationNetwork for DynUnet<E>
where
    E: InferenceEngine<Input = Tensor4D, Output = Tensor4D>,
{
    fn out_channels(&self) -> usize {
        self.out_channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Axis;

    #[test]
    fn isotropic_spacing_halves_down_to_four() {
        let topo = DynUnetTopology::derive([1.0, 1.0], [64, 64]).unwrap();
        // 64 -> 32 -> 16 -> 8 -> 4
        assert_eq!(
            topo.strides,
            vec![[1, 1], [2, 2], [2, 2], [2, 2], [2, 2]]
        );
        assert_eq!(topo.kernels, vec![[3, 3]; 5]);
        assert_eq!(topo.upsample_kernels, vec![[2, 2]; 4]);
        assert_eq!(topo.total_stride(), [16, 16]);
        assert_eq!(topo.depth(), 5);
    }

    #[test]
    fn anisotropic_axis_waits_until_spacing_catches_up() {
        let topo = DynUnetTopology::derive([1.0, 3.0], [64, 64]).unwrap();
        assert_eq!(topo.strides[0], [1, 1]);
        assert_eq!(topo.strides[1], [2, 1]);
        assert_eq!(topo.kernels[0], [3, 1]);
        assert_eq!(
            topo.strides,
            vec![[1, 1], [2, 1], [2, 2], [2, 2], [2, 2], [1, 2]]
        );
        assert_eq!(*topo.kernels.last().unwrap(), [3, 3]);
        assert_eq!(topo.total_stride(), [16, 16]);
    }

    #[test]
    fn trained_patch_size_schedule() {
        let topo = DynUnetTopology::derive([0.8, 0.8], [448, 512]).unwrap();
        // 448 stops at 7 after six halvings; 512 is halved once more.
        assert_eq!(topo.strides.len(), 8);
        assert_eq!(topo.strides[7], [1, 2]);
        assert_eq!(topo.total_stride(), [64, 128]);
        topo.check_patch([448, 512]).unwrap();
        assert!(topo.check_patch([450, 512]).is_err());
    }

    #[test]
    fn rejects_degenerate_inputs() {
        assert!(DynUnetTopology::derive([0.0, 1.0], [64, 64]).is_err());
        assert!(DynUnetTopology::derive([1.0, 1.0], [0, 64]).is_err());
    }

    #[derive(Debug)]
    struct Echo {
        channels: usize,
    }

    impl InferenceEngine for Echo {
        type Input = Tensor4D;
        type Output = Tensor4D;

        fn infer(&self, input: &Tensor4D) -> SegResult<Tensor4D> {
            let mut out = input.clone();
            for _ in 1..self.channels {
                out.append(Axis(1), input.view()).unwrap();
            }
            Ok(out)
        }

        fn engine_info(&self) -> String {
            "echo".to_string()
        }
    }

    #[test]
    fn forward_checks_shapes() {
        let topo = DynUnetTopology::derive([1.0, 1.0], [16, 16]).unwrap();
        let net = DynUnet::new(Echo { channels: 2 }, topo.clone(), [16, 16], 2).unwrap();
        let out = net.infer(&Tensor4D::zeros((3, 1, 16, 16))).unwrap();
        assert_eq!(out.dim(), (3, 2, 16, 16));
        assert_eq!(net.out_channels(), 2);

        // Wrong number of input channels.
        assert!(net.infer(&Tensor4D::zeros((1, 2, 16, 16))).is_err());
        // Not divisible by the total stride.
        assert!(net.infer(&Tensor4D::zeros((1, 1, 14, 16))).is_err());

        // Engine produces fewer channels than configured.
        let mismatched = DynUnet::new(Echo { channels: 1 }, topo.clone(), [16, 16], 2).unwrap();
        assert!(mismatched.infer(&Tensor4D::zeros((1, 1, 16, 16))).is_err());

        assert!(DynUnet::new(Echo { channels: 1 }, topo, [16, 16], 0).is_err());
    }

    #[test]
    fn declared_input_shape_is_checked() {
        DynUnet::check_declared_input(&[-1, 1, -1, -1], [448, 512]).unwrap();
        DynUnet::check_declared_input(&[1, 1, 448, 512], [448, 512]).unwrap();
        assert!(DynUnet::check_declared_input(&[1, 3, -1, -1], [448, 512]).is_err());
        assert!(DynUnet::check_declared_input(&[1, 1, 256, 256], [448, 512]).is_err());
        assert!(DynUnet::check_declared_input(&[1, 1, 448], [448, 512]).is_err());
    }
}
