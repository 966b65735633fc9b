//! Whole-pipeline run with an in-process network.

use fetal_seg::core::config::SegmentationConfig;
use fetal_seg::core::errors::SegResult;
use fetal_seg::core::traits::{InferenceEngine, SegmentationNetwork};
use fetal_seg::core::Tensor4D;
use fetal_seg::pipeline::{SegmentationPipelineBuilder, discover_cases};
use fetal_seg::utils::NiftiVolume;
use nalgebra::{Matrix4, Vector3};
use ndarray::{Array3, Axis};

/// Passes the single input channel through as the foreground logit.
#[derive(Debug)]
struct PassThrough;

impl InferenceEngine for PassThrough {
    type Input = Tensor4D;
    type Output = Tensor4D;

    fn infer(&self, input: &Tensor4D) -> SegResult<Tensor4D> {
        Ok(input.select(Axis(1), &[0]))
    }

    fn engine_info(&self) -> String {
        "pass-through".to_string()
    }
}

impl SegmentationNetwork for PassThrough {
    fn out_channels(&self) -> usize {
        1
    }
}

const CONFIG: &str = r#"
device:
  num_workers: 0
inference:
  nr_out_channels: 1
  spacing: [0.8, 0.8, -1.0]
  probability_threshold: 0.5
  model_to_load: default
  inplane_size: [16, 16]
  sw_batch_size: 3
"#;

#[test]
fn batch_run_writes_masks_on_the_input_grid() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("image");
    let input = root.join("sub01").join("case_reo").join("x.nii.gz");

    // A bright square in the middle of each slice, 1.2 x 1.2 x 4 mm voxels.
    let (h, w, d) = (21, 17, 3);
    let data = Array3::from_shape_fn((h, w, d), |(i, j, _)| {
        if (6..15).contains(&i) && (5..12).contains(&j) { 500.0 } else { 10.0 }
    });
    let mut affine = Matrix4::new_nonuniform_scaling(&Vector3::new(1.2, 1.2, 4.0));
    affine[(0, 3)] = -12.0;
    affine[(1, 3)] = 7.5;
    NiftiVolume::new(data.clone(), affine).save(&input).unwrap();

    let config = SegmentationConfig::from_yaml_str(CONFIG).unwrap();
    let mut pipeline = SegmentationPipelineBuilder::new(config)
        .network(PassThrough)
        .build()
        .unwrap();

    let cases = discover_cases(&root, pipeline.naming()).unwrap();
    assert_eq!(cases.len(), 1);
    let report = pipeline.run(cases).unwrap();
    assert!(report.is_success(), "{:?}", report.failed);

    let expected = dir
        .path()
        .join("mask")
        .join("sub01")
        .join("case_seg")
        .join("x.nii.gz");
    assert_eq!(report.processed[0].output, expected);

    let mask = NiftiVolume::load(&expected).unwrap();
    assert_eq!(mask.data.dim(), (h, w, d));
    assert!((mask.affine - affine).abs().max() < 1e-4);
    assert!(mask.data.iter().all(|&v| v == 0.0 || v == 1.0));
    // Centre of the square is foreground, corners are background.
    assert_eq!(mask.data[[10, 8, 1]], 1.0);
    assert_eq!(mask.data[[0, 0, 0]], 0.0);
    assert_eq!(mask.data[[h - 1, w - 1, d - 1]], 0.0);

    // A second pass finds nothing left to do.
    assert!(discover_cases(&root, pipeline.naming()).unwrap().is_empty());
}
