//! Flip test-time augmentation.

use crate::core::batch::Tensor4D;
use crate::core::errors::SegResult;
use crate::core::traits::SegmentationNetwork;
use crate::predictors::SlidingWindowInferer2D;
use ndarray::s;

/// In-plane flips applied to a `(C, H, W, D)` volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flip {
    None,
    Height,
    Width,
    Both,
}

impl Flip {
    pub const ALL: [Flip; 4] = [Flip::None, Flip::Height, Flip::Width, Flip::Both];

    /// Applies the flip. Every flip is its own inverse.
    pub fn apply(self, volume: &Tensor4D) -> Tensor4D {
        match self {
            Flip::None => volume.clone(),
            Flip::Height => volume.slice(s![.., ..;-1, .., ..]).to_owned(),
            Flip::Width => volume.slice(s![.., .., ..;-1, ..]).to_owned(),
            Flip::Both => volume.slice(s![.., ..;-1, ..;-1, ..]).to_owned(),
        }
    }
}

/// Mean of the predictions for the input and its three flipped copies, each
/// flipped back before averaging.
pub fn flip_averaged_prediction<N>(
    inferer: &SlidingWindowInferer2D,
    network: &N,
    input: &Tensor4D,
) -> SegResult<Tensor4D>
where
    N: SegmentationNetwork + ?Sized,
{
    let mut sum: Option<Tensor4D> = None;
    for flip in Flip::ALL {
        let prediction = flip.apply(&inferer.infer(&flip.apply(input), network)?);
        match sum.as_mut() {
            Some(acc) => *acc += &prediction,
            None => sum = Some(prediction),
        }
    }
    let mut mean = sum.unwrap_or_else(|| Tensor4D::zeros((0, 0, 0, 0)));
    mean.mapv_inplace(|v| v / Flip::ALL.len() as f32);
    Ok(mean)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::InferenceEngine;
    use ndarray::Axis;

    fn is_symmetric(volume: &Tensor4D, axis: usize) -> bool {
        let mut flipped = volume.view();
        flipped.invert_axis(Axis(axis));
        flipped == volume.view()
    }

    /// Adds the window's row index to each pixel: not flip-equivariant.
    #[derive(Debug)]
    struct RowBias;

    impl InferenceEngine for RowBias {
        type Input = Tensor4D;
        type Output = Tensor4D;

        fn infer(&self, input: &Tensor4D) -> SegResult<Tensor4D> {
            Ok(Tensor4D::from_shape_fn(input.dim(), |(n, c, i, j)| {
                input[[n, c, i, j]] + i as f32
            }))
        }

        fn engine_info(&self) -> String {
            "row-bias".to_string()
        }
    }

    impl SegmentationNetwork for RowBias {
        fn out_channels(&self) -> usize {
            1
        }
    }

    #[test]
    fn flips_are_involutions() {
        let volume = Tensor4D::from_shape_fn((1, 3, 4, 2), |(_, i, j, k)| (i * 10 + j + k * 100) as f32);
        for flip in Flip::ALL {
            assert_eq!(flip.apply(&flip.apply(&volume)), volume);
        }
        assert_eq!(Flip::Height.apply(&volume)[[0, 0, 1, 0]], volume[[0, 2, 1, 0]]);
        assert_eq!(Flip::Width.apply(&volume)[[0, 0, 0, 1]], volume[[0, 0, 3, 1]]);
    }

    #[test]
    fn averaging_cancels_position_bias() {
        // Plain inference adds i; flipped along H it adds (H-1-i). The mean of
        // the four is input + (H-1)/2 everywhere.
        let inferer = SlidingWindowInferer2D::new([4, 4], 4, 0.0).unwrap();
        let input = Tensor4D::from_shape_fn((1, 4, 4, 2), |(_, i, j, k)| (i + j + k) as f32);
        let out = flip_averaged_prediction(&inferer, &RowBias, &input).unwrap();
        let expected = input.mapv(|v| v + 1.5);
        assert!((&out - &expected).iter().all(|d| d.abs() < 1e-5));
        assert!(is_symmetric(&(&out - &input), 1));
    }
}
