//! Slice-wise sliding-window inference.
//!
//! The network sees 2D windows only. Every depth slice of a `(C, H, W, D)`
//! volume is tiled with roi-sized windows, windows are sent through the
//! network in batches, and overlapping window outputs are averaged.

use crate::core::batch::Tensor4D;
use crate::core::errors::{ProcessingStage, SegError, SegResult};
use crate::core::traits::SegmentationNetwork;
use ndarray::{Array3, Axis, s};
use tracing::debug;

/// Sliding-window inferer over the in-plane axes of a volume.
#[derive(Debug, Clone)]
pub struct SlidingWindowInferer2D {
    roi_size: [usize; 2],
    sw_batch_size: usize,
    overlap: f32,
}

impl SlidingWindowInferer2D {
    /// Creates an inferer for windows of `roi_size` (H, W).
    ///
    /// `overlap` is the fraction of a window shared with its neighbour and must
    /// lie in `[0, 1)`.
    pub fn new(roi_size: [usize; 2], sw_batch_size: usize, overlap: f32) -> SegResult<Self> {
        if roi_size.contains(&0) {
            return Err(SegError::invalid_field(
                "roi_size",
                "non-zero window size",
                format!("{:?}", roi_size),
            ));
        }
        if sw_batch_size == 0 {
            return Err(SegError::invalid_field(
                "sw_batch_size",
                "at least 1",
                "0",
            ));
        }
        if !(0.0..1.0).contains(&overlap) {
            return Err(SegError::invalid_field(
                "overlap",
                "a fraction in [0, 1)",
                overlap.to_string(),
            ));
        }
        Ok(Self {
            roi_size,
            sw_batch_size,
            overlap,
        })
    }

    /// Window start offsets along an axis of `size` (already padded to at
    /// least `roi`). The last window is aligned to the end of the axis.
    fn window_starts(&self, size: usize, roi: usize) -> Vec<usize> {
        if size <= roi {
            return vec![0];
        }
        // Truncated, never below one.
        let interval = ((roi as f32 * (1.0 - self.overlap)) as usize).max(1);
        let count = (size - roi).div_ceil(interval) + 1;
        (0..count)
            .map(|i| (i * interval).min(size - roi))
            .collect()
    }

    /// Runs `network` over every window of `input` `(C, H, W, D)` and returns
    /// the averaged `(C_out, H, W, D)` prediction.
    pub fn infer<N>(&self, input: &Tensor4D, network: &N) -> SegResult<Tensor4D>
    where
        N: SegmentationNetwork + ?Sized,
    {
        let (channels, h, w, d) = input.dim();
        if channels == 0 || h == 0 || w == 0 || d == 0 {
            return Err(SegError::shape_mismatch(
                "sliding_window_input",
                &[1, self.roi_size[0], self.roi_size[1], 1],
                input.shape(),
                "volume has an empty axis",
            ));
        }
        let [roi_h, roi_w] = self.roi_size;

        // Zero-pad symmetrically up to the window size.
        let pad_h = roi_h.saturating_sub(h);
        let pad_w = roi_w.saturating_sub(w);
        let (top, left) = (pad_h / 2, pad_w / 2);
        let (ph, pw) = (h + pad_h, w + pad_w);
        let mut padded = Tensor4D::zeros((channels, ph, pw, d));
        padded
            .slice_mut(s![.., top..top + h, left..left + w, ..])
            .assign(input);

        let windows: Vec<(usize, usize, usize)> = (0..d)
            .flat_map(|k| {
                let starts_w = self.window_starts(pw, roi_w);
                self.window_starts(ph, roi_h)
                    .into_iter()
                    .flat_map(move |sh| starts_w.clone().into_iter().map(move |sw| (k, sh, sw)))
            })
            .collect();
        debug!(
            "sliding window: {} windows of {:?} over {:?}, batch {}",
            windows.len(),
            self.roi_size,
            [ph, pw, d],
            self.sw_batch_size
        );

        let out_channels = network.out_channels();
        let mut output = Tensor4D::zeros((out_channels, ph, pw, d));
        let mut counts = Array3::<f32>::zeros((ph, pw, d));

        for (batch_idx, chunk) in windows.chunks(self.sw_batch_size).enumerate() {
            let mut batch = Tensor4D::zeros((chunk.len(), channels, roi_h, roi_w));
            for (slot, &(k, sh, sw)) in chunk.iter().enumerate() {
                batch
                    .index_axis_mut(Axis(0), slot)
                    .assign(&padded.slice(s![.., sh..sh + roi_h, sw..sw + roi_w, k]));
            }

            let logits = network.infer(&batch).map_err(|e| {
                SegError::processing(
                    ProcessingStage::SlidingWindow,
                    format!("window batch {} of {} windows", batch_idx, chunk.len()),
                    e,
                )
            })?;
            if logits.dim() != (chunk.len(), out_channels, roi_h, roi_w) {
                return Err(SegError::shape_mismatch(
                    "sliding_window_output",
                    &[chunk.len(), out_channels, roi_h, roi_w],
                    logits.shape(),
                    "network output for a window batch",
                ));
            }

            for (slot, &(k, sh, sw)) in chunk.iter().enumerate() {
                let mut target = output.slice_mut(s![.., sh..sh + roi_h, sw..sw + roi_w, k]);
                target += &logits.index_axis(Axis(0), slot);
                counts
                    .slice_mut(s![sh..sh + roi_h, sw..sw + roi_w, k])
                    .mapv_inplace(|c| c + 1.0);
            }
        }

        for mut channel in output.axis_iter_mut(Axis(0)) {
            channel.zip_mut_with(&counts, |v, &c| {
                if c > 0.0 {
                    *v /= c;
                }
            });
        }

        Ok(output
            .slice(s![.., top..top + h, left..left + w, ..])
            .to_owned())
    }
}
