use super::*;
use crate::core::errors::SimpleError;
use ndarray::ArrayView4;
use ort::value::TensorRef;

impl OrtInfer {
    fn run_inference_with_processor<T>(
        &self,
        x: &Tensor4D,
        processor: impl FnOnce(&[i64], &[f32]) -> Result<T, SegError>,
    ) -> Result<T, SegError> {
        let input_shape = x.shape().to_vec();

        let output_name = self.output_name.as_str();

        // ORT needs a contiguous buffer; window batches built by slicing may not be.
        let contiguous = x.as_standard_layout();
        let input_tensor = TensorRef::from_array_view(contiguous.view()).map_err(|e| {
            SegError::model_inference_error(
                &self.model_name,
                "tensor_conversion",
                0,
                &input_shape,
                &format!("failed to convert input tensor with shape {:?}", input_shape),
                e,
            )
        })?;

        let inputs = ort::inputs![self.input_name.as_str() => input_tensor];

        let mut session_guard = self.session.lock().map_err(|_| {
            SegError::inference_error(
                &self.model_name,
                "session lock poisoned by an earlier panic",
                SimpleError::new("session lock acquisition failed"),
            )
        })?;

        let outputs = session_guard.run(inputs).map_err(|e| {
            SegError::model_inference_error(
                &self.model_name,
                "forward_pass",
                0,
                &input_shape,
                &format!(
                    "ONNX Runtime inference failed with input '{}' -> output '{}'",
                    self.input_name, output_name
                ),
                e,
            )
        })?;

        let (output_shape, output_data) = outputs[output_name]
            .try_extract_tensor::<f32>()
            .map_err(|e| {
                SegError::model_inference_error(
                    &self.model_name,
                    "output_extraction",
                    0,
                    &input_shape,
                    &format!("failed to extract output tensor '{}' as f32", output_name),
                    e,
                )
            })?;

        processor(output_shape, output_data)
    }

    /// Runs a `(B, C, H, W)` batch and returns the `(B, C_out, H, W)` output.
    pub fn infer_4d(&self, x: &Tensor4D) -> Result<Tensor4D, SegError> {
        self.run_inference_with_processor(x, |output_shape, output_data| {
            if output_shape.len() != 4 {
                return Err(SegError::tensor_operation_error(
                    "output_validation",
                    &[4],
                    &[output_shape.len()],
                    &format!(
                        "model '{}' 4D inference: expected 4D output tensor, got {}D with shape {:?}",
                        self.model_name,
                        output_shape.len(),
                        output_shape
                    ),
                    SimpleError::new("invalid output tensor dimensions"),
                ));
            }

            let batch_size_out = output_shape[0] as usize;
            let channels_out = output_shape[1] as usize;
            let height_out = output_shape[2] as usize;
            let width_out = output_shape[3] as usize;
            let expected_len = batch_size_out * channels_out * height_out * width_out;

            if output_data.len() != expected_len {
                return Err(SegError::invalid_input(format!(
                    "output data size mismatch: expected {}, got {}",
                    expected_len,
                    output_data.len()
                )));
            }

            let array_view = ArrayView4::from_shape(
                (batch_size_out, channels_out, height_out, width_out),
                output_data,
            )
            .map_err(SegError::Tensor)?;
            Ok(array_view.to_owned())
        })
    }
}
