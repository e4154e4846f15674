//! Max-pooling layer
//!
//! Non-overlapping square windows (stride equals window size). The forward
//! step records which element of each window held the maximum so that the
//! backward step can route the window's whole delta to that element alone.

use crate::error::{NetError, NetResult};
use crate::layers::r#trait::check_shape;
use crate::layers::{Layer, LayerKind, LayerOutput};
use crate::tensor::Tensor;
use crate::utils::SimpleRng;
use crate::weight::Weight;

/// Max pooling over `[channels, rows, cols]` input.
///
/// Rows and columns that do not fill a whole window are dropped from the
/// output and receive zero delta.
#[derive(Debug, Clone)]
pub struct PoolingLayer {
    input_shape: Vec<usize>,
    window_size: usize,
}

impl PoolingLayer {
    /// # Errors
    ///
    /// `Configuration` if the input is not rank 3 or the window is zero or
    /// larger than the input.
    pub fn new(input_shape: &[usize], window_size: usize) -> NetResult<Self> {
        if input_shape.len() != 3 {
            return Err(NetError::Configuration(format!(
                "pooling expects a [channels, rows, cols] input, got {:?}",
                input_shape
            )));
        }
        if window_size == 0 || window_size > input_shape[1] || window_size > input_shape[2] {
            return Err(NetError::Configuration(format!(
                "pooling window {} does not fit input {:?}",
                window_size, input_shape
            )));
        }
        Ok(Self {
            input_shape: input_shape.to_vec(),
            window_size,
        })
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    fn output_rows(&self) -> usize {
        self.input_shape[1] / self.window_size
    }

    fn output_cols(&self) -> usize {
        self.input_shape[2] / self.window_size
    }

    /// Offset into the input buffer of element `local` (`dy * window + dx`)
    /// inside the window feeding output element `(channel, py, px)`.
    fn input_offset(&self, channel: usize, py: usize, px: usize, local: usize) -> usize {
        let (rows, cols) = (self.input_shape[1], self.input_shape[2]);
        let iy = py * self.window_size + local / self.window_size;
        let ix = px * self.window_size + local % self.window_size;
        channel * rows * cols + iy * cols + ix
    }
}

impl Layer for PoolingLayer {
    fn kind(&self) -> LayerKind {
        LayerKind::Pooling
    }

    fn input_shape(&self) -> &[usize] {
        &self.input_shape
    }

    fn output_shape(&self) -> Vec<usize> {
        vec![self.input_shape[0], self.output_rows(), self.output_cols()]
    }

    fn weight_shapes(&self) -> Option<(Vec<usize>, Vec<usize>)> {
        None
    }

    fn create_weight(&self, _rng: &mut SimpleRng) -> Option<Weight> {
        None
    }

    fn generate_output(&self, _weight: Option<&Weight>, input: &Tensor) -> NetResult<LayerOutput> {
        check_shape("pooling input", &self.input_shape, input)?;

        let window_len = self.window_size * self.window_size;
        let mut raw = Tensor::zeros(&self.output_shape());
        let mut max_indices = Vec::with_capacity(raw.len());
        let data = input.data();

        let mut out_i = 0;
        for channel in 0..self.input_shape[0] {
            for py in 0..self.output_rows() {
                for px in 0..self.output_cols() {
                    // Track argmax to route gradients during backprop. A NaN
                    // wins so that divergence is not masked.
                    let mut best = f32::NEG_INFINITY;
                    let mut best_idx = 0;
                    for local in 0..window_len {
                        let v = data[self.input_offset(channel, py, px, local)];
                        if best.is_nan() {
                            break;
                        }
                        if v > best || v.is_nan() {
                            best = v;
                            best_idx = local;
                        }
                    }
                    raw.data_mut()[out_i] = best;
                    max_indices.push(best_idx);
                    out_i += 1;
                }
            }
        }

        Ok(LayerOutput {
            raw,
            max_indices: Some(max_indices),
        })
    }

    fn activate(&self, raw: &Tensor) -> NetResult<Tensor> {
        Ok(raw.clone())
    }

    fn derive_delta(&self, _output: &LayerOutput, upstream: &Tensor) -> NetResult<Tensor> {
        check_shape("pooling delta", &self.output_shape(), upstream)?;
        Ok(upstream.clone())
    }

    fn gradient(&self, _input: &Tensor, _delta: &Tensor) -> Option<Weight> {
        None
    }

    fn calculate_backprop(
        &self,
        _weight: Option<&Weight>,
        output: &LayerOutput,
        delta: &Tensor,
    ) -> NetResult<Tensor> {
        check_shape("pooling delta", &self.output_shape(), delta)?;
        let max_indices = output.max_indices.as_ref().ok_or_else(|| {
            NetError::Configuration("pooling backprop requires the forward index map".to_string())
        })?;
        if max_indices.len() != delta.len() {
            return Err(NetError::count_mismatch(
                "pooling index map",
                delta.len(),
                max_indices.len(),
            ));
        }

        let mut previous = Tensor::zeros(&self.input_shape);
        let mut out_i = 0;
        for channel in 0..self.input_shape[0] {
            for py in 0..self.output_rows() {
                for px in 0..self.output_cols() {
                    let offset = self.input_offset(channel, py, px, max_indices[out_i]);
                    previous.data_mut()[offset] = delta.data()[out_i];
                    out_i += 1;
                }
            }
        }
        Ok(previous)
    }
}
