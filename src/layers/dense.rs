//! Fully connected layer implementation
//!
//! This module provides a FullyConnectedLayer that performs the transformation
//! `output = W · flatten(input) + b` on an input of any shape.

use crate::error::{NetError, NetResult};
use crate::layers::r#trait::{check_shape, require_weight};
use crate::layers::{Layer, LayerKind, LayerOutput, INITIAL_BIAS};
use crate::tensor::Tensor;
use crate::utils::{Activator, SimpleRng};
use crate::weight::Weight;

/// Fully connected (dense) layer.
///
/// `W` is stored row-major as `[output_size, input_size]`, `b` as
/// `[output_size]`. The input is flattened before the product and the delta
/// sent back is reshaped to the original input shape.
///
/// # Example
///
/// ```
/// use rust_convnet::layers::{FullyConnectedLayer, Layer};
/// use rust_convnet::utils::Activator;
///
/// let layer = FullyConnectedLayer::new(&[8, 12, 12], 10, Activator::Sigmoid).unwrap();
/// assert_eq!(layer.input_size(), 1152);
/// assert_eq!(layer.output_shape(), vec![10]);
/// ```
#[derive(Debug, Clone)]
pub struct FullyConnectedLayer {
    input_shape: Vec<usize>,
    output_size: usize,
    activator: Activator,
}

impl FullyConnectedLayer {
    /// # Errors
    ///
    /// `Configuration` if the input or output size is zero.
    pub fn new(input_shape: &[usize], output_size: usize, activator: Activator) -> NetResult<Self> {
        if input_shape.is_empty() || input_shape.iter().product::<usize>() == 0 {
            return Err(NetError::Configuration(format!(
                "fully connected layer needs a non-empty input, got {:?}",
                input_shape
            )));
        }
        if output_size == 0 {
            return Err(NetError::Configuration(
                "out_dim must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            input_shape: input_shape.to_vec(),
            output_size,
            activator,
        })
    }

    /// Number of input features after flattening.
    pub fn input_size(&self) -> usize {
        self.input_shape.iter().product()
    }

    pub fn output_size(&self) -> usize {
        self.output_size
    }

    pub fn activator(&self) -> Activator {
        self.activator
    }
}

/// `matrix · vector` for a row-major `[rows, cols]` matrix.
fn mat_vec(matrix: &Tensor, vector: &[f32]) -> Vec<f32> {
    let cols = matrix.shape()[1];
    matrix
        .data()
        .chunks_exact(cols)
        .map(|row| row.iter().zip(vector).map(|(w, x)| w * x).sum())
        .collect()
}

impl Layer for FullyConnectedLayer {
    fn kind(&self) -> LayerKind {
        LayerKind::FullyConnected
    }

    fn input_shape(&self) -> &[usize] {
        &self.input_shape
    }

    fn output_shape(&self) -> Vec<usize> {
        vec![self.output_size]
    }

    fn weight_shapes(&self) -> Option<(Vec<usize>, Vec<usize>)> {
        Some((
            vec![self.output_size, self.input_size()],
            vec![self.output_size],
        ))
    }

    /// Xavier initialization: uniform in `[-limit, limit]` with
    /// `limit = sqrt(6 / (input_size + output_size))`.
    fn create_weight(&self, rng: &mut SimpleRng) -> Option<Weight> {
        let (weight_shape, bias_shape) = self.weight_shapes()?;
        let limit = (6.0f32 / (self.input_size() + self.output_size) as f32).sqrt();
        Some(Weight::new(
            rng.uniform_tensor(&weight_shape, limit),
            Tensor::filled(&bias_shape, INITIAL_BIAS),
        ))
    }

    fn generate_output(&self, weight: Option<&Weight>, input: &Tensor) -> NetResult<LayerOutput> {
        let weight = require_weight(self, weight)?;
        check_shape("fully connected input", &self.input_shape, input)?;

        let mut raw = Tensor::from_vec(mat_vec(&weight.w, input.data()), &[self.output_size])?;
        raw.add_inplace(&weight.b);
        Ok(LayerOutput::new(raw))
    }

    fn activate(&self, raw: &Tensor) -> NetResult<Tensor> {
        self.activator.output(raw)
    }

    fn derive_delta(&self, output: &LayerOutput, upstream: &Tensor) -> NetResult<Tensor> {
        check_shape("fully connected delta", &self.output_shape(), upstream)?;
        Ok(upstream.mul(&self.activator.derivative(&output.raw)?))
    }

    /// `outer(delta, flatten(input))` for the weights, `delta` for the bias.
    fn gradient(&self, input: &Tensor, delta: &Tensor) -> Option<Weight> {
        debug_assert_eq!(
            input.shape(),
            self.input_shape.as_slice(),
            "fully connected gradient input shape"
        );
        debug_assert_eq!(
            delta.shape(),
            self.output_shape().as_slice(),
            "fully connected gradient delta shape"
        );
        let (weight_shape, _) = self.weight_shapes()?;
        let mut grad_w = Tensor::zeros(&weight_shape);
        for (row, &d) in grad_w
            .data_mut()
            .chunks_exact_mut(self.input_size())
            .zip(delta.data())
        {
            for (g, &x) in row.iter_mut().zip(input.data()) {
                *g = d * x;
            }
        }
        Some(Weight::new(grad_w, delta.clone()))
    }

    fn calculate_backprop(
        &self,
        weight: Option<&Weight>,
        _output: &LayerOutput,
        delta: &Tensor,
    ) -> NetResult<Tensor> {
        let weight = require_weight(self, weight)?;
        check_shape("fully connected delta", &self.output_shape(), delta)?;

        let previous = mat_vec(&weight.w.transpose(), delta.data());
        Tensor::from_vec(previous, &self.input_shape)
    }
}
