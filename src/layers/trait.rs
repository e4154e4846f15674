//! Layer trait definition for network stages
//!
//! Every stage of the chain (convolution, pooling, fully connected) implements
//! the same contract so the driver can sweep forward and backward without
//! knowing which variant it is talking to. Per-call intermediates are returned
//! to the caller in `LayerOutput` instead of being stored on the layer, which
//! keeps layers immutable during `train` and `predict`.

use crate::error::{NetError, NetResult};
use crate::tensor::Tensor;
use crate::utils::SimpleRng;
use crate::weight::Weight;
use std::fmt;

/// Closed set of layer variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    Convolution,
    Pooling,
    FullyConnected,
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LayerKind::Convolution => "convolution",
            LayerKind::Pooling => "pooling",
            LayerKind::FullyConnected => "fully_connected",
        };
        f.write_str(name)
    }
}

/// Pre-activation result of one forward step.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerOutput {
    /// Raw (pre-activation) output
    pub raw: Tensor,
    /// Window-local position of the maximum for each pooled element, in
    /// output order. Only pooling layers produce it.
    pub max_indices: Option<Vec<usize>>,
}

impl LayerOutput {
    pub fn new(raw: Tensor) -> Self {
        Self {
            raw,
            max_indices: None,
        }
    }
}

/// Core trait for network layers.
///
/// # Example
///
/// ```ignore
/// let out = layer.generate_output(weight, &input)?;
/// let activated = layer.activate(&out.raw)?;
/// // ... later, with the delta arriving from the next layer:
/// let delta = layer.derive_delta(&out, &upstream)?;
/// let grad = layer.gradient(&input, &delta);
/// let previous_delta = layer.calculate_backprop(weight, &out, &delta)?;
/// ```
pub trait Layer {
    fn kind(&self) -> LayerKind;

    /// Shape of the tensor this layer consumes.
    fn input_shape(&self) -> &[usize];

    /// Shape of the tensor `generate_output` produces.
    fn output_shape(&self) -> Vec<usize>;

    /// `(weight_shape, bias_shape)` for parametric layers, `None` otherwise.
    fn weight_shapes(&self) -> Option<(Vec<usize>, Vec<usize>)>;

    /// Allocate freshly initialized parameters, `None` for parameter-free layers.
    fn create_weight(&self, rng: &mut SimpleRng) -> Option<Weight>;

    /// Pre-activation forward computation.
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` if `input` does not have `input_shape()`.
    fn generate_output(&self, weight: Option<&Weight>, input: &Tensor) -> NetResult<LayerOutput>;

    /// Apply the layer's nonlinearity to a raw output.
    fn activate(&self, raw: &Tensor) -> NetResult<Tensor>;

    /// Convert the delta arriving from the next layer into this layer's local
    /// delta (chain rule through the activation only).
    fn derive_delta(&self, output: &LayerOutput, upstream: &Tensor) -> NetResult<Tensor>;

    /// Parameter gradient from the cached input and local delta.
    ///
    /// `input` must have `input_shape()` and `delta` must have
    /// `output_shape()`; both come straight from a forward pass and
    /// `derive_delta`, which check them. Debug builds assert it.
    fn gradient(&self, input: &Tensor, delta: &Tensor) -> Option<Weight>;

    /// Delta handed to the previous layer, shaped like `input_shape()`.
    fn calculate_backprop(
        &self,
        weight: Option<&Weight>,
        output: &LayerOutput,
        delta: &Tensor,
    ) -> NetResult<Tensor>;

    /// Number of trainable scalars.
    fn parameter_count(&self) -> usize {
        self.weight_shapes()
            .map(|(w, b)| w.iter().product::<usize>() + b.iter().product::<usize>())
            .unwrap_or(0)
    }
}

pub(crate) fn check_shape(context: &str, expected: &[usize], tensor: &Tensor) -> NetResult<()> {
    if tensor.shape() != expected {
        return Err(NetError::shape_mismatch(context, expected, tensor.shape()));
    }
    Ok(())
}

/// The weight a parametric layer was handed, checked against its declared shapes.
pub(crate) fn require_weight<'a, L: Layer + ?Sized>(
    layer: &L,
    weight: Option<&'a Weight>,
) -> NetResult<&'a Weight> {
    let weight = weight
        .ok_or_else(|| NetError::Configuration(format!("{} layer has no weight", layer.kind())))?;
    if let Some((weight_shape, bias_shape)) = layer.weight_shapes() {
        check_shape("layer weight", &weight_shape, &weight.w)?;
        check_shape("layer bias", &bias_shape, &weight.b)?;
    }
    Ok(weight)
}
