//! Trainable parameter unit of a layer
//!
//! A `Weight` pairs a weight tensor with a bias tensor. The same type carries
//! gradients and momentum accumulators, which always share the shapes of the
//! parameters they belong to.

use crate::tensor::Tensor;
use serde::{Deserialize, Serialize};

/// Weight and bias tensors of one parametric layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weight {
    pub w: Tensor,
    pub b: Tensor,
}

impl Weight {
    pub fn new(w: Tensor, b: Tensor) -> Self {
        Self { w, b }
    }

    /// All-zero unit with the given shapes (fresh accumulator or gradient sum).
    pub fn zeros(weight_shape: &[usize], bias_shape: &[usize]) -> Self {
        Self {
            w: Tensor::zeros(weight_shape),
            b: Tensor::zeros(bias_shape),
        }
    }

    /// Zero unit shaped like `self`.
    pub fn zeros_like(&self) -> Self {
        Self::zeros(self.w.shape(), self.b.shape())
    }

    pub fn weight_shape(&self) -> &[usize] {
        self.w.shape()
    }

    pub fn bias_shape(&self) -> &[usize] {
        self.b.shape()
    }

    pub fn same_shape(&self, other: &Weight) -> bool {
        self.weight_shape() == other.weight_shape() && self.bias_shape() == other.bias_shape()
    }

    /// Add another unit of the same shape, e.g. when summing per-sample gradients.
    pub fn accumulate(&mut self, other: &Weight) {
        self.w.add_inplace(&other.w);
        self.b.add_inplace(&other.b);
    }

    /// Multiply both tensors by `factor`, e.g. to average a gradient sum.
    pub fn scale(&mut self, factor: f32) {
        self.w.scale_inplace(factor);
        self.b.scale_inplace(factor);
    }

    pub fn parameter_count(&self) -> usize {
        self.w.len() + self.b.len()
    }
}
