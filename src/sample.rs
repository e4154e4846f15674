//! Training/inference sample supplied by an external data loader.

use crate::tensor::Tensor;

/// One network input with its target.
///
/// `data` must have the network's input shape and `label` the final layer's
/// output shape; `NeuralNet` checks both before running.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub data: Tensor,
    pub label: Tensor,
}

impl Sample {
    pub fn new(data: Tensor, label: Tensor) -> Self {
        Self { data, label }
    }
}
