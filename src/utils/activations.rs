//! Activation functions for network layers
//!
//! `Activator` is a closed set of nonlinearities selected by configuration.
//! Only sigmoid has an implementation; the other variants exist so that
//! configurations naming them are recognised, and fail explicitly when used.

use crate::error::{NetError, NetResult};
use crate::tensor::Tensor;

/// Sigmoid activation function.
///
/// Returns the sigmoid of the input: 1 / (1 + exp(-x))
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Sigmoid derivative assuming x = sigmoid(z).
///
/// Returns the derivative: x * (1 - x)
pub fn sigmoid_derivative(x: f32) -> f32 {
    x * (1.0 - x)
}

/// Nonlinearity applied after a parametric layer's affine step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Activator {
    #[default]
    Sigmoid,
    RectifiedLinear,
    Softmax,
}

impl Activator {
    /// Parse a configuration name ("sigmoid", "relu", "softmax").
    pub fn from_name(name: &str) -> NetResult<Self> {
        match name.to_lowercase().as_str() {
            "sigmoid" => Ok(Activator::Sigmoid),
            "relu" | "rectified_linear" => Ok(Activator::RectifiedLinear),
            "softmax" => Ok(Activator::Softmax),
            other => Err(NetError::Configuration(format!(
                "Invalid activator '{}'. Must be one of: sigmoid, relu, softmax",
                other
            ))),
        }
    }

    /// Fails unless both `output` and `derivative` are implemented.
    pub fn ensure_supported(self) -> NetResult<()> {
        match self {
            Activator::Sigmoid => Ok(()),
            Activator::RectifiedLinear | Activator::Softmax => {
                Err(NetError::UnsupportedActivation(self))
            }
        }
    }

    /// Apply the nonlinearity to a raw (pre-activation) tensor.
    pub fn output(self, raw: &Tensor) -> NetResult<Tensor> {
        self.ensure_supported()?;
        Ok(raw.map(sigmoid))
    }

    /// Local derivative evaluated at the raw (pre-activation) tensor.
    pub fn derivative(self, raw: &Tensor) -> NetResult<Tensor> {
        self.ensure_supported()?;
        Ok(raw.map(|z| sigmoid_derivative(sigmoid(z))))
    }
}
