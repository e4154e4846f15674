//! Network configuration
//!
//! `NeuralNetConfig` is parsed from JSON and describes the input shape, the
//! ordered layer list and the training hyperparameters.
//!
//! # Example
//!
//! ```json
//! {
//!   "input_shape": [1, 28, 28],
//!   "learning_rate": 0.1,
//!   "decay_lambda": 0.00001,
//!   "momentum": 0.9,
//!   "drop_out_rate": 0.0,
//!   "seed": 42,
//!   "layers": [
//!     { "layer_type": "convolution", "filter_rows": 5, "filter_cols": 5, "num_filters": 6 },
//!     { "layer_type": "pooling", "window_size": 2 },
//!     { "layer_type": "fully_connected", "out_dim": 10, "activator": "sigmoid" }
//!   ]
//! }
//! ```

use crate::architecture::{validate_layer, LayerConfig};
use crate::error::{NetError, NetResult};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Scalar training hyperparameters.
///
/// Missing fields take the defaults below (momentum 0.95, decay 1e-5).
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct HyperParams {
    pub learning_rate: f32,
    /// L2 weight-decay coefficient
    pub decay_lambda: f32,
    pub momentum: f32,
    /// Validated and stored; no dropout is applied during training.
    pub drop_out_rate: f32,
}

impl Default for HyperParams {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            decay_lambda: 1e-5,
            momentum: 0.95,
            drop_out_rate: 0.0,
        }
    }
}

/// Configuration of a whole network.
#[derive(Debug, Clone, Deserialize)]
pub struct NeuralNetConfig {
    /// Shape of `Sample::data`, e.g. `[channels, rows, cols]`
    pub input_shape: Vec<usize>,

    /// Layers in forward order
    pub layers: Vec<LayerConfig>,

    #[serde(flatten)]
    pub hyper_params: HyperParams,

    /// Seed for weight initialization (a fixed default when absent)
    pub seed: Option<u64>,
}

/// Loads a network configuration from a JSON file.
///
/// Reads the file at `path`, deserializes it and validates it.
///
/// # Examples
///
/// ```no_run
/// use rust_convnet::config::load_config;
///
/// let cfg = load_config("config/lenet.json").unwrap();
/// assert!(!cfg.layers.is_empty());
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> NetResult<NeuralNetConfig> {
    let contents = fs::read_to_string(path)?;
    let config: NeuralNetConfig = serde_json::from_str(&contents)?;
    validate_config(&config)?;
    Ok(config)
}

/// Checks hyperparameter ranges and each layer's required fields.
///
/// Shape compatibility between consecutive layers is checked when the layers
/// are built.
pub fn validate_config(config: &NeuralNetConfig) -> NetResult<()> {
    if config.input_shape.is_empty() || config.input_shape.contains(&0) {
        return Err(NetError::Configuration(format!(
            "input_shape must be non-empty with positive sizes, got {:?}",
            config.input_shape
        )));
    }
    if config.layers.is_empty() {
        return Err(NetError::Configuration(
            "Network must have at least one layer".to_string(),
        ));
    }
    validate_hyper_params(&config.hyper_params)?;

    for (i, layer) in config.layers.iter().enumerate() {
        validate_layer(layer, i)?;
    }
    Ok(())
}

fn validate_hyper_params(params: &HyperParams) -> NetResult<()> {
    if !(params.learning_rate.is_finite() && params.learning_rate > 0.0) {
        return Err(NetError::Configuration(
            "learning_rate must be positive".to_string(),
        ));
    }
    if !(params.decay_lambda.is_finite() && params.decay_lambda >= 0.0) {
        return Err(NetError::Configuration(
            "decay_lambda must be non-negative".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&params.momentum) {
        return Err(NetError::Configuration(
            "momentum must be in range [0.0, 1.0]".to_string(),
        ));
    }
    if !(0.0..1.0).contains(&params.drop_out_rate) {
        return Err(NetError::Configuration(
            "drop_out_rate must be in range [0.0, 1.0)".to_string(),
        ));
    }
    Ok(())
}
