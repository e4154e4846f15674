//! Rust Convolutional Network Engine
//!
//! A small feed-forward network built from convolution, max-pooling and fully
//! connected layers over row-major `f32` tensors. Gradient computation is
//! separated from parameter updates so callers can aggregate gradients across
//! samples or workers before applying them.
//!
//! # Modules
//!
//! - `tensor`: N-dimensional tensor and elementwise arithmetic
//! - `layers`: Layer trait and the convolution, pooling and fully connected layers
//! - `network`: `NeuralNet` driver (train, predict, update_weight)
//! - `config`: JSON network configuration and hyperparameters
//! - `architecture`: Layer configuration and layer-chain construction
//! - `observer`: Update-step statistics
//! - `utils`: RNG and activation functions

pub mod architecture;
pub mod config;
pub mod error;
pub mod layers;
pub mod network;
pub mod observer;
pub mod sample;
pub mod tensor;
pub mod utils;
pub mod weight;

pub use config::{load_config, HyperParams, NeuralNetConfig};
pub use error::{NetError, NetResult};
pub use network::NeuralNet;
pub use sample::Sample;
pub use tensor::Tensor;
pub use weight::Weight;
