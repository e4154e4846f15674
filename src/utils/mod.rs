//! Shared utilities for the network engine
//!
//! Random number generation for weight initialization and activation functions.

pub mod activations;
pub mod rng;

pub use activations::Activator;
pub use rng::SimpleRng;
