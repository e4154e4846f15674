//! Deterministic random number generation for weight initialization.
//!
//! A small xorshift generator so that two networks built from the same
//! configuration and seed start from identical weights.

use crate::tensor::Tensor;

const FALLBACK_SEED: u64 = 0x9e3779b97f4a7c15;

/// Xorshift PRNG.
pub struct SimpleRng {
    state: u64,
}

impl SimpleRng {
    /// Create a new RNG with explicit seed (if zero, use a fixed value).
    pub fn new(seed: u64) -> Self {
        let state = if seed == 0 { FALLBACK_SEED } else { seed };
        Self { state }
    }

    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        (x >> 32) as u32
    }

    /// Convert to [0, 1).
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u32() >> 8) as f32 / (1u32 << 24) as f32
    }

    /// Uniform sample in [low, high).
    pub fn gen_range_f32(&mut self, low: f32, high: f32) -> f32 {
        low + (high - low) * self.next_f32()
    }

    /// Tensor with every element drawn uniformly from [-limit, limit).
    pub fn uniform_tensor(&mut self, shape: &[usize], limit: f32) -> Tensor {
        let mut tensor = Tensor::zeros(shape);
        for value in tensor.data_mut() {
            *value = self.gen_range_f32(-limit, limit);
        }
        tensor
    }
}
