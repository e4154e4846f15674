//! Update-step observability
//!
//! `NeuralNet::update_weight` reports one `UpdateStats` per parametric layer
//! to an `UpdateObserver`. The default observer forwards them to the `log`
//! facade at debug level.

/// Norms measured while applying one layer's update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdateStats {
    /// Index of the layer in the network
    pub layer: usize,
    /// L2 norm of the incoming weight and bias gradient
    pub gradient_norm: f32,
    /// L2 norm of the momentum step that was subtracted
    pub update_norm: f32,
    /// L2 norm of the weights and biases after the update
    pub weight_norm: f32,
}

/// Receives per-layer statistics from the update step.
pub trait UpdateObserver: Send + Sync {
    fn on_update(&self, stats: &UpdateStats);
}

/// Writes update statistics to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl UpdateObserver for LogObserver {
    fn on_update(&self, stats: &UpdateStats) {
        log::debug!(
            "layer {}: gradient norm {:.6}, update norm {:.6}, weight norm {:.6}",
            stats.layer,
            stats.gradient_norm,
            stats.update_norm,
            stats.weight_norm
        );
    }
}
