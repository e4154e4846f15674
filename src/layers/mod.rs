//! Layer abstractions for the network engine
//!
//! The `Layer` trait is the contract every stage implements. `NetLayer` is the
//! closed set of stages a network can hold; the driver dispatches through it.

mod r#trait;
pub mod conv2d;
pub mod dense;
pub mod pooling;

pub use conv2d::ConvolutionLayer;
pub use dense::FullyConnectedLayer;
pub use pooling::PoolingLayer;
pub use r#trait::{Layer, LayerKind, LayerOutput};

/// Initial value of every bias of a parametric layer.
pub const INITIAL_BIAS: f32 = 0.01;

/// One stage of a network.
#[derive(Debug, Clone)]
pub enum NetLayer {
    Convolution(ConvolutionLayer),
    Pooling(PoolingLayer),
    FullyConnected(FullyConnectedLayer),
}

impl NetLayer {
    pub fn as_layer(&self) -> &dyn Layer {
        match self {
            NetLayer::Convolution(layer) => layer,
            NetLayer::Pooling(layer) => layer,
            NetLayer::FullyConnected(layer) => layer,
        }
    }
}

impl From<ConvolutionLayer> for NetLayer {
    fn from(layer: ConvolutionLayer) -> Self {
        NetLayer::Convolution(layer)
    }
}

impl From<PoolingLayer> for NetLayer {
    fn from(layer: PoolingLayer) -> Self {
        NetLayer::Pooling(layer)
    }
}

impl From<FullyConnectedLayer> for NetLayer {
    fn from(layer: FullyConnectedLayer) -> Self {
        NetLayer::FullyConnected(layer)
    }
}
