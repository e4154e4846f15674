//! Error types for network construction, training and updates
//!
//! Construction-time defects (bad configuration, unsupported activators) surface
//! from `NeuralNet::new`. Per-sample failures (`NumericalDivergence`) leave the
//! network untouched so the caller can skip the sample.

use crate::utils::activations::Activator;

/// Errors raised by the network engine.
#[derive(thiserror::Error, Debug)]
pub enum NetError {
    /// Unknown layer type, missing parameter or a shape that cannot be built
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Shapes or counts disagree between caller data and the network
    #[error("dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        context: String,
        expected: String,
        actual: String,
    },

    /// A backward delta contained NaN
    #[error("NaN occurred in layer {layer}")]
    NumericalDivergence { layer: usize },

    /// The selected activator has no implementation
    #[error("unimplemented activator: {0:?}")]
    UnsupportedActivation(Activator),

    /// Config file could not be read
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Config file is not valid JSON for the expected schema
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl NetError {
    pub(crate) fn shape_mismatch(context: &str, expected: &[usize], actual: &[usize]) -> Self {
        NetError::DimensionMismatch {
            context: context.to_string(),
            expected: format!("{:?}", expected),
            actual: format!("{:?}", actual),
        }
    }

    pub(crate) fn count_mismatch(context: &str, expected: usize, actual: usize) -> Self {
        NetError::DimensionMismatch {
            context: context.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

/// Result type for network operations
pub type NetResult<T> = Result<T, NetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_divergence_message_names_layer() {
        let err = NetError::NumericalDivergence { layer: 3 };
        assert_eq!(err.to_string(), "NaN occurred in layer 3");
    }

    #[test]
    fn test_shape_mismatch_message() {
        let err = NetError::shape_mismatch("sample data", &[1, 4, 4], &[1, 3, 3]);
        assert_eq!(
            err.to_string(),
            "dimension mismatch in sample data: expected [1, 4, 4], got [1, 3, 3]"
        );
    }
}
