//! Tests for configuration loading
//!
//! - Loading the bundled LeNet configuration
//! - Building a network from a config written to a temp file
//! - Invalid JSON, missing files, bad hyperparameters and layer lists

use rust_convnet::config::load_config;
use rust_convnet::error::NetError;
use rust_convnet::layers::LayerKind;
use rust_convnet::network::NeuralNet;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

// ============================================================================
// Valid Config Loading Tests
// ============================================================================

mod valid_config_tests {
    use super::*;

    #[test]
    fn test_load_lenet_config() {
        let config = load_config("config/lenet.json").expect("Failed to load lenet config");
        assert_eq!(config.input_shape, vec![1, 28, 28]);
        assert_eq!(config.layers.len(), 6);
        assert_eq!(config.hyper_params.momentum, 0.95);
        assert_eq!(config.seed, Some(42));

        let net = NeuralNet::new(&config).unwrap();
        assert_eq!(
            net.layer_kinds(),
            vec![
                LayerKind::Convolution,
                LayerKind::Pooling,
                LayerKind::Convolution,
                LayerKind::Pooling,
                LayerKind::FullyConnected,
                LayerKind::FullyConnected,
            ]
        );
        // 28 -> 24 -> 12 -> 8 -> 4
        assert_eq!(net.layers()[4].as_layer().input_shape(), &[16, 4, 4]);
        assert_eq!(net.output_shape(), vec![10]);
    }

    #[test]
    fn test_defaults_for_missing_fields() {
        let file = write_config(
            r#"{
              "input_shape": [4],
              "layers": [ { "layer_type": "fully_connected", "out_dim": 2 } ]
            }"#,
        );
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.hyper_params.learning_rate, 0.1);
        assert_eq!(config.hyper_params.decay_lambda, 1e-5);
        assert_eq!(config.hyper_params.momentum, 0.95);
        assert_eq!(config.seed, None);
        assert_eq!(config.layers[0].activator, None);
        assert!(NeuralNet::new(&config).is_ok());
    }

    #[test]
    fn test_padding_flag_is_accepted() {
        let file = write_config(
            r#"{
              "input_shape": [1, 6, 6],
              "layers": [
                { "layer_type": "convolution", "filter_rows": 3, "filter_cols": 3,
                  "num_filters": 1, "padding": true }
              ]
            }"#,
        );
        let config = load_config(file.path()).unwrap();
        let net = NeuralNet::new(&config).unwrap();
        assert_eq!(net.output_shape(), vec![1, 4, 4]);
    }
}

// ============================================================================
// Invalid Config Tests
// ============================================================================

mod invalid_config_tests {
    use super::*;

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            load_config("config/nonexistent.json"),
            Err(NetError::Io(_))
        ));
    }

    #[test]
    fn test_malformed_json() {
        let file = write_config(r#"{ "input_shape": [1, 4, 4], "layers": ["#);
        assert!(matches!(load_config(file.path()), Err(NetError::Json(_))));
    }

    #[test]
    fn test_missing_required_layer_field() {
        let file = write_config(
            r#"{
              "input_shape": [1, 6, 6],
              "layers": [ { "layer_type": "pooling" } ]
            }"#,
        );
        match load_config(file.path()) {
            Err(NetError::Configuration(msg)) => assert!(msg.contains("window_size")),
            other => panic!("expected configuration error, got {:?}", other.map(|c| c.layers.len())),
        }
    }

    #[test]
    fn test_negative_momentum() {
        let file = write_config(
            r#"{
              "input_shape": [4],
              "momentum": -0.1,
              "layers": [ { "layer_type": "fully_connected", "out_dim": 2 } ]
            }"#,
        );
        assert!(matches!(
            load_config(file.path()),
            Err(NetError::Configuration(_))
        ));
    }

    #[test]
    fn test_layer_chain_rejected_at_build() {
        // Validation passes; the 5x5 filter does not fit the pooled 2x2 map.
        let file = write_config(
            r#"{
              "input_shape": [1, 4, 4],
              "layers": [
                { "layer_type": "pooling", "window_size": 2 },
                { "layer_type": "convolution", "filter_rows": 5, "filter_cols": 5, "num_filters": 1 }
              ]
            }"#,
        );
        let config = load_config(file.path()).unwrap();
        match NeuralNet::new(&config) {
            Err(NetError::Configuration(msg)) => assert!(msg.starts_with("Layer 1:")),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("incompatible chain was accepted"),
        }
    }
}
