//! Layer configuration and layer-chain construction
//!
//! Each `LayerConfig` names its type in `layer_type` and carries the fields
//! that type needs. `build_layers` walks the list once, feeding each layer's
//! output shape in as the next layer's input shape.

use crate::error::{NetError, NetResult};
use crate::layers::{ConvolutionLayer, FullyConnectedLayer, NetLayer, PoolingLayer};
use crate::utils::Activator;
use serde::Deserialize;

/// Configuration for a single layer.
///
/// - **convolution**: requires `filter_rows`, `filter_cols`, `num_filters`;
///   optional `activator` (default sigmoid) and `padding` (accepted, ignored)
/// - **pooling**: requires `window_size`
/// - **fully_connected**: requires `out_dim`; optional `activator`
///
/// # Examples
///
/// ```json
/// { "layer_type": "convolution", "filter_rows": 5, "filter_cols": 5, "num_filters": 20 }
/// ```
///
/// ```json
/// { "layer_type": "fully_connected", "out_dim": 10, "activator": "sigmoid" }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LayerConfig {
    /// "convolution", "pooling" or "fully_connected"
    pub layer_type: String,

    // Convolution parameters
    pub filter_rows: Option<usize>,
    pub filter_cols: Option<usize>,
    pub num_filters: Option<usize>,
    /// Zero-padding flag; convolution is always "valid"
    pub padding: Option<bool>,

    // Pooling parameters
    pub window_size: Option<usize>,

    // Fully connected parameters
    pub out_dim: Option<usize>,

    /// "sigmoid", "relu" or "softmax" for parametric layers
    pub activator: Option<String>,
}

fn require(value: Option<usize>, field: &str, layer_type: &str, index: usize) -> NetResult<usize> {
    match value {
        None => Err(NetError::Configuration(format!(
            "Layer {}: {} layer requires '{}'",
            index, layer_type, field
        ))),
        Some(0) => Err(NetError::Configuration(format!(
            "Layer {}: {} must be greater than 0",
            index, field
        ))),
        Some(v) => Ok(v),
    }
}

fn activator_of(layer: &LayerConfig) -> NetResult<Activator> {
    layer
        .activator
        .as_deref()
        .map(Activator::from_name)
        .transpose()
        .map(Option::unwrap_or_default)
}

/// Validates a single layer configuration.
///
/// Checks that the layer type is known, that every required field is present
/// and positive, and that the activator names an implemented function.
pub fn validate_layer(layer: &LayerConfig, index: usize) -> NetResult<()> {
    match layer.layer_type.to_lowercase().as_str() {
        "convolution" => {
            require(layer.filter_rows, "filter_rows", "Convolution", index)?;
            require(layer.filter_cols, "filter_cols", "Convolution", index)?;
            require(layer.num_filters, "num_filters", "Convolution", index)?;
            activator_of(layer)?.ensure_supported()?;
        }
        "pooling" => {
            require(layer.window_size, "window_size", "Pooling", index)?;
        }
        "fully_connected" => {
            require(layer.out_dim, "out_dim", "FullyConnected", index)?;
            activator_of(layer)?.ensure_supported()?;
        }
        _ => {
            return Err(NetError::Configuration(format!(
                "Layer {}: Invalid layer type '{}'. Must be one of: convolution, pooling, fully_connected",
                index, layer.layer_type
            )));
        }
    }
    Ok(())
}

/// Builds the layer chain for a network whose samples have `input_shape`.
///
/// # Errors
///
/// `Configuration` for unknown types, missing fields or a layer that cannot
/// accept its predecessor's output; `UnsupportedActivation` for an activator
/// without an implementation.
pub fn build_layers(input_shape: &[usize], configs: &[LayerConfig]) -> NetResult<Vec<NetLayer>> {
    let mut layers = Vec::with_capacity(configs.len());
    let mut shape = input_shape.to_vec();

    for (i, layer_config) in configs.iter().enumerate() {
        validate_layer(layer_config, i)?;
        let with_index = |err: NetError| match err {
            NetError::Configuration(msg) => NetError::Configuration(format!("Layer {}: {}", i, msg)),
            other => other,
        };

        let layer: NetLayer = match layer_config.layer_type.to_lowercase().as_str() {
            "convolution" => {
                if layer_config.padding == Some(true) {
                    log::warn!(
                        "Layer {}: zero padding is not supported, using valid convolution",
                        i
                    );
                }
                ConvolutionLayer::new(
                    &shape,
                    require(layer_config.filter_rows, "filter_rows", "Convolution", i)?,
                    require(layer_config.filter_cols, "filter_cols", "Convolution", i)?,
                    require(layer_config.num_filters, "num_filters", "Convolution", i)?,
                    activator_of(layer_config)?,
                )
                .map_err(with_index)?
                .into()
            }
            "pooling" => PoolingLayer::new(
                &shape,
                require(layer_config.window_size, "window_size", "Pooling", i)?,
            )
            .map_err(with_index)?
            .into(),
            _ => FullyConnectedLayer::new(
                &shape,
                require(layer_config.out_dim, "out_dim", "FullyConnected", i)?,
                activator_of(layer_config)?,
            )
            .map_err(with_index)?
            .into(),
        };

        shape = layer.as_layer().output_shape();
        layers.push(layer);
    }

    Ok(layers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::LayerKind;

    fn conv(rows: usize, cols: usize, filters: usize) -> LayerConfig {
        LayerConfig {
            layer_type: "convolution".to_string(),
            filter_rows: Some(rows),
            filter_cols: Some(cols),
            num_filters: Some(filters),
            ..Default::default()
        }
    }

    fn pool(window: usize) -> LayerConfig {
        LayerConfig {
            layer_type: "pooling".to_string(),
            window_size: Some(window),
            ..Default::default()
        }
    }

    fn dense(out_dim: usize) -> LayerConfig {
        LayerConfig {
            layer_type: "fully_connected".to_string(),
            out_dim: Some(out_dim),
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_convolution_layer() {
        assert!(validate_layer(&conv(5, 5, 6), 0).is_ok());
    }

    #[test]
    fn test_validate_missing_fields() {
        let mut layer = conv(5, 5, 6);
        layer.num_filters = None;
        assert!(validate_layer(&layer, 0).is_err());

        let mut layer = dense(10);
        layer.out_dim = Some(0);
        assert!(validate_layer(&layer, 0).is_err());
    }

    #[test]
    fn test_validate_invalid_layer_type() {
        let layer = LayerConfig {
            layer_type: "lstm".to_string(),
            ..Default::default()
        };
        let err = validate_layer(&layer, 2).unwrap_err();
        assert!(err.to_string().contains("Layer 2: Invalid layer type 'lstm'"));
    }

    #[test]
    fn test_validate_unsupported_activator() {
        let mut layer = dense(10);
        layer.activator = Some("relu".to_string());
        assert!(matches!(
            validate_layer(&layer, 0),
            Err(NetError::UnsupportedActivation(Activator::RectifiedLinear))
        ));

        layer.activator = Some("tanh".to_string());
        assert!(matches!(
            validate_layer(&layer, 0),
            Err(NetError::Configuration(_))
        ));
    }

    #[test]
    fn test_build_chains_shapes() {
        let layers = build_layers(&[3, 12, 12], &[conv(5, 5, 4), pool(2), dense(10)]).unwrap();

        let kinds: Vec<LayerKind> = layers.iter().map(|l| l.as_layer().kind()).collect();
        assert_eq!(
            kinds,
            vec![LayerKind::Convolution, LayerKind::Pooling, LayerKind::FullyConnected]
        );
        assert_eq!(layers[0].as_layer().output_shape(), vec![4, 8, 8]);
        assert_eq!(layers[1].as_layer().input_shape(), &[4, 8, 8]);
        assert_eq!(layers[1].as_layer().output_shape(), vec![4, 4, 4]);
        assert_eq!(layers[2].as_layer().input_shape(), &[4, 4, 4]);
        assert_eq!(layers[2].as_layer().output_shape(), vec![10]);
    }

    #[test]
    fn test_build_layer_type_is_case_insensitive() {
        let mut layer = dense(3);
        layer.layer_type = "Fully_Connected".to_string();
        assert!(build_layers(&[4], &[layer]).is_ok());
    }

    #[test]
    fn test_build_rejects_incompatible_chain() {
        // A fully connected output is rank 1, which convolution cannot take.
        let err = build_layers(&[16], &[dense(9), conv(2, 2, 1)]).unwrap_err();
        assert!(err.to_string().contains("Layer 1:"));

        // Filter larger than the input.
        assert!(build_layers(&[1, 4, 4], &[conv(5, 5, 1)]).is_err());
    }
}
