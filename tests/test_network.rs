//! Integration tests for the network driver
//!
//! This file tests `NeuralNet` end to end:
//! - Construction from JSON configuration
//! - Purity of train/predict
//! - Divergence handling and shape validation
//! - JSON weight snapshots
//! - Gradients against finite differences
//! - Loss reduction over train/update rounds

use approx::assert_relative_eq;
use rust_convnet::config::{HyperParams, NeuralNetConfig};
use rust_convnet::error::NetError;
use rust_convnet::layers::{ConvolutionLayer, FullyConnectedLayer, LayerKind, INITIAL_BIAS};
use rust_convnet::network::NeuralNet;
use rust_convnet::sample::Sample;
use rust_convnet::tensor::Tensor;
use rust_convnet::utils::{Activator, SimpleRng};
use rust_convnet::weight::Weight;

const LENET_JSON: &str = r#"{
  "input_shape": [1, 8, 8],
  "learning_rate": 0.05,
  "momentum": 0.9,
  "seed": 11,
  "layers": [
    { "layer_type": "convolution", "filter_rows": 3, "filter_cols": 3, "num_filters": 2 },
    { "layer_type": "pooling", "window_size": 2 },
    { "layer_type": "fully_connected", "out_dim": 4, "activator": "sigmoid" }
  ]
}"#;

fn lenet() -> NeuralNet {
    let config: NeuralNetConfig = serde_json::from_str(LENET_JSON).unwrap();
    NeuralNet::new(&config).unwrap()
}

fn ramp_sample(shape: &[usize], label: &[f32]) -> Sample {
    let len: usize = shape.iter().product();
    let data = (0..len).map(|i| ((i * 7) % 11) as f32 / 11.0).collect();
    Sample::new(
        Tensor::from_vec(data, shape).unwrap(),
        Tensor::from_vec(label.to_vec(), &[label.len()]).unwrap(),
    )
}

fn half_squared_error(output: &Tensor, label: &Tensor) -> f32 {
    output.sub(label).data().iter().map(|d| 0.5 * d * d).sum()
}

// ============================================================================
// Construction Tests
// ============================================================================

mod construction_tests {
    use super::*;

    #[test]
    fn test_builds_from_config() {
        let net = lenet();
        assert_eq!(net.num_layers(), 3);
        assert_eq!(
            net.layer_kinds(),
            vec![LayerKind::Convolution, LayerKind::Pooling, LayerKind::FullyConnected]
        );
        assert_eq!(net.output_shape(), vec![4]);
        // conv 2*1*3*3 + 2, fc 4*(2*3*3) + 4
        assert_eq!(net.parameter_count(), 20 + 76);
    }

    #[test]
    fn test_same_seed_same_weights() {
        assert_eq!(lenet().weights(), lenet().weights());
    }

    #[test]
    fn test_initial_bias_is_constant() {
        let net = lenet();
        for weight in net.weights().iter().flatten() {
            assert!(weight.b.data().iter().all(|&b| b == INITIAL_BIAS));
        }
    }

    #[test]
    fn test_unknown_layer_type_fails() {
        let json = LENET_JSON.replace("\"pooling\"", "\"recurrent\"");
        let config: NeuralNetConfig = serde_json::from_str(&json).unwrap();
        match NeuralNet::new(&config) {
            Err(NetError::Configuration(msg)) => assert!(msg.contains("recurrent")),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("unknown layer type was accepted"),
        }
    }

    #[test]
    fn test_unimplemented_activator_fails() {
        let json = LENET_JSON.replace("\"sigmoid\"", "\"softmax\"");
        let config: NeuralNetConfig = serde_json::from_str(&json).unwrap();
        assert!(matches!(
            NeuralNet::new(&config),
            Err(NetError::UnsupportedActivation(Activator::Softmax))
        ));
    }
}

// ============================================================================
// Train / Predict Tests
// ============================================================================

mod train_predict_tests {
    use super::*;

    #[test]
    fn test_predict_is_pure() {
        let net = lenet();
        let sample = ramp_sample(&[1, 8, 8], &[1.0, 0.0, 0.0, 0.0]);
        let first = net.predict(&sample).unwrap();
        let second = net.predict(&sample).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.shape(), &[4]);
        assert!(first.data().iter().all(|&v| v > 0.0 && v < 1.0));
    }

    #[test]
    fn test_train_does_not_modify_network() {
        let net = lenet();
        let before = net.weights().to_vec();
        let sample = ramp_sample(&[1, 8, 8], &[0.0, 1.0, 0.0, 0.0]);

        let first = net.train(&sample).unwrap();
        let second = net.train(&sample).unwrap();

        assert_eq!(net.weights(), before.as_slice());
        assert_eq!(first, second);
        assert!(first[1].is_none());
    }

    #[test]
    fn test_nan_input_reports_divergence() {
        let mut net = lenet();
        let before = net.weights().to_vec();
        let mut sample = ramp_sample(&[1, 8, 8], &[0.0, 0.0, 1.0, 0.0]);
        sample.data.set(&[0, 3, 3], f32::NAN);

        match net.train(&sample) {
            Err(NetError::NumericalDivergence { layer }) => assert_eq!(layer, 2),
            other => panic!("expected divergence, got {:?}", other.map(|g| g.len())),
        }
        assert_eq!(net.weights(), before.as_slice());

        // The network stays usable for the next sample.
        let clean = ramp_sample(&[1, 8, 8], &[0.0, 0.0, 1.0, 0.0]);
        let grads = net.train(&clean).unwrap();
        net.update_weight(&grads).unwrap();
    }

    #[test]
    fn test_sample_shape_mismatch() {
        let net = lenet();
        let wrong_data = ramp_sample(&[1, 7, 8], &[0.0, 0.0, 0.0, 1.0]);
        assert!(matches!(
            net.train(&wrong_data),
            Err(NetError::DimensionMismatch { .. })
        ));

        let wrong_label = ramp_sample(&[1, 8, 8], &[0.0, 1.0]);
        assert!(matches!(
            net.train(&wrong_label),
            Err(NetError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_gradient_count_mismatch_leaves_weights() {
        let mut net = lenet();
        let before = net.weights().to_vec();
        let mut grads = net.train(&ramp_sample(&[1, 8, 8], &[1.0, 0.0, 0.0, 0.0])).unwrap();
        grads.pop();

        assert!(matches!(
            net.update_weight(&grads),
            Err(NetError::DimensionMismatch { .. })
        ));
        assert_eq!(net.weights(), before.as_slice());
    }

    #[test]
    fn test_gradient_shape_mismatch_leaves_weights() {
        let mut net = lenet();
        let before = net.weights().to_vec();
        let mut grads = net.train(&ramp_sample(&[1, 8, 8], &[1.0, 0.0, 0.0, 0.0])).unwrap();
        grads[2] = Some(Weight::zeros(&[4, 17], &[4]));

        assert!(net.update_weight(&grads).is_err());
        assert_eq!(net.weights(), before.as_slice());
    }
}

// ============================================================================
// Snapshot Exchange
// ============================================================================

mod snapshot_tests {
    use super::*;

    #[test]
    fn test_json_snapshot_transfers_weights() {
        let source = lenet();
        let json = serde_json::to_string(source.weights()).unwrap();

        let other_seed = LENET_JSON.replace("\"seed\": 11", "\"seed\": 12");
        let config: NeuralNetConfig = serde_json::from_str(&other_seed).unwrap();
        let mut target = NeuralNet::new(&config).unwrap();
        assert_ne!(target.weights(), source.weights());

        let snapshot: Vec<Option<Weight>> = serde_json::from_str(&json).unwrap();
        target.set_weights(snapshot).unwrap();

        let sample = ramp_sample(&[1, 8, 8], &[0.0, 0.0, 0.0, 1.0]);
        assert_eq!(
            target.predict(&sample).unwrap(),
            source.predict(&sample).unwrap()
        );
    }

    #[test]
    fn test_snapshot_with_short_buffer_never_reaches_network() {
        let mut net = lenet();
        let before = net.weights().to_vec();

        let mut value = serde_json::to_value(net.weights()).unwrap();
        value[0]["w"]["data"] = serde_json::json!([1.0]);
        let snapshot = serde_json::from_value::<Vec<Option<Weight>>>(value);
        assert!(snapshot.is_err());

        assert_eq!(net.weights(), before.as_slice());
        let sample = ramp_sample(&[1, 8, 8], &[0.0, 0.0, 0.0, 1.0]);
        assert!(net.predict(&sample).is_ok());
    }
}

// ============================================================================
// Gradient Checking
// ============================================================================

mod gradient_checking {
    use super::*;

    fn conv_dense_net() -> NeuralNet {
        let conv = ConvolutionLayer::new(&[1, 5, 5], 2, 2, 2, Activator::Sigmoid).unwrap();
        let fc = FullyConnectedLayer::new(&[2, 4, 4], 3, Activator::Sigmoid).unwrap();
        NeuralNet::from_layers(
            &[1, 5, 5],
            vec![conv.into(), fc.into()],
            HyperParams::default(),
            &mut SimpleRng::new(5),
        )
    }

    fn loss(net: &NeuralNet, sample: &Sample) -> f32 {
        half_squared_error(&net.predict(sample).unwrap(), &sample.label)
    }

    fn numeric_gradient(
        net: &mut NeuralNet,
        sample: &Sample,
        layer: usize,
        index: usize,
        bias: bool,
    ) -> f32 {
        let eps = 1e-2;
        let original = net.weights().to_vec();

        let mut perturbed = |delta: f32| {
            let mut weights = original.clone();
            if let Some(unit) = weights[layer].as_mut() {
                let tensor = if bias { &mut unit.b } else { &mut unit.w };
                tensor.data_mut()[index] += delta;
            }
            net.set_weights(weights).unwrap();
            loss(net, sample)
        };
        let plus = perturbed(eps);
        let minus = perturbed(-eps);
        net.set_weights(original).unwrap();
        (plus - minus) / (2.0 * eps)
    }

    #[test]
    fn test_gradients_match_finite_differences() {
        let mut net = conv_dense_net();
        let sample = ramp_sample(&[1, 5, 5], &[1.0, 0.0, 1.0]);
        let grads = net.train(&sample).unwrap();

        for &(layer, index) in &[(0, 0), (0, 5), (1, 0), (1, 17), (1, 40)] {
            let analytic = grads[layer].as_ref().unwrap().w.data()[index];
            let numeric = numeric_gradient(&mut net, &sample, layer, index, false);
            assert_relative_eq!(analytic, numeric, epsilon = 2e-3);
        }
        for &(layer, index) in &[(0, 1), (1, 2)] {
            let analytic = grads[layer].as_ref().unwrap().b.data()[index];
            let numeric = numeric_gradient(&mut net, &sample, layer, index, true);
            assert_relative_eq!(analytic, numeric, epsilon = 2e-3);
        }
    }
}

// ============================================================================
// Training Loop
// ============================================================================

mod training_loop {
    use super::*;

    #[test]
    fn test_batch_rounds_reduce_loss() {
        let mut net = lenet();
        let batch = vec![
            ramp_sample(&[1, 8, 8], &[1.0, 0.0, 0.0, 0.0]),
            ramp_sample(&[1, 8, 8], &[1.0, 0.0, 0.0, 0.0]),
        ];
        let initial: f32 = batch
            .iter()
            .map(|s| half_squared_error(&net.predict(s).unwrap(), &s.label))
            .sum();

        for _ in 0..30 {
            let mut sum: Option<Vec<Option<Weight>>> = None;
            for sample in &batch {
                let grads = net.train(sample).unwrap();
                match sum.as_mut() {
                    None => sum = Some(grads),
                    Some(total) => {
                        for (t, g) in total.iter_mut().zip(&grads) {
                            if let (Some(t), Some(g)) = (t.as_mut(), g.as_ref()) {
                                t.accumulate(g);
                            }
                        }
                    }
                }
            }
            net.update_weight(&sum.unwrap()).unwrap();
        }

        let trained: f32 = batch
            .iter()
            .map(|s| half_squared_error(&net.predict(s).unwrap(), &s.label))
            .sum();
        assert!(
            trained < initial,
            "loss did not decrease: {} -> {}",
            initial,
            trained
        );
    }
}
