//! Network driver
//!
//! `NeuralNet` owns the layer chain, one optional `Weight` per layer and the
//! matching momentum accumulators. Gradient computation (`train`) borrows the
//! network immutably and returns everything it computed; only
//! `update_weight` mutates parameters. A caller therefore runs
//! "train on samples -> aggregate gradients -> update_weight" rounds, and the
//! borrow checker keeps the two phases from overlapping.

use crate::architecture::build_layers;
use crate::config::{validate_config, HyperParams, NeuralNetConfig};
use crate::error::{NetError, NetResult};
use crate::layers::{LayerKind, LayerOutput, NetLayer};
use crate::observer::{LogObserver, UpdateObserver, UpdateStats};
use crate::sample::Sample;
use crate::tensor::Tensor;
use crate::utils::SimpleRng;
use crate::weight::Weight;

/// Seed used for weight initialization when the configuration has none.
pub const DEFAULT_SEED: u64 = 42;

/// Intermediates of one forward sweep, needed by the backward sweep.
#[derive(Debug, Clone)]
pub struct ForwardPass {
    /// `inputs[0]` is the sample data, `inputs[i + 1]` the activated output of layer `i`
    pub inputs: Vec<Tensor>,
    /// Raw output (and pooling index map) of each layer
    pub outputs: Vec<LayerOutput>,
}

impl ForwardPass {
    /// Activated output of the last layer.
    pub fn activated_output(&self) -> &Tensor {
        &self.inputs[self.inputs.len() - 1]
    }
}

/// A chain of convolution, pooling and fully connected layers.
///
/// # Example
///
/// ```no_run
/// use rust_convnet::config::load_config;
/// use rust_convnet::network::NeuralNet;
/// use rust_convnet::weight::Weight;
/// # use rust_convnet::sample::Sample;
/// # let batch: Vec<Sample> = Vec::new();
///
/// let config = load_config("config/lenet.json").unwrap();
/// let mut net = NeuralNet::new(&config).unwrap();
///
/// let mut sum: Option<Vec<Option<Weight>>> = None;
/// for sample in &batch {
///     let grads = match net.train(sample) {
///         Ok(grads) => grads,
///         Err(_) => continue, // skip a diverging sample
///     };
///     // ... accumulate grads into sum with Weight::accumulate
/// #   sum = Some(grads);
/// }
/// if let Some(sum) = sum {
///     net.update_weight(&sum).unwrap();
/// }
/// ```
pub struct NeuralNet {
    layers: Vec<NetLayer>,
    weights: Vec<Option<Weight>>,
    weight_updates: Vec<Option<Weight>>,
    input_shape: Vec<usize>,
    hyper_params: HyperParams,
    observer: Box<dyn UpdateObserver>,
}

impl NeuralNet {
    /// Build a network from a configuration.
    ///
    /// # Errors
    ///
    /// `Configuration` for an invalid layer list or hyperparameter,
    /// `UnsupportedActivation` if a layer selects an unimplemented activator.
    pub fn new(config: &NeuralNetConfig) -> NetResult<Self> {
        validate_config(config)?;
        let layers = build_layers(&config.input_shape, &config.layers)?;
        let mut rng = SimpleRng::new(config.seed.unwrap_or(DEFAULT_SEED));
        Ok(Self::from_layers(
            &config.input_shape,
            layers,
            config.hyper_params,
            &mut rng,
        ))
    }

    /// Assemble a network from already constructed layers.
    ///
    /// Layers must chain: each layer's input shape equals the previous
    /// layer's output shape, the first equals `input_shape`.
    pub fn from_layers(
        input_shape: &[usize],
        layers: Vec<NetLayer>,
        hyper_params: HyperParams,
        rng: &mut SimpleRng,
    ) -> Self {
        let mut weights = Vec::with_capacity(layers.len());
        let mut weight_updates = Vec::with_capacity(layers.len());

        for (i, layer) in layers.iter().enumerate() {
            let layer = layer.as_layer();
            log::info!(
                "layer {}: {} {:?} -> {:?}, {} parameters",
                i,
                layer.kind(),
                layer.input_shape(),
                layer.output_shape(),
                layer.parameter_count()
            );
            let weight = layer.create_weight(rng);
            weight_updates.push(weight.as_ref().map(Weight::zeros_like));
            weights.push(weight);
        }

        Self {
            layers,
            weights,
            weight_updates,
            input_shape: input_shape.to_vec(),
            hyper_params,
            observer: Box::new(LogObserver),
        }
    }

    /// Replace the observer that receives update statistics.
    pub fn with_observer(mut self, observer: Box<dyn UpdateObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn layers(&self) -> &[NetLayer] {
        &self.layers
    }

    pub fn layer_kinds(&self) -> Vec<LayerKind> {
        self.layers.iter().map(|l| l.as_layer().kind()).collect()
    }

    pub fn input_shape(&self) -> &[usize] {
        &self.input_shape
    }

    /// Shape of `predict`'s result and of a sample label.
    pub fn output_shape(&self) -> Vec<usize> {
        match self.layers.last() {
            Some(layer) => layer.as_layer().output_shape(),
            None => self.input_shape.clone(),
        }
    }

    pub fn hyper_params(&self) -> &HyperParams {
        &self.hyper_params
    }

    pub fn parameter_count(&self) -> usize {
        self.weights
            .iter()
            .flatten()
            .map(Weight::parameter_count)
            .sum()
    }

    /// Current parameters, one entry per layer (`None` for pooling).
    pub fn weights(&self) -> &[Option<Weight>] {
        &self.weights
    }

    /// Momentum accumulators, shaped like `weights()`.
    pub fn weight_updates(&self) -> &[Option<Weight>] {
        &self.weight_updates
    }

    /// Replace all parameters, e.g. with a snapshot from another worker.
    ///
    /// Momentum accumulators are kept.
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` if the count, presence or shape of any entry
    /// differs from the current parameters; nothing is replaced in that case.
    pub fn set_weights(&mut self, weights: Vec<Option<Weight>>) -> NetResult<()> {
        self.check_parameter_layout("weights", &weights)?;
        self.weights = weights;
        Ok(())
    }

    fn check_parameter_layout(&self, context: &str, units: &[Option<Weight>]) -> NetResult<()> {
        if units.len() != self.weights.len() {
            return Err(NetError::count_mismatch(
                &format!("{} count", context),
                self.weights.len(),
                units.len(),
            ));
        }
        for (i, (current, unit)) in self.weights.iter().zip(units).enumerate() {
            match (current, unit) {
                (None, None) => {}
                (Some(current), Some(unit)) => {
                    if !current.same_shape(unit) {
                        return Err(NetError::DimensionMismatch {
                            context: format!("{} of layer {}", context, i),
                            expected: format!(
                                "{:?} / {:?}",
                                current.weight_shape(),
                                current.bias_shape()
                            ),
                            actual: format!("{:?} / {:?}", unit.weight_shape(), unit.bias_shape()),
                        });
                    }
                }
                (current, unit) => {
                    return Err(NetError::DimensionMismatch {
                        context: format!("{} of layer {}", context, i),
                        expected: presence(current.is_some()),
                        actual: presence(unit.is_some()),
                    });
                }
            }
        }
        Ok(())
    }

    /// Forward sweep keeping every intermediate for `backward`.
    pub fn forward(&self, data: &Tensor) -> NetResult<ForwardPass> {
        if data.shape() != self.input_shape.as_slice() {
            return Err(NetError::shape_mismatch(
                "sample data",
                &self.input_shape,
                data.shape(),
            ));
        }

        let mut inputs = Vec::with_capacity(self.layers.len() + 1);
        let mut outputs = Vec::with_capacity(self.layers.len());
        inputs.push(data.clone());

        for (i, layer) in self.layers.iter().enumerate() {
            let layer = layer.as_layer();
            let output = layer.generate_output(self.weights[i].as_ref(), &inputs[i])?;
            inputs.push(layer.activate(&output.raw)?);
            outputs.push(output);
        }
        Ok(ForwardPass { inputs, outputs })
    }

    /// Backward sweep from a forward pass and the sample's label.
    ///
    /// The output delta is `activated_output - label`.
    ///
    /// # Errors
    ///
    /// `NumericalDivergence` naming the first layer (walking backwards) whose
    /// local delta contains NaN; `DimensionMismatch` if the label shape is wrong.
    pub fn backward(&self, pass: &ForwardPass, label: &Tensor) -> NetResult<Vec<Option<Weight>>> {
        let output_shape = self.output_shape();
        if label.shape() != output_shape.as_slice() {
            return Err(NetError::shape_mismatch(
                "sample label",
                &output_shape,
                label.shape(),
            ));
        }
        if pass.outputs.len() != self.layers.len() || pass.inputs.len() != self.layers.len() + 1 {
            return Err(NetError::count_mismatch(
                "forward pass layers",
                self.layers.len(),
                pass.outputs.len(),
            ));
        }

        let mut gradients: Vec<Option<Weight>> = vec![None; self.layers.len()];
        let mut delta = pass.activated_output().sub(label);

        for (i, layer) in self.layers.iter().enumerate().rev() {
            let layer = layer.as_layer();
            delta = layer.derive_delta(&pass.outputs[i], &delta)?;
            if delta.has_nan() {
                log::warn!("NaN occurred in layer {}, dropping sample", i);
                return Err(NetError::NumericalDivergence { layer: i });
            }

            gradients[i] = layer.gradient(&pass.inputs[i], &delta);
            if i > 0 {
                delta = layer.calculate_backprop(self.weights[i].as_ref(), &pass.outputs[i], &delta)?;
            }
        }
        Ok(gradients)
    }

    /// Gradients of one sample, one entry per layer (`None` for pooling).
    ///
    /// Does not modify the network.
    pub fn train(&self, sample: &Sample) -> NetResult<Vec<Option<Weight>>> {
        let pass = self.forward(&sample.data)?;
        self.backward(&pass, &sample.label)
    }

    /// Activated output of the last layer for `sample.data`.
    pub fn predict(&self, sample: &Sample) -> NetResult<Tensor> {
        if sample.data.shape() != self.input_shape.as_slice() {
            return Err(NetError::shape_mismatch(
                "sample data",
                &self.input_shape,
                sample.data.shape(),
            ));
        }

        let mut activated = sample.data.clone();
        for (layer, weight) in self.layers.iter().zip(&self.weights) {
            let layer = layer.as_layer();
            let output = layer.generate_output(weight.as_ref(), &activated)?;
            activated = layer.activate(&output.raw)?;
        }
        Ok(activated)
    }

    /// Apply aggregated gradients with momentum and L2 decay:
    ///
    /// ```text
    /// acc_w = momentum * acc_w + learning_rate * (grad_w + decay_lambda * w)
    /// w    -= acc_w
    /// acc_b = momentum * acc_b + learning_rate * grad_b
    /// b    -= acc_b
    /// ```
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` if `gradients` does not line up with the weights;
    /// it is checked before anything is modified.
    pub fn update_weight(&mut self, gradients: &[Option<Weight>]) -> NetResult<()> {
        self.check_parameter_layout("gradient", gradients)?;

        let HyperParams {
            learning_rate,
            decay_lambda,
            momentum,
            ..
        } = self.hyper_params;
        let observer = &self.observer;

        for (i, ((weight, update), gradient)) in self
            .weights
            .iter_mut()
            .zip(self.weight_updates.iter_mut())
            .zip(gradients)
            .enumerate()
        {
            let (Some(weight), Some(update), Some(gradient)) = (weight, update, gradient) else {
                continue;
            };

            update.w.scale_inplace(momentum);
            update.w.add_scaled_inplace(&gradient.w, learning_rate);
            update.w.add_scaled_inplace(&weight.w, learning_rate * decay_lambda);
            weight.w.sub_inplace(&update.w);

            update.b.scale_inplace(momentum);
            update.b.add_scaled_inplace(&gradient.b, learning_rate);
            weight.b.sub_inplace(&update.b);

            observer.on_update(&UpdateStats {
                layer: i,
                gradient_norm: combined_norm(gradient),
                update_norm: combined_norm(update),
                weight_norm: combined_norm(weight),
            });
        }
        Ok(())
    }
}

fn presence(present: bool) -> String {
    let label = if present { "weight" } else { "none" };
    label.to_string()
}

fn combined_norm(unit: &Weight) -> f32 {
    (unit.w.norm().powi(2) + unit.b.norm().powi(2)).sqrt()
}
