//! 2D convolution layer
//!
//! Multi-channel "valid" cross-correlation: each filter slides over every input
//! channel without flipping and without padding, the per-channel results are
//! summed and the filter's bias is added. Output spatial size is
//! `input - filter + 1` along each axis.

use crate::error::{NetError, NetResult};
use crate::layers::r#trait::{check_shape, require_weight};
use crate::layers::{Layer, LayerKind, LayerOutput, INITIAL_BIAS};
use crate::tensor::Tensor;
use crate::utils::{Activator, SimpleRng};
use crate::weight::Weight;

/// Convolution layer over a `[channels, rows, cols]` input.
///
/// Weights are laid out `[num_filters, channels, filter_rows, filter_cols]`,
/// one matrix per filter/channel pair, biases `[num_filters]`.
///
/// # Example
///
/// ```
/// use rust_convnet::layers::{ConvolutionLayer, Layer};
/// use rust_convnet::utils::Activator;
///
/// let layer = ConvolutionLayer::new(&[3, 32, 32], 5, 5, 8, Activator::Sigmoid).unwrap();
/// assert_eq!(layer.output_shape(), vec![8, 28, 28]);
/// ```
#[derive(Debug, Clone)]
pub struct ConvolutionLayer {
    input_shape: Vec<usize>,
    filter_rows: usize,
    filter_cols: usize,
    num_filters: usize,
    activator: Activator,
}

impl ConvolutionLayer {
    /// Create a convolution layer for the given input shape.
    ///
    /// # Errors
    ///
    /// `Configuration` if the input is not rank 3, any size is zero, or the
    /// filter is larger than the input.
    pub fn new(
        input_shape: &[usize],
        filter_rows: usize,
        filter_cols: usize,
        num_filters: usize,
        activator: Activator,
    ) -> NetResult<Self> {
        if input_shape.len() != 3 {
            return Err(NetError::Configuration(format!(
                "convolution expects a [channels, rows, cols] input, got {:?}",
                input_shape
            )));
        }
        if filter_rows == 0 || filter_cols == 0 || num_filters == 0 {
            return Err(NetError::Configuration(
                "filter_rows, filter_cols and num_filters must be greater than 0".to_string(),
            ));
        }
        if input_shape[0] == 0 || filter_rows > input_shape[1] || filter_cols > input_shape[2] {
            return Err(NetError::Configuration(format!(
                "filter {}x{} does not fit input {:?}",
                filter_rows, filter_cols, input_shape
            )));
        }
        Ok(Self {
            input_shape: input_shape.to_vec(),
            filter_rows,
            filter_cols,
            num_filters,
            activator,
        })
    }

    pub fn num_channels(&self) -> usize {
        self.input_shape[0]
    }

    pub fn num_filters(&self) -> usize {
        self.num_filters
    }

    pub fn activator(&self) -> Activator {
        self.activator
    }

    pub fn output_rows(&self) -> usize {
        self.input_shape[1] - self.filter_rows + 1
    }

    pub fn output_cols(&self) -> usize {
        self.input_shape[2] - self.filter_cols + 1
    }

    fn filter_len(&self) -> usize {
        self.filter_rows * self.filter_cols
    }

    fn plane_len(&self) -> usize {
        self.input_shape[1] * self.input_shape[2]
    }

    fn output_plane_len(&self) -> usize {
        self.output_rows() * self.output_cols()
    }
}

/// Valid cross-correlation of `input` (`in_rows x in_cols`) with `kernel`
/// (`k_rows x k_cols`), accumulated into `out`
/// (`(in_rows - k_rows + 1) x (in_cols - k_cols + 1)`).
fn correlate_valid(
    input: &[f32],
    in_rows: usize,
    in_cols: usize,
    kernel: &[f32],
    k_rows: usize,
    k_cols: usize,
    out: &mut [f32],
) {
    let out_rows = in_rows - k_rows + 1;
    let out_cols = in_cols - k_cols + 1;
    for r in 0..out_rows {
        for c in 0..out_cols {
            let mut sum = 0.0f32;
            for m in 0..k_rows {
                let in_row = &input[(r + m) * in_cols + c..][..k_cols];
                let k_row = &kernel[m * k_cols..][..k_cols];
                for (x, k) in in_row.iter().zip(k_row) {
                    sum += x * k;
                }
            }
            out[r * out_cols + c] += sum;
        }
    }
}

/// Transpose of `correlate_valid` with respect to its input: for every
/// position `(r, c)` of an `out_rows x out_cols` plane, accumulate
/// `delta(r - m, c - n) * kernel(m, n)` over in-range offsets.
fn correlate_full(
    delta: &[f32],
    d_rows: usize,
    d_cols: usize,
    kernel: &[f32],
    k_rows: usize,
    k_cols: usize,
    out: &mut [f32],
) {
    let out_rows = d_rows + k_rows - 1;
    let out_cols = d_cols + k_cols - 1;
    for r in 0..out_rows {
        for c in 0..out_cols {
            let mut sum = 0.0f32;
            for m in 0..k_rows {
                if r < m || r - m >= d_rows {
                    continue;
                }
                for n in 0..k_cols {
                    if c < n || c - n >= d_cols {
                        continue;
                    }
                    sum += delta[(r - m) * d_cols + (c - n)] * kernel[m * k_cols + n];
                }
            }
            out[r * out_cols + c] += sum;
        }
    }
}

impl Layer for ConvolutionLayer {
    fn kind(&self) -> LayerKind {
        LayerKind::Convolution
    }

    fn input_shape(&self) -> &[usize] {
        &self.input_shape
    }

    fn output_shape(&self) -> Vec<usize> {
        vec![self.num_filters, self.output_rows(), self.output_cols()]
    }

    fn weight_shapes(&self) -> Option<(Vec<usize>, Vec<usize>)> {
        Some((
            vec![
                self.num_filters,
                self.num_channels(),
                self.filter_rows,
                self.filter_cols,
            ],
            vec![self.num_filters],
        ))
    }

    /// Xavier-style uniform weights with
    /// `fan_in = channels * filter area`, `fan_out = filters * filter area`.
    fn create_weight(&self, rng: &mut SimpleRng) -> Option<Weight> {
        let (weight_shape, bias_shape) = self.weight_shapes()?;
        let fan_in = (self.num_channels() * self.filter_len()) as f32;
        let fan_out = (self.num_filters * self.filter_len()) as f32;
        let limit = (6.0f32 / (fan_in + fan_out)).sqrt();

        Some(Weight::new(
            rng.uniform_tensor(&weight_shape, limit),
            Tensor::filled(&bias_shape, INITIAL_BIAS),
        ))
    }

    fn generate_output(&self, weight: Option<&Weight>, input: &Tensor) -> NetResult<LayerOutput> {
        let weight = require_weight(self, weight)?;
        check_shape("convolution input", &self.input_shape, input)?;

        let (rows, cols) = (self.input_shape[1], self.input_shape[2]);
        let channels = self.num_channels();
        let kernels: Vec<&[f32]> = weight.w.data().chunks_exact(self.filter_len()).collect();
        let mut raw = Tensor::zeros(&self.output_shape());

        for (f, plane) in raw
            .data_mut()
            .chunks_exact_mut(self.output_plane_len())
            .enumerate()
        {
            for (c, channel) in input.data().chunks_exact(self.plane_len()).enumerate() {
                correlate_valid(
                    channel,
                    rows,
                    cols,
                    kernels[f * channels + c],
                    self.filter_rows,
                    self.filter_cols,
                    plane,
                );
            }
            let bias = weight.b.data()[f];
            for value in plane.iter_mut() {
                *value += bias;
            }
        }
        Ok(LayerOutput::new(raw))
    }

    fn activate(&self, raw: &Tensor) -> NetResult<Tensor> {
        self.activator.output(raw)
    }

    fn derive_delta(&self, output: &LayerOutput, upstream: &Tensor) -> NetResult<Tensor> {
        check_shape("convolution delta", &self.output_shape(), upstream)?;
        Ok(upstream.mul(&self.activator.derivative(&output.raw)?))
    }

    /// Weight gradient of filter `f`, channel `c` is the valid
    /// cross-correlation of input channel `c` with delta plane `f`; bias
    /// gradient is the sum of delta plane `f`.
    fn gradient(&self, input: &Tensor, delta: &Tensor) -> Option<Weight> {
        debug_assert_eq!(
            input.shape(),
            self.input_shape.as_slice(),
            "convolution gradient input shape"
        );
        debug_assert_eq!(
            delta.shape(),
            self.output_shape().as_slice(),
            "convolution gradient delta shape"
        );
        let (weight_shape, bias_shape) = self.weight_shapes()?;
        let mut grad = Weight::zeros(&weight_shape, &bias_shape);
        let (rows, cols) = (self.input_shape[1], self.input_shape[2]);
        let channels = self.num_channels();

        let delta_planes: Vec<&[f32]> = delta
            .data()
            .chunks_exact(self.output_plane_len())
            .collect();
        let input_planes: Vec<&[f32]> = input.data().chunks_exact(self.plane_len()).collect();

        for (i, kernel_grad) in grad
            .w
            .data_mut()
            .chunks_exact_mut(self.filter_len())
            .enumerate()
        {
            let (f, c) = (i / channels, i % channels);
            correlate_valid(
                input_planes[c],
                rows,
                cols,
                delta_planes[f],
                self.output_rows(),
                self.output_cols(),
                kernel_grad,
            );
        }
        for (b, plane) in grad.b.data_mut().iter_mut().zip(&delta_planes) {
            *b = plane.iter().sum();
        }
        Some(grad)
    }

    fn calculate_backprop(
        &self,
        weight: Option<&Weight>,
        _output: &LayerOutput,
        delta: &Tensor,
    ) -> NetResult<Tensor> {
        let weight = require_weight(self, weight)?;
        check_shape("convolution delta", &self.output_shape(), delta)?;

        let channels = self.num_channels();
        let kernels: Vec<&[f32]> = weight.w.data().chunks_exact(self.filter_len()).collect();
        let delta_planes: Vec<&[f32]> = delta
            .data()
            .chunks_exact(self.output_plane_len())
            .collect();

        let mut previous = Tensor::zeros(&self.input_shape);
        for (c, plane) in previous
            .data_mut()
            .chunks_exact_mut(self.plane_len())
            .enumerate()
        {
            for (f, delta_plane) in delta_planes.iter().enumerate() {
                correlate_full(
                    delta_plane,
                    self.output_rows(),
                    self.output_cols(),
                    kernels[f * channels + c],
                    self.filter_rows,
                    self.filter_cols,
                    plane,
                );
            }
        }
        Ok(previous)
    }
}
