//! Dense n-dimensional tensor
//!
//! A `Tensor` is a shape plus a row-major `f32` buffer. The shape is fixed at
//! creation; the buffer is mutable. Elementwise operations require identical
//! shapes and panic otherwise, since a mismatch there is a bug in the caller
//! rather than bad input data.

use crate::error::{NetError, NetResult};
use serde::{Deserialize, Deserializer, Serialize};

/// Row-major n-dimensional array of `f32`.
///
/// # Example
///
/// ```
/// use rust_convnet::tensor::Tensor;
///
/// let t = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
/// assert_eq!(t.get(&[1, 0]), 3.0);
/// assert_eq!(t.sum(), 10.0);
/// ```
///
/// Serializes as `{"shape": [...], "data": [...]}`. Deserialization goes
/// through `from_vec`, so a buffer whose length disagrees with the shape is
/// rejected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl<'de> Deserialize<'de> for Tensor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Parts {
            shape: Vec<usize>,
            data: Vec<f32>,
        }

        let parts = Parts::deserialize(deserializer)?;
        Tensor::from_vec(parts.data, &parts.shape).map_err(serde::de::Error::custom)
    }
}

impl Tensor {
    /// Tensor of the given shape filled with zeros.
    pub fn zeros(shape: &[usize]) -> Self {
        Self::filled(shape, 0.0)
    }

    /// Tensor of the given shape filled with `value`.
    pub fn filled(shape: &[usize], value: f32) -> Self {
        Self {
            shape: shape.to_vec(),
            data: vec![value; shape.iter().product()],
        }
    }

    /// Wrap an existing buffer.
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` if `data.len()` is not the product of `shape`.
    pub fn from_vec(data: Vec<f32>, shape: &[usize]) -> NetResult<Self> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(NetError::count_mismatch("tensor buffer", expected, data.len()));
        }
        Ok(Self {
            shape: shape.to_vec(),
            data,
        })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn offset(&self, index: &[usize]) -> usize {
        assert_eq!(index.len(), self.shape.len(), "Index rank must match tensor rank");
        index
            .iter()
            .zip(self.shape.iter())
            .fold(0, |acc, (&i, &dim)| {
                assert!(i < dim, "Index {} out of bounds for dimension {}", i, dim);
                acc * dim + i
            })
    }

    /// Element at a multi-dimensional index.
    pub fn get(&self, index: &[usize]) -> f32 {
        self.data[self.offset(index)]
    }

    /// Overwrite the element at a multi-dimensional index.
    pub fn set(&mut self, index: &[usize], value: f32) {
        let offset = self.offset(index);
        self.data[offset] = value;
    }

    /// Same buffer under a new shape with the same element count.
    pub fn reshape(&self, shape: &[usize]) -> NetResult<Tensor> {
        Tensor::from_vec(self.data.clone(), shape)
    }

    /// Rank-1 view of the same data.
    pub fn flatten(&self) -> Tensor {
        Tensor {
            shape: vec![self.data.len()],
            data: self.data.clone(),
        }
    }

    fn assert_same_shape(&self, other: &Tensor) {
        assert_eq!(
            self.shape, other.shape,
            "Tensors must have the same shape for elementwise operations"
        );
    }

    pub fn map(&self, f: impl Fn(f32) -> f32) -> Tensor {
        Tensor {
            shape: self.shape.clone(),
            data: self.data.iter().map(|&x| f(x)).collect(),
        }
    }

    fn zip_with(&self, other: &Tensor, f: impl Fn(f32, f32) -> f32) -> Tensor {
        self.assert_same_shape(other);
        Tensor {
            shape: self.shape.clone(),
            data: self
                .data
                .iter()
                .zip(other.data.iter())
                .map(|(&a, &b)| f(a, b))
                .collect(),
        }
    }

    pub fn add(&self, other: &Tensor) -> Tensor {
        self.zip_with(other, |a, b| a + b)
    }

    pub fn sub(&self, other: &Tensor) -> Tensor {
        self.zip_with(other, |a, b| a - b)
    }

    /// Elementwise (Hadamard) product.
    pub fn mul(&self, other: &Tensor) -> Tensor {
        self.zip_with(other, |a, b| a * b)
    }

    pub fn scale(&self, factor: f32) -> Tensor {
        self.map(|x| x * factor)
    }

    pub fn add_inplace(&mut self, other: &Tensor) {
        self.assert_same_shape(other);
        for (a, &b) in self.data.iter_mut().zip(other.data.iter()) {
            *a += b;
        }
    }

    pub fn sub_inplace(&mut self, other: &Tensor) {
        self.assert_same_shape(other);
        for (a, &b) in self.data.iter_mut().zip(other.data.iter()) {
            *a -= b;
        }
    }

    pub fn mul_inplace(&mut self, other: &Tensor) {
        self.assert_same_shape(other);
        for (a, &b) in self.data.iter_mut().zip(other.data.iter()) {
            *a *= b;
        }
    }

    pub fn scale_inplace(&mut self, factor: f32) {
        for a in self.data.iter_mut() {
            *a *= factor;
        }
    }

    /// `self += factor * other`, the axpy step used by the update rule.
    pub fn add_scaled_inplace(&mut self, other: &Tensor, factor: f32) {
        self.assert_same_shape(other);
        for (a, &b) in self.data.iter_mut().zip(other.data.iter()) {
            *a += factor * b;
        }
    }

    pub fn sum(&self) -> f32 {
        self.data.iter().sum()
    }

    /// Arithmetic mean; zero for an empty tensor.
    pub fn mean(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.sum() / self.data.len() as f32
    }

    /// Euclidean norm of the flattened buffer.
    pub fn norm(&self) -> f32 {
        self.data.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    pub fn has_nan(&self) -> bool {
        self.data.iter().any(|x| x.is_nan())
    }

    /// Matrix transpose.
    ///
    /// # Panics
    ///
    /// Panics if the tensor is not rank 2.
    pub fn transpose(&self) -> Tensor {
        assert_eq!(self.shape.len(), 2, "transpose requires a rank-2 tensor");
        let (rows, cols) = (self.shape[0], self.shape[1]);
        let mut data = vec![0.0f32; rows * cols];
        for r in 0..rows {
            for c in 0..cols {
                data[c * rows + r] = self.data[r * cols + c];
            }
        }
        Tensor {
            shape: vec![cols, rows],
            data,
        }
    }
}
