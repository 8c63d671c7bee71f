//! Dense (fully connected) layer implementation
//!
//! This module provides a DenseLayer that performs the affine transformation
//! `z = x·W + b`. Activation and normalization are applied on top of it by
//! [`HiddenLayer`](crate::layers::HiddenLayer).

use crate::error::{NetworkError, Result};
use crate::layers::{Layer, Parameter};
use crate::utils::SimpleRng;

/// Dense (fully connected) layer with weights and biases.
///
/// Performs the affine transformation: z = xW + b
/// where x is the input (batch_size × input_size),
/// W is the weight matrix (input_size × output_size),
/// and b is the bias vector (output_size).
///
/// # Example
///
/// ```
/// use scratch_mlp::layers::{DenseLayer, Layer};
/// use scratch_mlp::utils::SimpleRng;
///
/// let mut rng = SimpleRng::new(42);
/// let layer = DenseLayer::new(784, 512, &mut rng);
/// assert_eq!(layer.input_size(), 784);
/// assert_eq!(layer.output_size(), 512);
/// ```
#[derive(Debug, Clone)]
pub struct DenseLayer {
    input_size: usize,
    output_size: usize,
    /// Row-major (input_size × output_size)
    weights: Vec<f32>,
    biases: Vec<f32>,
    grad_weights: Vec<f32>,
    grad_biases: Vec<f32>,
    /// Input of the last training forward pass and its batch size.
    cached_input: Option<(Vec<f32>, usize)>,
}

impl DenseLayer {
    /// Create a new DenseLayer with Xavier initialization.
    ///
    /// Weights are sampled from U[-limit, limit] with
    /// limit = sqrt(6 / (input_size + output_size)). Biases start at zero.
    pub fn new(input_size: usize, output_size: usize, rng: &mut SimpleRng) -> Self {
        let limit = (6.0f32 / (input_size + output_size).max(1) as f32).sqrt();
        let weights = (0..input_size * output_size)
            .map(|_| rng.gen_range_f32(-limit, limit))
            .collect();

        Self {
            input_size,
            output_size,
            weights,
            biases: vec![0.0f32; output_size],
            grad_weights: vec![0.0f32; input_size * output_size],
            grad_biases: vec![0.0f32; output_size],
            cached_input: None,
        }
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    pub fn biases(&self) -> &[f32] {
        &self.biases
    }

    /// Gradient of the batch-mean loss w.r.t. the weights from the last backward pass.
    pub fn weight_gradients(&self) -> &[f32] {
        &self.grad_weights
    }

    pub fn bias_gradients(&self) -> &[f32] {
        &self.grad_biases
    }

    /// Overwrite the weights; the shape is fixed at construction.
    pub fn set_weights(&mut self, weights: &[f32]) -> Result<()> {
        if weights.len() != self.weights.len() {
            return Err(NetworkError::shape(format!(
                "dense weights expect {} values ({}x{}), got {}",
                self.weights.len(),
                self.input_size,
                self.output_size,
                weights.len()
            )));
        }
        self.weights.copy_from_slice(weights);
        Ok(())
    }

    /// Overwrite the biases; the shape is fixed at construction.
    pub fn set_biases(&mut self, biases: &[f32]) -> Result<()> {
        if biases.len() != self.biases.len() {
            return Err(NetworkError::shape(format!(
                "dense biases expect {} values, got {}",
                self.biases.len(),
                biases.len()
            )));
        }
        self.biases.copy_from_slice(biases);
        Ok(())
    }
}

impl Layer for DenseLayer {
    fn forward(&mut self, input: &[f32], batch_size: usize, training: bool) -> Result<Vec<f32>> {
        if input.len() != batch_size * self.input_size {
            return Err(NetworkError::shape(format!(
                "dense layer expects {} input features per sample, got {} values for batch of {}",
                self.input_size,
                input.len(),
                batch_size
            )));
        }

        let mut output = Vec::with_capacity(batch_size * self.output_size);
        for b in 0..batch_size {
            let row = &input[b * self.input_size..(b + 1) * self.input_size];
            output.extend_from_slice(&self.biases);
            let out_row = &mut output[b * self.output_size..(b + 1) * self.output_size];
            for (i, &x) in row.iter().enumerate() {
                let w_row = &self.weights[i * self.output_size..(i + 1) * self.output_size];
                for (o, &w) in out_row.iter_mut().zip(w_row) {
                    *o += x * w;
                }
            }
        }

        if training {
            self.cached_input = Some((input.to_vec(), batch_size));
        }
        Ok(output)
    }

    fn backward(&mut self, grad_output: &[f32]) -> Result<Vec<f32>> {
        let (input, batch_size) = self.cached_input.take().ok_or_else(|| {
            NetworkError::MissingForwardCache(format!(
                "dense layer {}x{}",
                self.input_size, self.output_size
            ))
        })?;
        if grad_output.len() != batch_size * self.output_size {
            return Err(NetworkError::shape(format!(
                "dense backward expects {} gradient values, got {}",
                batch_size * self.output_size,
                grad_output.len()
            )));
        }

        let scale = 1.0 / batch_size.max(1) as f32;
        self.grad_weights.iter_mut().for_each(|g| *g = 0.0);
        self.grad_biases.iter_mut().for_each(|g| *g = 0.0);
        let mut grad_input = vec![0.0f32; batch_size * self.input_size];

        for b in 0..batch_size {
            let x_row = &input[b * self.input_size..(b + 1) * self.input_size];
            let g_row = &grad_output[b * self.output_size..(b + 1) * self.output_size];
            let gi_row = &mut grad_input[b * self.input_size..(b + 1) * self.input_size];

            for (gb, &g) in self.grad_biases.iter_mut().zip(g_row) {
                *gb += g * scale;
            }
            for i in 0..self.input_size {
                let w_row = &self.weights[i * self.output_size..(i + 1) * self.output_size];
                let gw_row = &mut self.grad_weights[i * self.output_size..(i + 1) * self.output_size];
                let x = x_row[i];
                let mut acc = 0.0f32;
                for ((gw, &w), &g) in gw_row.iter_mut().zip(w_row).zip(g_row) {
                    *gw += x * g * scale;
                    acc += g * w;
                }
                gi_row[i] = acc;
            }
        }

        Ok(grad_input)
    }

    fn parameters(&mut self) -> Vec<Parameter<'_>> {
        vec![
            Parameter {
                name: "weights",
                values: &mut self.weights,
                gradients: &self.grad_weights,
            },
            Parameter {
                name: "biases",
                values: &mut self.biases,
                gradients: &self.grad_biases,
            },
        ]
    }

    fn input_size(&self) -> usize {
        self.input_size
    }

    fn output_size(&self) -> usize {
        self.output_size
    }

    /// input_size × output_size weights + output_size biases.
    fn parameter_count(&self) -> usize {
        self.weights.len() + self.biases.len()
    }
}
