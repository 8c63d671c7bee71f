//! Batch normalization layer implementation
//!
//! Batch normalization normalizes each feature to zero mean and unit variance
//! within a mini-batch, then applies a learnable scale (gamma) and shift (beta):
//!
//! 1. Compute batch statistics: mean μ and variance σ² across the batch
//! 2. Normalize: x_norm = (x - μ) / sqrt(σ² + ε)
//! 3. Scale and shift: y = γ * x_norm + β
//!
//! During training the layer uses batch statistics and folds them into running
//! statistics with an exponential moving average. During evaluation it uses
//! only the running statistics, so a single-sample evaluation batch behaves
//! exactly like a large one.
//!
//! # References
//!
//! Ioffe, S., & Szegedy, C. (2015). Batch Normalization: Accelerating Deep Network Training
//! by Reducing Internal Covariate Shift. ICML.

use crate::error::{NetworkError, Result};
use crate::layers::{Layer, Parameter};

/// Default ε added to the variance.
pub const DEFAULT_EPSILON: f32 = 1e-5;
/// Default momentum of the running-statistics moving average.
pub const DEFAULT_MOMENTUM: f32 = 0.9;

/// Values from a training forward pass that the backward pass depends on.
#[derive(Debug, Clone)]
struct BatchNormCache {
    normalized: Vec<f32>,
    /// 1 / sqrt(batch_var + ε) per feature
    inv_std: Vec<f32>,
    batch_size: usize,
}

/// Batch normalization layer with learnable scale and shift parameters.
///
/// # Fields
///
/// * `size` - Number of input/output features (batch norm doesn't change dimensions)
/// * `epsilon` - Small constant for numerical stability
/// * `momentum` - Weight of the old value in `running = momentum * running + (1 - momentum) * batch`
/// * `gamma` - Learnable scale (initialized to 1.0)
/// * `beta` - Learnable shift (initialized to 0.0)
/// * `running_mean` - Running average of batch means (initialized to 0.0)
/// * `running_var` - Running average of batch variances (initialized to 1.0)
///
/// # Example
///
/// ```
/// use scratch_mlp::layers::{BatchNormLayer, Layer};
///
/// let layer = BatchNormLayer::new(512, 1e-5, 0.9).unwrap();
/// assert_eq!(layer.input_size(), 512);
/// assert_eq!(layer.parameter_count(), 1024);  // 512 gamma + 512 beta
/// ```
#[derive(Debug, Clone)]
pub struct BatchNormLayer {
    size: usize,
    epsilon: f32,
    momentum: f32,

    gamma: Vec<f32>,
    beta: Vec<f32>,
    grad_gamma: Vec<f32>,
    grad_beta: Vec<f32>,

    running_mean: Vec<f32>,
    running_var: Vec<f32>,

    cache: Option<BatchNormCache>,
}

impl BatchNormLayer {
    /// Creates a new batch normalization layer.
    ///
    /// # Errors
    ///
    /// `Configuration` if `epsilon` is not positive or `momentum` is outside [0, 1].
    pub fn new(size: usize, epsilon: f32, momentum: f32) -> Result<Self> {
        if !(epsilon > 0.0 && epsilon.is_finite()) {
            return Err(NetworkError::config(format!(
                "batch-norm epsilon must be positive, got {}",
                epsilon
            )));
        }
        if !(0.0..=1.0).contains(&momentum) {
            return Err(NetworkError::config(format!(
                "batch-norm momentum must be in range [0.0, 1.0], got {}",
                momentum
            )));
        }

        Ok(Self {
            size,
            epsilon,
            momentum,
            gamma: vec![1.0f32; size],
            beta: vec![0.0f32; size],
            grad_gamma: vec![0.0f32; size],
            grad_beta: vec![0.0f32; size],
            running_mean: vec![0.0f32; size],
            running_var: vec![1.0f32; size],
            cache: None,
        })
    }

    pub fn epsilon(&self) -> f32 {
        self.epsilon
    }

    pub fn momentum(&self) -> f32 {
        self.momentum
    }

    pub fn gamma(&self) -> &[f32] {
        &self.gamma
    }

    pub fn beta(&self) -> &[f32] {
        &self.beta
    }

    pub fn gamma_gradients(&self) -> &[f32] {
        &self.grad_gamma
    }

    pub fn beta_gradients(&self) -> &[f32] {
        &self.grad_beta
    }

    /// Running mean accumulated over training forward passes.
    pub fn running_mean(&self) -> &[f32] {
        &self.running_mean
    }

    /// Running variance accumulated over training forward passes.
    pub fn running_var(&self) -> &[f32] {
        &self.running_var
    }

    fn check_len(&self, what: &str, len: usize, batch_size: usize) -> Result<()> {
        if len != batch_size * self.size {
            return Err(NetworkError::shape(format!(
                "batch-norm {} expects {} values ({} x {}), got {}",
                what,
                batch_size * self.size,
                batch_size,
                self.size,
                len
            )));
        }
        Ok(())
    }
}

impl Layer for BatchNormLayer {
    fn forward(&mut self, input: &[f32], batch_size: usize, training: bool) -> Result<Vec<f32>> {
        self.check_len("input", input.len(), batch_size)?;
        let total_size = batch_size * self.size;
        let mut output = vec![0.0f32; total_size];

        if !training {
            for i in 0..batch_size {
                for j in 0..self.size {
                    let idx = i * self.size + j;
                    let normalized = (input[idx] - self.running_mean[j])
                        / (self.running_var[j] + self.epsilon).sqrt();
                    output[idx] = self.gamma[j] * normalized + self.beta[j];
                }
            }
            return Ok(output);
        }

        let n = batch_size.max(1) as f32;
        let mut batch_mean = vec![0.0f32; self.size];
        for i in 0..batch_size {
            for j in 0..self.size {
                batch_mean[j] += input[i * self.size + j];
            }
        }
        batch_mean.iter_mut().for_each(|m| *m /= n);

        // Biased variance, as used for normalization.
        let mut batch_var = vec![0.0f32; self.size];
        for i in 0..batch_size {
            for j in 0..self.size {
                let diff = input[i * self.size + j] - batch_mean[j];
                batch_var[j] += diff * diff;
            }
        }
        batch_var.iter_mut().for_each(|v| *v /= n);

        let inv_std: Vec<f32> = batch_var
            .iter()
            .map(|&v| 1.0 / (v + self.epsilon).sqrt())
            .collect();

        let mut normalized = vec![0.0f32; total_size];
        for i in 0..batch_size {
            for j in 0..self.size {
                let idx = i * self.size + j;
                normalized[idx] = (input[idx] - batch_mean[j]) * inv_std[j];
                output[idx] = self.gamma[j] * normalized[idx] + self.beta[j];
            }
        }

        // An empty batch has no statistics to fold in.
        if batch_size > 0 {
            for j in 0..self.size {
                self.running_mean[j] =
                    self.momentum * self.running_mean[j] + (1.0 - self.momentum) * batch_mean[j];
                self.running_var[j] =
                    self.momentum * self.running_var[j] + (1.0 - self.momentum) * batch_var[j];
            }
        }

        self.cache = Some(BatchNormCache {
            normalized,
            inv_std,
            batch_size,
        });
        Ok(output)
    }

    /// Uses the batch statistics of the matching training forward pass:
    ///
    /// ```text
    /// dγ = mean(dy · x̂)        dβ = mean(dy)
    /// dx̂ = dy · γ
    /// dx = inv_std / N · (N·dx̂ - Σdx̂ - x̂ · Σ(dx̂ · x̂))
    /// ```
    fn backward(&mut self, grad_output: &[f32]) -> Result<Vec<f32>> {
        let cache = self.cache.take().ok_or_else(|| {
            NetworkError::MissingForwardCache(format!("batch-norm layer of size {}", self.size))
        })?;
        let batch_size = cache.batch_size;
        self.check_len("gradient", grad_output.len(), batch_size)?;

        let n = batch_size.max(1) as f32;
        let mut sum_dxhat = vec![0.0f32; self.size];
        let mut sum_dxhat_xhat = vec![0.0f32; self.size];
        self.grad_gamma.iter_mut().for_each(|g| *g = 0.0);
        self.grad_beta.iter_mut().for_each(|g| *g = 0.0);

        for i in 0..batch_size {
            for j in 0..self.size {
                let idx = i * self.size + j;
                let dy = grad_output[idx];
                let xhat = cache.normalized[idx];
                self.grad_gamma[j] += dy * xhat / n;
                self.grad_beta[j] += dy / n;

                let dxhat = dy * self.gamma[j];
                sum_dxhat[j] += dxhat;
                sum_dxhat_xhat[j] += dxhat * xhat;
            }
        }

        let mut grad_input = vec![0.0f32; grad_output.len()];
        for i in 0..batch_size {
            for j in 0..self.size {
                let idx = i * self.size + j;
                let dxhat = grad_output[idx] * self.gamma[j];
                grad_input[idx] = cache.inv_std[j] / n
                    * (n * dxhat - sum_dxhat[j] - cache.normalized[idx] * sum_dxhat_xhat[j]);
            }
        }

        Ok(grad_input)
    }

    fn parameters(&mut self) -> Vec<Parameter<'_>> {
        vec![
            Parameter {
                name: "gamma",
                values: &mut self.gamma,
                gradients: &self.grad_gamma,
            },
            Parameter {
                name: "beta",
                values: &mut self.beta,
                gradients: &self.grad_beta,
            },
        ]
    }

    fn input_size(&self) -> usize {
        self.size
    }

    /// Same as the input size; normalization keeps the width.
    fn output_size(&self) -> usize {
        self.size
    }

    fn parameter_count(&self) -> usize {
        2 * self.size // gamma + beta
    }
}
