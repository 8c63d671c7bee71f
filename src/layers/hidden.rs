//! One affine + (optional) batch-norm + activation stage of the network.

use crate::error::{NetworkError, Result};
use crate::layers::batchnorm::{DEFAULT_EPSILON, DEFAULT_MOMENTUM};
use crate::layers::{BatchNormLayer, DenseLayer, Layer, Parameter};
use crate::utils::{Activation, SimpleRng};

/// Activation-side values from the last training forward pass.
#[derive(Debug, Clone)]
struct ActivationCache {
    /// Input to the activation: `z`, or the normalized `z` with batch norm.
    pre_activation: Vec<f32>,
    output: Vec<f32>,
}

/// A network stage computing `a = f(BN(x·W + b))`, with BN optional.
///
/// The dense part caches the stage input, the batch-norm part caches the
/// normalized sums and batch statistics, and the stage itself caches the
/// activation input and output. All three caches are consumed by the
/// matching backward call.
///
/// # Example
///
/// ```
/// use scratch_mlp::layers::{HiddenLayer, Layer};
/// use scratch_mlp::utils::{Activation, SimpleRng};
///
/// let mut rng = SimpleRng::new(0);
/// let layer = HiddenLayer::new(128, 48, Activation::Softplus, true, &mut rng).unwrap();
/// assert_eq!(layer.parameter_count(), 128 * 48 + 48 + 2 * 48);
/// ```
#[derive(Debug, Clone)]
pub struct HiddenLayer {
    dense: DenseLayer,
    batch_norm: Option<BatchNormLayer>,
    activation: Activation,
    cache: Option<ActivationCache>,
}

impl HiddenLayer {
    /// Builds a stage with Xavier-initialized weights and, when `batch_norm`
    /// is set, default normalization settings (ε = 1e-5, momentum = 0.9).
    ///
    /// # Errors
    ///
    /// `Configuration` if either width is zero.
    pub fn new(
        n_in: usize,
        n_out: usize,
        activation: Activation,
        batch_norm: bool,
        rng: &mut SimpleRng,
    ) -> Result<Self> {
        if n_in == 0 || n_out == 0 {
            return Err(NetworkError::config(format!(
                "layer widths must be greater than 0, got {} -> {}",
                n_in, n_out
            )));
        }
        let batch_norm = if batch_norm {
            Some(BatchNormLayer::new(n_out, DEFAULT_EPSILON, DEFAULT_MOMENTUM)?)
        } else {
            None
        };

        Ok(Self {
            dense: DenseLayer::new(n_in, n_out, rng),
            batch_norm,
            activation,
            cache: None,
        })
    }

    /// Replaces the normalization settings; a no-op without batch norm.
    pub fn with_norm_settings(mut self, epsilon: f32, momentum: f32) -> Result<Self> {
        if let Some(bn) = self.batch_norm.as_mut() {
            *bn = BatchNormLayer::new(bn.input_size(), epsilon, momentum)?;
        }
        Ok(self)
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    pub fn dense(&self) -> &DenseLayer {
        &self.dense
    }

    pub fn dense_mut(&mut self) -> &mut DenseLayer {
        &mut self.dense
    }

    pub fn batch_norm(&self) -> Option<&BatchNormLayer> {
        self.batch_norm.as_ref()
    }

    pub fn has_batch_norm(&self) -> bool {
        self.batch_norm.is_some()
    }

    /// Backward pass starting from the gradient w.r.t. the activation input.
    ///
    /// Used directly by the network for a softmax output trained with
    /// cross-entropy, where that gradient is `prediction - target`.
    pub fn backward_from_preactivation(&mut self, grad_pre_activation: &[f32]) -> Result<Vec<f32>> {
        self.cache = None;
        let grad_z = match self.batch_norm.as_mut() {
            Some(bn) => bn.backward(grad_pre_activation)?,
            None => grad_pre_activation.to_vec(),
        };
        self.dense.backward(&grad_z)
    }
}

impl Layer for HiddenLayer {
    fn forward(&mut self, input: &[f32], batch_size: usize, training: bool) -> Result<Vec<f32>> {
        let z = self.dense.forward(input, batch_size, training)?;
        let pre_activation = match self.batch_norm.as_mut() {
            Some(bn) => bn.forward(&z, batch_size, training)?,
            None => z,
        };

        let mut output = vec![0.0f32; pre_activation.len()];
        self.activation
            .forward(&pre_activation, &mut output, self.dense.output_size());

        if training {
            self.cache = Some(ActivationCache {
                pre_activation,
                output: output.clone(),
            });
        }
        Ok(output)
    }

    fn backward(&mut self, grad_output: &[f32]) -> Result<Vec<f32>> {
        let n_out = self.dense.output_size();
        let cache = self.cache.as_ref().ok_or_else(|| {
            NetworkError::MissingForwardCache(format!(
                "{} layer {}x{}",
                self.activation,
                self.dense.input_size(),
                n_out
            ))
        })?;
        if grad_output.len() != cache.output.len() {
            return Err(NetworkError::shape(format!(
                "layer backward expects {} gradient values, got {}",
                cache.output.len(),
                grad_output.len()
            )));
        }

        let mut grad_pre = vec![0.0f32; grad_output.len()];
        self.activation.backward(
            &cache.pre_activation,
            &cache.output,
            grad_output,
            &mut grad_pre,
            n_out,
        );
        self.backward_from_preactivation(&grad_pre)
    }

    /// Weights, biases, then gamma and beta when normalized.
    fn parameters(&mut self) -> Vec<Parameter<'_>> {
        let mut params = self.dense.parameters();
        if let Some(bn) = self.batch_norm.as_mut() {
            params.extend(bn.parameters());
        }
        params
    }

    fn input_size(&self) -> usize {
        self.dense.input_size()
    }

    fn output_size(&self) -> usize {
        self.dense.output_size()
    }

    fn parameter_count(&self) -> usize {
        self.dense.parameter_count()
            + self
                .batch_norm
                .as_ref()
                .map_or(0, |bn| bn.parameter_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_width_rejected() {
        let mut rng = SimpleRng::new(3);
        assert!(matches!(
            HiddenLayer::new(0, 4, Activation::Sigmoid, false, &mut rng),
            Err(NetworkError::Configuration(_))
        ));
    }

    #[test]
    fn test_parameter_order() {
        let mut rng = SimpleRng::new(3);
        let mut layer = HiddenLayer::new(3, 2, Activation::Identity, true, &mut rng).unwrap();
        let names: Vec<_> = layer.parameters().iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["weights", "biases", "gamma", "beta"]);
    }

    #[test]
    fn test_eval_forward_does_not_create_cache() {
        let mut rng = SimpleRng::new(3);
        let mut layer = HiddenLayer::new(2, 2, Activation::Sigmoid, false, &mut rng).unwrap();
        layer.forward(&[0.1, 0.2], 1, false).unwrap();
        assert!(matches!(
            layer.backward(&[1.0, 1.0]),
            Err(NetworkError::MissingForwardCache(_))
        ));
    }

    #[test]
    fn test_cache_consumed_by_backward() {
        let mut rng = SimpleRng::new(3);
        let mut layer = HiddenLayer::new(2, 2, Activation::Softplus, true, &mut rng).unwrap();
        layer.forward(&[0.1, 0.2, -0.3, 0.4], 2, true).unwrap();
        layer.backward(&[1.0; 4]).unwrap();
        assert!(layer.backward(&[1.0; 4]).is_err());
    }
}
