//! Adagrad optimizer implementation
//!
//! Adagrad scales each parameter's step by the inverse square root of the sum
//! of all squared gradients that parameter has seen:
//!
//! ```text
//! G     = G + grad²
//! param = param - η * grad / (√G + ε)
//! ```
//!
//! `G` never decays, so the effective learning rate of a parameter only ever
//! shrinks over training. That is what separates Adagrad from decaying-average
//! variants such as RMSprop.
//!
//! # Reference
//!
//! Duchi, J., Hazan, E., & Singer, Y. (2011). Adaptive Subgradient Methods for
//! Online Learning and Stochastic Optimization. JMLR 12.

use std::collections::HashMap;

use crate::optimizers::{Optimizer, ParamKey};

/// Adagrad optimizer with one squared-gradient accumulator per parameter tensor.
///
/// # Example
///
/// ```
/// use scratch_mlp::optimizers::{Adagrad, Optimizer, ParamKey};
///
/// let mut optimizer = Adagrad::new(0.1, 1e-8);
/// let key = ParamKey::new(0, 0);
/// let mut weights = vec![1.0];
///
/// optimizer.update(key, &mut weights, &[2.0]);
/// // First step moves by ~learning_rate regardless of the gradient scale.
/// assert!((weights[0] - 0.9).abs() < 1e-6);
/// assert_eq!(optimizer.accumulator(key).unwrap(), &[4.0]);
/// ```
#[derive(Debug, Clone)]
pub struct Adagrad {
    learning_rate: f32,
    epsilon: f32,
    accumulators: HashMap<ParamKey, Vec<f32>>,
}

impl Adagrad {
    pub fn new(learning_rate: f32, epsilon: f32) -> Self {
        Self {
            learning_rate,
            epsilon,
            accumulators: HashMap::new(),
        }
    }

    pub fn epsilon(&self) -> f32 {
        self.epsilon
    }

    /// Sum of squared gradients seen so far for `key`, if it was ever updated.
    pub fn accumulator(&self, key: ParamKey) -> Option<&[f32]> {
        self.accumulators.get(&key).map(Vec::as_slice)
    }
}

impl Optimizer for Adagrad {
    fn update(&mut self, key: ParamKey, parameters: &mut [f32], gradients: &[f32]) {
        assert_eq!(
            parameters.len(),
            gradients.len(),
            "Parameters and gradients must have the same length"
        );

        let acc = self
            .accumulators
            .entry(key)
            .or_insert_with(|| vec![0.0; parameters.len()]);
        assert_eq!(
            acc.len(),
            parameters.len(),
            "Parameter tensor changed size since its accumulator was created"
        );

        for ((param, &grad), g_sum) in parameters.iter_mut().zip(gradients).zip(acc.iter_mut()) {
            *g_sum += grad * grad;
            *param -= self.learning_rate * grad / (g_sum.sqrt() + self.epsilon);
        }
    }

    fn reset(&mut self) {
        self.accumulators.clear();
    }

    fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, lr: f32) {
        self.learning_rate = lr;
    }

    fn name(&self) -> &'static str {
        "adagrad"
    }

    fn box_clone(&self) -> Box<dyn Optimizer> {
        Box::new(self.clone())
    }
}
