//! Stochastic Gradient Descent (SGD) optimizer implementation
//!
//! Plain SGD performs `parameter = parameter - learning_rate * gradient`.
//! With a non-zero momentum it keeps a velocity per parameter tensor:
//!
//! ```text
//! v     = μ * v + grad
//! param = param - η * v
//! ```

use std::collections::HashMap;

use crate::optimizers::{Optimizer, ParamKey};

/// Stochastic Gradient Descent optimizer.
///
/// # Example
///
/// ```
/// use scratch_mlp::optimizers::{Optimizer, ParamKey, SGD};
///
/// let mut optimizer = SGD::new(0.1);
/// let mut params = vec![1.0, 2.0, 3.0];
///
/// optimizer.update(ParamKey::new(0, 0), &mut params, &[0.1, 0.2, 0.3]);
/// assert!((params[0] - 0.99).abs() < 1e-6);
/// assert!((params[2] - 2.97).abs() < 1e-6);
/// ```
#[derive(Debug, Clone)]
pub struct SGD {
    learning_rate: f32,
    momentum: f32,
    velocities: HashMap<ParamKey, Vec<f32>>,
}

impl SGD {
    /// Vanilla SGD without momentum.
    pub fn new(learning_rate: f32) -> Self {
        Self::with_momentum(learning_rate, 0.0)
    }

    pub fn with_momentum(learning_rate: f32, momentum: f32) -> Self {
        Self {
            learning_rate,
            momentum,
            velocities: HashMap::new(),
        }
    }

    pub fn momentum(&self) -> f32 {
        self.momentum
    }
}

impl Optimizer for SGD {
    fn update(&mut self, key: ParamKey, parameters: &mut [f32], gradients: &[f32]) {
        assert_eq!(
            parameters.len(),
            gradients.len(),
            "Parameters and gradients must have the same length"
        );

        if self.momentum == 0.0 {
            for (param, grad) in parameters.iter_mut().zip(gradients) {
                *param -= self.learning_rate * grad;
            }
            return;
        }

        let velocity = self
            .velocities
            .entry(key)
            .or_insert_with(|| vec![0.0; parameters.len()]);
        for ((param, &grad), v) in parameters.iter_mut().zip(gradients).zip(velocity.iter_mut()) {
            *v = self.momentum * *v + grad;
            *param -= self.learning_rate * *v;
        }
    }

    /// Clears momentum velocities; vanilla SGD has none.
    fn reset(&mut self) {
        self.velocities.clear();
    }

    fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, lr: f32) {
        self.learning_rate = lr;
    }

    fn name(&self) -> &'static str {
        "sgd"
    }

    fn box_clone(&self) -> Box<dyn Optimizer> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: ParamKey = ParamKey { layer: 0, param: 0 };

    #[test]
    fn test_sgd_multiple_updates() {
        let mut optimizer = SGD::new(0.01);
        let mut params = vec![1.0, 1.0];
        let grads = vec![1.0, -1.0];

        optimizer.update(KEY, &mut params, &grads);
        assert!((params[0] - 0.99).abs() < 1e-6);
        assert!((params[1] - 1.01).abs() < 1e-6);

        optimizer.update(KEY, &mut params, &grads);
        assert!((params[0] - 0.98).abs() < 1e-6);
        assert!((params[1] - 1.02).abs() < 1e-6);
    }

    #[test]
    fn test_sgd_momentum_accelerates() {
        let mut optimizer = SGD::with_momentum(0.1, 0.9);
        let mut params = vec![0.0];

        optimizer.update(KEY, &mut params, &[1.0]);
        assert!((params[0] + 0.1).abs() < 1e-6);
        // v = 0.9 * 1 + 1 = 1.9
        optimizer.update(KEY, &mut params, &[1.0]);
        assert!((params[0] + 0.29).abs() < 1e-6);
    }

    #[test]
    fn test_sgd_zero_learning_rate() {
        let mut optimizer = SGD::new(0.0);
        let mut params = vec![1.0, 2.0, 3.0];
        let original = params.clone();
        optimizer.update(KEY, &mut params, &[0.1, 0.2, 0.3]);
        assert_eq!(params, original);
    }

    #[test]
    #[should_panic(expected = "Parameters and gradients must have the same length")]
    fn test_sgd_mismatched_lengths() {
        let mut optimizer = SGD::new(0.01);
        optimizer.update(KEY, &mut [1.0, 2.0], &[0.1, 0.2, 0.3]);
    }
}
