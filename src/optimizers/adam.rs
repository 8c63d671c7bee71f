//! Adam (Adaptive Moment Estimation) optimizer implementation
//!
//! Adam keeps exponentially decaying averages of past gradients (first moment)
//! and past squared gradients (second moment), with bias correction:
//!
//! ```text
//! m_t = β1 * m_{t-1} + (1 - β1) * gradient
//! v_t = β2 * v_{t-1} + (1 - β2) * gradient²
//! m_hat = m_t / (1 - β1^t)
//! v_hat = v_t / (1 - β2^t)
//! parameter = parameter - α * m_hat / (√v_hat + ε)
//! ```
//!
//! # Reference
//!
//! Kingma, D. P., & Ba, J. (2014). Adam: A method for stochastic optimization.
//! arXiv preprint arXiv:1412.6980.

use std::collections::HashMap;

use crate::optimizers::{Optimizer, ParamKey};

/// Moment estimates and step counter of one parameter tensor.
#[derive(Debug, Clone)]
struct Moments {
    m: Vec<f32>,
    v: Vec<f32>,
    t: i32,
}

/// Adam optimizer.
///
/// # Example
///
/// ```
/// use scratch_mlp::optimizers::{Adam, Optimizer, ParamKey};
///
/// let mut optimizer = Adam::new(0.001, 0.9, 0.999, 1e-8);
/// let mut params = vec![1.0, 2.0, 3.0];
/// optimizer.update(ParamKey::new(0, 0), &mut params, &[0.1, 0.2, 0.3]);
/// assert!(params[0] < 1.0);
/// ```
#[derive(Debug, Clone)]
pub struct Adam {
    learning_rate: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    moments: HashMap<ParamKey, Moments>,
}

impl Adam {
    /// Typical values from the paper: 0.001, 0.9, 0.999, 1e-8.
    pub fn new(learning_rate: f32, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Self {
            learning_rate,
            beta1,
            beta2,
            epsilon,
            moments: HashMap::new(),
        }
    }

    /// Number of updates applied to `key` so far.
    pub fn step_count(&self, key: ParamKey) -> usize {
        self.moments.get(&key).map_or(0, |s| s.t as usize)
    }
}

impl Optimizer for Adam {
    fn update(&mut self, key: ParamKey, parameters: &mut [f32], gradients: &[f32]) {
        assert_eq!(
            parameters.len(),
            gradients.len(),
            "Parameters and gradients must have the same length"
        );

        let state = self.moments.entry(key).or_insert_with(|| Moments {
            m: vec![0.0; parameters.len()],
            v: vec![0.0; parameters.len()],
            t: 0,
        });
        assert_eq!(
            state.m.len(),
            parameters.len(),
            "Parameter tensor changed size since its moments were created"
        );

        state.t += 1;
        let bias_correction1 = 1.0 - self.beta1.powi(state.t);
        let bias_correction2 = 1.0 - self.beta2.powi(state.t);

        for i in 0..parameters.len() {
            let g = gradients[i];
            state.m[i] = self.beta1 * state.m[i] + (1.0 - self.beta1) * g;
            state.v[i] = self.beta2 * state.v[i] + (1.0 - self.beta2) * g * g;

            let m_hat = state.m[i] / bias_correction1;
            let v_hat = state.v[i] / bias_correction2;
            parameters[i] -= self.learning_rate * m_hat / (v_hat.sqrt() + self.epsilon);
        }
    }

    fn reset(&mut self) {
        self.moments.clear();
    }

    fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, lr: f32) {
        self.learning_rate = lr;
    }

    fn name(&self) -> &'static str {
        "adam"
    }

    fn box_clone(&self) -> Box<dyn Optimizer> {
        Box::new(self.clone())
    }
}
