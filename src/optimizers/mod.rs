//! Optimizer abstractions for neural network parameter updates
//!
//! Optimizers turn the gradients produced by a backward pass into in-place
//! parameter updates. Stateful optimizers keep one state tensor per parameter
//! tensor, keyed by [`ParamKey`], created lazily on the first update and kept
//! for the optimizer's whole lifetime.
//!
//! # Available Optimizers
//!
//! - SGD: stochastic gradient descent with optional classical momentum
//! - Adagrad: per-parameter step sizes from the running sum of squared gradients
//! - Adam: adaptive moment estimation with bias correction
//!
//! # Example
//!
//! ```
//! use scratch_mlp::config::Hyperparams;
//! use scratch_mlp::optimizers::{OptimizerKind, ParamKey};
//!
//! let kind: OptimizerKind = "adagrad".parse().unwrap();
//! let mut optimizer = kind.build(&Hyperparams::default());
//!
//! let mut weights = vec![1.0, 2.0];
//! optimizer.update(ParamKey::new(0, 0), &mut weights, &[0.5, -0.5]);
//! assert!(weights[0] < 1.0 && weights[1] > 2.0);
//! ```

pub mod adagrad;
pub mod adam;
pub mod sgd;

pub use adagrad::Adagrad;
pub use adam::Adam;
pub use sgd::SGD;

use std::fmt;
use std::str::FromStr;

use crate::config::Hyperparams;
use crate::error::{NetworkError, Result};
use crate::layers::Layer;

/// Identifies one parameter tensor: its layer index and its position in
/// [`Layer::parameters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParamKey {
    pub layer: usize,
    pub param: usize,
}

impl ParamKey {
    pub fn new(layer: usize, param: usize) -> Self {
        Self { layer, param }
    }
}

/// Core trait for neural network optimizers.
///
/// # State Management
///
/// Optimizers with state (momentum, squared-gradient sums, moment estimates)
/// keep it internally per [`ParamKey`], so callers only provide parameters and
/// gradients. State is never cleared implicitly; only [`Optimizer::reset`]
/// drops it.
pub trait Optimizer {
    /// Update one parameter tensor in place.
    ///
    /// # Panics
    ///
    /// Implementations panic if `parameters` and `gradients` have different
    /// lengths, or if the tensor behind `key` changed length since its state
    /// was created.
    fn update(&mut self, key: ParamKey, parameters: &mut [f32], gradients: &[f32]);

    /// Drop all per-parameter state.
    fn reset(&mut self);

    /// Base learning rate.
    fn learning_rate(&self) -> f32;

    fn set_learning_rate(&mut self, lr: f32);

    /// Lowercase optimizer name.
    fn name(&self) -> &'static str;

    /// Copy of this optimizer including all per-parameter state.
    fn box_clone(&self) -> Box<dyn Optimizer>;

    /// Apply one update to every parameter tensor of `layer`.
    ///
    /// # Errors
    ///
    /// `NumericInstability` if any gradient is NaN or infinite; no parameter of
    /// the layer is modified in that case.
    fn update_layer(&mut self, layer_index: usize, layer: &mut dyn Layer) -> Result<()> {
        let mut params = layer.parameters();
        for param in &params {
            if param.gradients.iter().any(|g| !g.is_finite()) {
                return Err(NetworkError::NumericInstability(format!(
                    "non-finite gradient in {} of layer {}",
                    param.name, layer_index
                )));
            }
        }
        for (param_index, param) in params.iter_mut().enumerate() {
            self.update(
                ParamKey::new(layer_index, param_index),
                param.values,
                param.gradients,
            );
        }
        Ok(())
    }
}

/// Closed set of optimizer variants, resolved from a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerKind {
    Sgd,
    Adagrad,
    Adam,
}

impl OptimizerKind {
    pub fn name(&self) -> &'static str {
        match self {
            OptimizerKind::Sgd => "sgd",
            OptimizerKind::Adagrad => "adagrad",
            OptimizerKind::Adam => "adam",
        }
    }

    /// Instantiate the optimizer with its recognized hyperparameters.
    pub fn build(&self, hp: &Hyperparams) -> Box<dyn Optimizer> {
        match self {
            OptimizerKind::Sgd => Box::new(SGD::with_momentum(hp.learning_rate, hp.momentum)),
            OptimizerKind::Adagrad => Box::new(Adagrad::new(hp.learning_rate, hp.epsilon)),
            OptimizerKind::Adam => {
                Box::new(Adam::new(hp.learning_rate, hp.beta1, hp.beta2, hp.epsilon))
            }
        }
    }
}

impl fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OptimizerKind {
    type Err = NetworkError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sgd" => Ok(OptimizerKind::Sgd),
            "adagrad" => Ok(OptimizerKind::Adagrad),
            "adam" => Ok(OptimizerKind::Adam),
            other => Err(NetworkError::config(format!(
                "Unsupported optimizer '{}'. Must be one of: sgd, adagrad, adam",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::DenseLayer;
    use crate::utils::SimpleRng;

    #[test]
    fn test_kind_from_str() {
        assert_eq!("AdaGrad".parse::<OptimizerKind>().unwrap(), OptimizerKind::Adagrad);
        assert_eq!("sgd".parse::<OptimizerKind>().unwrap(), OptimizerKind::Sgd);
        assert!(matches!(
            "rmsprop".parse::<OptimizerKind>(),
            Err(NetworkError::Configuration(_))
        ));
    }

    #[test]
    fn test_build_uses_hyperparams() {
        let hp = Hyperparams {
            learning_rate: 0.123,
            ..Hyperparams::default()
        };
        for kind in [OptimizerKind::Sgd, OptimizerKind::Adagrad, OptimizerKind::Adam] {
            let opt = kind.build(&hp);
            assert_eq!(opt.learning_rate(), 0.123);
            assert_eq!(opt.name(), kind.name());
        }
    }

    #[test]
    fn test_update_layer_rejects_nan_gradient_without_touching_params() {
        let mut rng = SimpleRng::new(5);
        let mut layer = DenseLayer::new(1, 1, &mut rng);
        layer.set_weights(&[0.5]).unwrap();
        layer.forward(&[f32::NAN], 1, true).unwrap();
        layer.backward(&[1.0]).unwrap();

        let mut opt = OptimizerKind::Adagrad.build(&Hyperparams::default());
        let err = opt.update_layer(0, &mut layer).unwrap_err();
        assert!(matches!(err, NetworkError::NumericInstability(_)));
        assert_eq!(layer.weights(), &[0.5]);
    }
}
