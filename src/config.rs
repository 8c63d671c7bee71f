//! Configuration structures for training
//!
//! This module provides the optimizer hyperparameters and the training-run
//! configuration, both loadable from JSON files.
//!
//! # Unknown keys
//!
//! Unrecognized hyperparameter or training keys are rejected, never ignored:
//! [`Hyperparams::from_pairs`] returns a `Configuration` error naming the key,
//! and JSON loading fails on the same key through `deny_unknown_fields`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{NetworkError, Result};
use crate::optimizers::OptimizerKind;

/// Hyperparameters shared by the optimizer variants.
///
/// Every optimizer reads `learning_rate`; Adagrad and Adam read `epsilon`;
/// Adam reads `beta1`/`beta2`; SGD reads `momentum`.
///
/// # Example
///
/// ```json
/// { "learning_rate": 0.001, "epsilon": 1e-8 }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Hyperparams {
    /// Step size
    pub learning_rate: f32,
    /// Numerical-stability floor in adaptive denominators
    pub epsilon: f32,
    pub beta1: f32,
    pub beta2: f32,
    /// Classical momentum for SGD (0 disables it)
    pub momentum: f32,
}

impl Default for Hyperparams {
    fn default() -> Self {
        Self {
            learning_rate: 0.01,
            epsilon: 1e-8,
            beta1: 0.9,
            beta2: 0.999,
            momentum: 0.0,
        }
    }
}

impl Hyperparams {
    /// Recognized keys.
    pub const KEYS: [&'static str; 5] = ["learning_rate", "epsilon", "beta1", "beta2", "momentum"];

    /// Builds hyperparameters from a key/value mapping, starting from the defaults.
    ///
    /// ```
    /// use scratch_mlp::config::Hyperparams;
    ///
    /// let hp = Hyperparams::from_pairs([("learning_rate", 0.001)]).unwrap();
    /// assert_eq!(hp.learning_rate, 0.001);
    /// assert!(Hyperparams::from_pairs([("lr", 0.1)]).is_err());
    /// ```
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, f32)>,
    {
        let mut hp = Self::default();
        for (key, value) in pairs {
            match key {
                "learning_rate" => hp.learning_rate = value,
                "epsilon" => hp.epsilon = value,
                "beta1" => hp.beta1 = value,
                "beta2" => hp.beta2 = value,
                "momentum" => hp.momentum = value,
                other => {
                    return Err(NetworkError::config(format!(
                        "unknown hyperparameter '{}'. Must be one of: {}",
                        other,
                        Self::KEYS.join(", ")
                    )))
                }
            }
        }
        hp.validate()?;
        Ok(hp)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(NetworkError::config(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(self.epsilon > 0.0 && self.epsilon.is_finite()) {
            return Err(NetworkError::config(format!(
                "epsilon must be positive, got {}",
                self.epsilon
            )));
        }
        for (name, beta) in [("beta1", self.beta1), ("beta2", self.beta2)] {
            if !(0.0..1.0).contains(&beta) {
                return Err(NetworkError::config(format!(
                    "{} must be in range [0.0, 1.0), got {}",
                    name, beta
                )));
            }
        }
        if !(0.0..1.0).contains(&self.momentum) {
            return Err(NetworkError::config(format!(
                "momentum must be in range [0.0, 1.0), got {}",
                self.momentum
            )));
        }
        Ok(())
    }
}

fn default_optimizer() -> String {
    "adagrad".to_string()
}

fn default_normalize() -> bool {
    true
}

/// Configuration of a training run.
///
/// # Example
///
/// ```json
/// {
///   "optimizer": "adagrad",
///   "hyperparams": { "learning_rate": 0.05 },
///   "epochs": 200,
///   "batch_size": 32,
///   "seed": 7,
///   "normalize": true,
///   "log_every": 20
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrainingConfig {
    /// Optimizer name: "adagrad", "sgd" or "adam"
    #[serde(default = "default_optimizer")]
    pub optimizer: String,

    #[serde(default)]
    pub hyperparams: Hyperparams,

    pub epochs: usize,

    pub batch_size: usize,

    /// Seed for weight initialization and epoch shuffling
    #[serde(default)]
    pub seed: u64,

    /// Standardize features with training-split statistics (default: true)
    #[serde(default = "default_normalize")]
    pub normalize: bool,

    /// Log an info line every N epochs (the last epoch is always logged)
    #[serde(default)]
    pub log_every: Option<usize>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            optimizer: default_optimizer(),
            hyperparams: Hyperparams::default(),
            epochs: 100,
            batch_size: 32,
            seed: 0,
            normalize: default_normalize(),
            log_every: None,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        self.optimizer.parse::<OptimizerKind>()?;
        self.hyperparams.validate()?;
        if self.epochs == 0 {
            return Err(NetworkError::config("epochs must be greater than 0"));
        }
        if self.batch_size == 0 {
            return Err(NetworkError::config("batch_size must be greater than 0"));
        }
        if self.log_every == Some(0) {
            return Err(NetworkError::config("log_every must be greater than 0"));
        }
        Ok(())
    }
}

/// Loads a training configuration from a JSON file and validates it.
///
/// # Examples
///
/// ```no_run
/// use scratch_mlp::config::load_config;
///
/// let cfg = load_config("config/training.json").unwrap();
/// assert_eq!(cfg.optimizer, "adagrad");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<TrainingConfig> {
    let contents = fs::read_to_string(path)?;
    let config: TrainingConfig = serde_json::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}
