//! Scratch MLP Library
//!
//! A small multilayer perceptron trainer built on flat `f32` buffers: dense
//! layers with optional batch normalization, identity/sigmoid/softplus/softmax
//! activations, softmax cross-entropy, and Adagrad (plus SGD and Adam).
//!
//! # Modules
//!
//! - `layers`: Layer trait and implementations (Dense, BatchNorm, Hidden)
//! - `optimizers`: Optimizer trait and implementations (Adagrad, SGD, Adam)
//! - `network`: the [`Mlp`] training engine
//! - `dataset`: splitting, standardization and synthetic datasets
//! - `utils`: Shared utilities (RNG, activation functions, loss)
//! - `config`: Hyperparameters and training configuration
//! - `architecture`: Layer specifications and network building
//!
//! # Example
//!
//! ```
//! use scratch_mlp::architecture::LayerSpec;
//! use scratch_mlp::config::Hyperparams;
//! use scratch_mlp::Mlp;
//!
//! let layers = [
//!     LayerSpec::new(2, 8, "softplus"),
//!     LayerSpec::new(8, 2, "softmax"),
//! ];
//! let mut mlp = Mlp::new(&layers, "adagrad", Hyperparams::default(), 7).unwrap();
//!
//! let x = vec![vec![0.0, 1.0], vec![1.0, 0.0]];
//! let y = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
//! let losses = mlp.fit(&x, &y, 3, 2).unwrap();
//! assert_eq!(losses.len(), 3);
//! ```

pub mod architecture;
pub mod config;
pub mod dataset;
pub mod error;
pub mod layers;
pub mod network;
pub mod optimizers;
pub mod utils;

pub use error::{NetworkError, Result};
pub use network::{Mlp, TrainingState};
