//! Layer abstractions for neural networks
//!
//! This module provides the Layer trait and the building blocks of a network
//! stage: the affine [`DenseLayer`], the [`BatchNormLayer`], and the
//! [`HiddenLayer`] that composes them with an activation.

mod r#trait;
pub mod batchnorm;
pub mod dense;
pub mod hidden;

pub use batchnorm::BatchNormLayer;
pub use dense::DenseLayer;
pub use hidden::HiddenLayer;
pub use r#trait::{Layer, Parameter};
