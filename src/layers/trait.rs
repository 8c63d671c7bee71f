//! Layer trait definition for neural network layers
//!
//! This module defines the core Layer trait that every building block of the
//! network implements. The trait provides a common interface for forward
//! propagation, backward propagation, and exposing parameters together with
//! their freshly computed gradients to an optimizer.

use crate::error::Result;

/// A trainable tensor of a layer paired with the gradient from the last backward pass.
///
/// `values` and `gradients` always have the same length.
pub struct Parameter<'a> {
    /// Short name for logging ("weights", "biases", "gamma", "beta").
    pub name: &'static str,
    pub values: &'a mut [f32],
    pub gradients: &'a [f32],
}

/// Core trait for neural network layers.
///
/// Layers work on flat row-major buffers: a batch of `batch_size` samples with
/// `input_size` features each is a slice of length `batch_size × input_size`.
///
/// # Example
///
/// ```ignore
/// // Training step through a single layer
/// let output = layer.forward(&input, batch_size, true)?;
/// let grad_input = layer.backward(&grad_output)?;
/// for param in layer.parameters() {
///     optimizer.update(key, param.values, param.gradients);
/// }
/// ```
pub trait Layer {
    /// Forward propagation through the layer.
    ///
    /// In training mode (`training == true`) the layer caches whatever its
    /// backward pass needs, overwriting the previous cache. Evaluation mode
    /// leaves the cache alone and never touches training-only state.
    ///
    /// # Errors
    ///
    /// `ShapeMismatch` when `input.len() != batch_size × input_size()`.
    fn forward(&mut self, input: &[f32], batch_size: usize, training: bool) -> Result<Vec<f32>>;

    /// Backward propagation through the layer.
    ///
    /// Consumes the cache of the last training forward pass, overwrites the
    /// layer's parameter gradients (never accumulates across batches), and
    /// returns the gradient w.r.t. the layer input.
    ///
    /// # Errors
    ///
    /// `MissingForwardCache` when no training forward pass preceded this call,
    /// `ShapeMismatch` when `grad_output` does not match the cached batch.
    fn backward(&mut self, grad_output: &[f32]) -> Result<Vec<f32>>;

    /// Trainable parameters with their gradients, in a fixed order.
    fn parameters(&mut self) -> Vec<Parameter<'_>>;

    /// Expected number of input features per sample.
    fn input_size(&self) -> usize;

    /// Number of output features per sample.
    fn output_size(&self) -> usize;

    /// Total count of trainable scalars.
    fn parameter_count(&self) -> usize;
}
