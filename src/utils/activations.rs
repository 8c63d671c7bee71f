//! Activation functions for neural networks
//!
//! This module provides the activation kinds a layer can be built with:
//! - Identity
//! - Sigmoid
//! - Softplus (overflow-safe form)
//! - Softmax (row-wise, output layer)
//!
//! Each kind is a variant of the closed [`Activation`] enum, resolved from its
//! name once at layer construction.

use std::fmt;
use std::str::FromStr;

use crate::error::NetworkError;

/// Activation applied after the (optionally normalized) affine transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Activation {
    #[default]
    Identity,
    Sigmoid,
    Softplus,
    /// Row-wise softmax; pairs with cross-entropy at the output layer.
    Softmax,
}

impl Activation {
    /// All supported kinds, in declaration order.
    pub const ALL: [Activation; 4] = [
        Activation::Identity,
        Activation::Sigmoid,
        Activation::Softplus,
        Activation::Softmax,
    ];

    /// Canonical lowercase name.
    pub fn name(&self) -> &'static str {
        match self {
            Activation::Identity => "identity",
            Activation::Sigmoid => "sigmoid",
            Activation::Softplus => "softplus",
            Activation::Softmax => "softmax",
        }
    }

    pub fn is_softmax(&self) -> bool {
        matches!(self, Activation::Softmax)
    }

    /// Apply the activation to a row-major `rows × cols` buffer.
    ///
    /// # Arguments
    /// * `z` - Pre-activation values
    /// * `a` - Output buffer, same length as `z`
    /// * `cols` - Row width (only softmax looks at rows)
    ///
    /// # Panics
    ///
    /// Panics if `z` and `a` have different lengths.
    pub fn forward(&self, z: &[f32], a: &mut [f32], cols: usize) {
        assert_eq!(z.len(), a.len(), "activation input/output length mismatch");
        match self {
            Activation::Identity => a.copy_from_slice(z),
            Activation::Sigmoid => {
                for (out, &v) in a.iter_mut().zip(z) {
                    *out = sigmoid(v);
                }
            }
            Activation::Softplus => {
                for (out, &v) in a.iter_mut().zip(z) {
                    *out = softplus(v);
                }
            }
            Activation::Softmax => {
                a.copy_from_slice(z);
                if cols > 0 {
                    softmax_rows(a, z.len() / cols, cols);
                }
            }
        }
    }

    /// Chain an upstream gradient through the activation.
    ///
    /// `z` and `a` are the cached pre-activation and output of the matching
    /// forward call. For softmax this is the full Jacobian-vector product
    /// `a_i * (g_i - Σ_j a_j g_j)` per row; the network skips it at the output
    /// layer in favour of the fused cross-entropy gradient.
    ///
    /// # Panics
    ///
    /// Panics if `grad_output` or `grad_input` differs in length from `z`.
    pub fn backward(
        &self,
        z: &[f32],
        a: &[f32],
        grad_output: &[f32],
        grad_input: &mut [f32],
        cols: usize,
    ) {
        assert_eq!(z.len(), grad_output.len(), "activation gradient length mismatch");
        assert_eq!(grad_input.len(), grad_output.len(), "activation gradient length mismatch");
        match self {
            Activation::Identity => grad_input.copy_from_slice(grad_output),
            Activation::Sigmoid => {
                for ((gi, &g), &out) in grad_input.iter_mut().zip(grad_output).zip(a) {
                    *gi = g * out * (1.0 - out);
                }
            }
            Activation::Softplus => {
                for ((gi, &g), &v) in grad_input.iter_mut().zip(grad_output).zip(z) {
                    *gi = g * sigmoid(v);
                }
            }
            Activation::Softmax => {
                if cols == 0 {
                    return;
                }
                for ((gi_row, g_row), a_row) in grad_input
                    .chunks_exact_mut(cols)
                    .zip(grad_output.chunks_exact(cols))
                    .zip(a.chunks_exact(cols))
                {
                    let dot: f32 = g_row.iter().zip(a_row).map(|(g, p)| g * p).sum();
                    for ((gi, &g), &p) in gi_row.iter_mut().zip(g_row).zip(a_row) {
                        *gi = p * (g - dot);
                    }
                }
            }
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Activation {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "identity" | "linear" => Ok(Activation::Identity),
            "sigmoid" | "logistic" => Ok(Activation::Sigmoid),
            "softplus" => Ok(Activation::Softplus),
            "softmax" => Ok(Activation::Softmax),
            other => Err(NetworkError::config(format!(
                "Invalid activation function '{}'. Must be one of: identity, sigmoid, softplus, softmax",
                other
            ))),
        }
    }
}

/// Logistic sigmoid, evaluated without overflowing `exp` for large |x|.
pub fn sigmoid(x: f32) -> f32 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Sigmoid derivative assuming s = sigmoid(z).
pub fn sigmoid_derivative(s: f32) -> f32 {
    s * (1.0 - s)
}

/// Softplus `ln(1 + e^x)`; uses `x + ln(1 + e^-x)` for positive inputs.
pub fn softplus(x: f32) -> f32 {
    if x > 0.0 {
        x + (-x).exp().ln_1p()
    } else {
        x.exp().ln_1p()
    }
}

/// Softmax activation function applied row-wise.
///
/// Converts logits to probabilities for each row. Uses the max-subtraction
/// trick for numerical stability to avoid overflow with large values.
///
/// # Arguments
/// * `outputs` - Flat array containing row-major matrix data
/// * `rows` - Number of rows in the matrix
/// * `cols` - Number of columns in the matrix
///
/// # Panics
///
/// Panics if `outputs.len() != rows * cols`.
pub fn softmax_rows(outputs: &mut [f32], rows: usize, cols: usize) {
    if cols == 0 {
        return;
    }
    assert_eq!(outputs.len(), rows * cols, "outputs length mismatch in softmax_rows");

    for row in outputs.chunks_exact_mut(cols).take(rows) {
        let max_value = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);

        let mut sum = 0.0f32;
        for value in row.iter_mut() {
            *value = (*value - max_value).exp();
            sum += *value;
        }

        let inv_sum = 1.0f32 / sum;
        for value in row.iter_mut() {
            *value *= inv_sum;
        }
    }
}
