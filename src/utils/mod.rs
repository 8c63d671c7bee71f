//! Shared utilities for the network engine
//!
//! This module provides the random number generator, activation functions and
//! the cross-entropy loss used by layers and the training loop.

pub mod activations;
pub mod loss;
pub mod rng;

pub use activations::{sigmoid, softmax_rows, softplus, Activation};
pub use rng::SimpleRng;

/// Index of the largest value; ties go to the lowest index.
pub fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}
