//! Cross-entropy loss and its gradients.
//!
//! All buffers are row-major `rows × cols` with one row per sample.

/// Predictions are clamped to this floor before taking the logarithm.
pub const PROBABILITY_FLOOR: f32 = 1e-12;

/// Clamps to [`PROBABILITY_FLOOR`] but passes NaN through, so a broken
/// forward pass shows up as a non-finite loss instead of a large finite one.
fn floor_probability(p: f32) -> f32 {
    if p.is_nan() {
        p
    } else {
        p.max(PROBABILITY_FLOOR)
    }
}

/// Mean categorical cross-entropy `-Σ t·ln(p)` over the rows.
///
/// A NaN prediction anywhere in the buffer makes the result NaN.
///
/// # Panics
///
/// Panics if `predictions` and `targets` have different lengths.
pub fn cross_entropy(predictions: &[f32], targets: &[f32], cols: usize) -> f32 {
    assert_eq!(predictions.len(), targets.len(), "prediction/target length mismatch");
    if cols == 0 || predictions.is_empty() {
        return 0.0;
    }
    let rows = predictions.len() / cols;

    let mut total = 0.0f32;
    for (&p, &t) in predictions.iter().zip(targets) {
        if p.is_nan() {
            return f32::NAN;
        }
        if t != 0.0 {
            total -= t * floor_probability(p).ln();
        }
    }
    total / rows as f32
}

/// Gradient of the per-sample cross-entropy w.r.t. the softmax pre-activation.
///
/// Softmax followed by cross-entropy collapses to `prediction - target`.
///
/// # Panics
///
/// Panics if `predictions` and `targets` have different lengths.
pub fn softmax_cross_entropy_delta(predictions: &[f32], targets: &[f32]) -> Vec<f32> {
    assert_eq!(predictions.len(), targets.len(), "prediction/target length mismatch");
    predictions.iter().zip(targets).map(|(p, t)| p - t).collect()
}

/// Gradient of the per-sample cross-entropy w.r.t. the predictions, `-t / p`.
///
/// Used for output layers that are not softmax, where the fused form does not apply.
///
/// # Panics
///
/// Panics if `predictions` and `targets` have different lengths.
pub fn cross_entropy_output_grad(predictions: &[f32], targets: &[f32]) -> Vec<f32> {
    assert_eq!(predictions.len(), targets.len(), "prediction/target length mismatch");
    predictions
        .iter()
        .zip(targets)
        .map(|(&p, &t)| if t == 0.0 { 0.0 } else { -t / floor_probability(p) })
        .collect()
}
