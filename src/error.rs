//! Error types for network construction, training and evaluation.

use thiserror::Error;

/// Errors produced by the network engine and its configuration loaders.
///
/// Configuration problems are reported eagerly (at construction or at the start
/// of a call), shape problems on the first forward pass that sees the bad data,
/// and numeric problems abort the running `fit` call.
#[derive(Error, Debug)]
pub enum NetworkError {
    /// Invalid layer chaining, unknown activation/optimizer name, bad hyperparameter.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Feature or label width disagrees with the network's first/last layer.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// A loss or gradient became NaN or infinite.
    #[error("numeric instability: {0}")]
    NumericInstability(String),

    /// Backward was requested for a layer that has no training-mode forward cache.
    #[error("{0} has no forward cache; run a training forward pass first")]
    MissingForwardCache(String),

    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl NetworkError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        NetworkError::Configuration(msg.into())
    }

    pub(crate) fn shape(msg: impl Into<String>) -> Self {
        NetworkError::ShapeMismatch(msg.into())
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, NetworkError>;
