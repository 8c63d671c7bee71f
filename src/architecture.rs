//! Architecture configuration structures
//!
//! This module describes a network as an ordered list of layer specifications,
//! loadable from JSON, validates the chain, and builds the layers.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{NetworkError, Result};
use crate::layers::batchnorm::{DEFAULT_EPSILON, DEFAULT_MOMENTUM};
use crate::layers::HiddenLayer;
use crate::utils::rng::SimpleRng;
use crate::utils::Activation;

fn default_activation() -> String {
    Activation::default().name().to_string()
}

/// Configuration for a single network stage.
///
/// # Example
///
/// ```json
/// { "n_in": 48, "n_out": 48, "batch_norm": true }
/// ```
///
/// ```json
/// { "n_in": 24, "n_out": 10, "activation": "softmax" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LayerSpec {
    pub n_in: usize,
    pub n_out: usize,

    /// "identity" (default), "sigmoid", "softplus" or "softmax"
    #[serde(default = "default_activation")]
    pub activation: String,

    #[serde(default)]
    pub batch_norm: bool,

    /// Batch-norm epsilon (default: 1e-5)
    #[serde(default)]
    pub bn_epsilon: Option<f32>,

    /// Batch-norm running-statistics momentum (default: 0.9)
    #[serde(default)]
    pub bn_momentum: Option<f32>,
}

impl LayerSpec {
    pub fn new(n_in: usize, n_out: usize, activation: &str) -> Self {
        Self {
            n_in,
            n_out,
            activation: activation.to_string(),
            batch_norm: false,
            bn_epsilon: None,
            bn_momentum: None,
        }
    }

    /// Enable batch normalization with default settings.
    pub fn with_batch_norm(mut self) -> Self {
        self.batch_norm = true;
        self
    }

    pub fn activation_kind(&self) -> Result<Activation> {
        self.activation.parse()
    }

    /// Build the layer this spec describes.
    ///
    /// # Errors
    ///
    /// `Configuration` for an unknown activation, a zero width, or invalid
    /// batch-norm settings.
    pub fn build(&self, rng: &mut SimpleRng) -> Result<HiddenLayer> {
        let activation = self.activation_kind()?;
        let layer = HiddenLayer::new(self.n_in, self.n_out, activation, self.batch_norm, rng)?;
        if self.batch_norm {
            layer.with_norm_settings(
                self.bn_epsilon.unwrap_or(DEFAULT_EPSILON),
                self.bn_momentum.unwrap_or(DEFAULT_MOMENTUM),
            )
        } else {
            Ok(layer)
        }
    }
}

/// Configuration for the entire network: stages in forward order.
///
/// # Example
///
/// ```json
/// {
///   "layers": [
///     { "n_in": 2, "n_out": 16, "activation": "softplus" },
///     { "n_in": 16, "n_out": 16, "batch_norm": true },
///     { "n_in": 16, "n_out": 3, "activation": "softmax" }
///   ]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchitectureConfig {
    pub layers: Vec<LayerSpec>,
}

impl ArchitectureConfig {
    pub fn new(layers: Vec<LayerSpec>) -> Self {
        Self { layers }
    }

    /// Input width of the first stage.
    pub fn input_size(&self) -> Option<usize> {
        self.layers.first().map(|l| l.n_in)
    }

    /// Output width of the last stage.
    pub fn output_size(&self) -> Option<usize> {
        self.layers.last().map(|l| l.n_out)
    }
}

/// Loads an architecture configuration from a JSON file and validates it.
///
/// # Examples
///
/// ```no_run
/// use scratch_mlp::architecture::load_architecture;
///
/// let arch = load_architecture("config/architecture.json").unwrap();
/// assert!(!arch.layers.is_empty());
/// ```
pub fn load_architecture(path: impl AsRef<Path>) -> Result<ArchitectureConfig> {
    let contents = fs::read_to_string(path)?;
    let config: ArchitectureConfig = serde_json::from_str(&contents)?;
    validate_architecture(&config.layers)?;
    Ok(config)
}

/// Validates a layer chain.
///
/// Checks that:
/// - there is at least one layer
/// - every width is non-zero and every activation name is known
/// - batch-norm settings are in range
/// - the output width of layer i matches the input width of layer i+1
pub fn validate_architecture(layers: &[LayerSpec]) -> Result<()> {
    if layers.is_empty() {
        return Err(NetworkError::config("Architecture must have at least one layer"));
    }

    for (i, layer) in layers.iter().enumerate() {
        validate_layer(layer, i)?;
    }

    for (i, pair) in layers.windows(2).enumerate() {
        if pair[0].n_out != pair[1].n_in {
            return Err(NetworkError::config(format!(
                "Layer connection mismatch: Layer {} output size ({}) does not match Layer {} input size ({})",
                i,
                pair[0].n_out,
                i + 1,
                pair[1].n_in
            )));
        }
    }

    Ok(())
}

fn validate_layer(layer: &LayerSpec, index: usize) -> Result<()> {
    if layer.n_in == 0 {
        return Err(NetworkError::config(format!(
            "Layer {}: n_in must be greater than 0",
            index
        )));
    }
    if layer.n_out == 0 {
        return Err(NetworkError::config(format!(
            "Layer {}: n_out must be greater than 0",
            index
        )));
    }
    if let Err(NetworkError::Configuration(msg)) = layer.activation_kind() {
        return Err(NetworkError::config(format!("Layer {}: {}", index, msg)));
    }

    if let Some(epsilon) = layer.bn_epsilon {
        if epsilon <= 0.0 {
            return Err(NetworkError::config(format!(
                "Layer {}: bn_epsilon must be positive",
                index
            )));
        }
    }
    if let Some(momentum) = layer.bn_momentum {
        if !(0.0..=1.0).contains(&momentum) {
            return Err(NetworkError::config(format!(
                "Layer {}: bn_momentum must be in range [0.0, 1.0]",
                index
            )));
        }
    }
    Ok(())
}

/// Validates the chain and builds its layers in order.
///
/// All weights are drawn from `rng`, so the same seed always produces the
/// same initial network.
pub fn build_layers(layers: &[LayerSpec], rng: &mut SimpleRng) -> Result<Vec<HiddenLayer>> {
    validate_architecture(layers)?;
    layers.iter().map(|spec| spec.build(rng)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::Layer;

    fn chain() -> Vec<LayerSpec> {
        vec![
            LayerSpec::new(4, 8, "softplus"),
            LayerSpec::new(8, 8, "identity").with_batch_norm(),
            LayerSpec::new(8, 3, "softmax"),
        ]
    }

    #[test]
    fn test_validate_valid_chain() {
        assert!(validate_architecture(&chain()).is_ok());
    }

    #[test]
    fn test_validate_empty_architecture() {
        assert!(matches!(
            validate_architecture(&[]),
            Err(NetworkError::Configuration(_))
        ));
    }

    #[test]
    fn test_validate_layer_connection_mismatch() {
        let mut layers = chain();
        layers[1].n_in = 7;
        let err = validate_architecture(&layers).unwrap_err();
        assert!(matches!(err, NetworkError::Configuration(ref m) if m.contains("mismatch")));
    }

    #[test]
    fn test_validate_unknown_activation() {
        let mut layers = chain();
        layers[0].activation = "relu".into();
        let err = validate_architecture(&layers).unwrap_err();
        assert!(matches!(err, NetworkError::Configuration(ref m) if m.contains("Layer 0")));
    }

    #[test]
    fn test_validate_bn_momentum_range() {
        let mut layers = chain();
        layers[1].bn_momentum = Some(1.5);
        assert!(validate_architecture(&layers).is_err());
    }

    #[test]
    fn test_build_layers() {
        let mut rng = SimpleRng::new(42);
        let layers = build_layers(&chain(), &mut rng).unwrap();

        assert_eq!(layers.len(), 3);
        assert_eq!(layers[0].input_size(), 4);
        assert_eq!(layers[2].output_size(), 3);
        assert!(layers[1].has_batch_norm());
        assert_eq!(layers[2].activation(), Activation::Softmax);
    }

    #[test]
    fn test_build_applies_norm_settings() {
        let mut spec = LayerSpec::new(2, 2, "sigmoid").with_batch_norm();
        spec.bn_epsilon = Some(1e-3);
        spec.bn_momentum = Some(0.5);
        let layer = spec.build(&mut SimpleRng::new(1)).unwrap();
        let bn = layer.batch_norm().unwrap();
        assert_eq!(bn.epsilon(), 1e-3);
        assert_eq!(bn.momentum(), 0.5);
    }

    #[test]
    fn test_load_architecture() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let json_content = r#"{
  "layers": [
    { "n_in": 128, "n_out": 48, "activation": "softplus" },
    { "n_in": 48, "n_out": 48, "batch_norm": true },
    { "n_in": 48, "n_out": 10, "activation": "softmax" }
  ]
}"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(json_content.as_bytes()).unwrap();

        let config = load_architecture(temp_file.path()).unwrap();
        assert_eq!(config.layers.len(), 3);
        assert_eq!(config.layers[1].activation, "identity");
        assert!(config.layers[1].batch_norm);
        assert_eq!(config.input_size(), Some(128));
        assert_eq!(config.output_size(), Some(10));
    }
}
