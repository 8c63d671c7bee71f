//! Multilayer perceptron: layer orchestration, training loop and evaluation.
//!
//! The network owns its layers in a `Vec` whose order is the forward
//! direction; the backward pass walks the exact reverse. Each mini-batch is
//! one forward (training) → backward → optimizer step cycle, and the
//! optimizer touches a layer's parameters only after that batch's backward
//! pass has finished for every layer.

use std::time::{Duration, Instant};

use tracing::{debug, error, info};

use crate::architecture::{build_layers, validate_architecture, ArchitectureConfig, LayerSpec};
use crate::config::{Hyperparams, TrainingConfig};
use crate::error::{NetworkError, Result};
use crate::layers::{HiddenLayer, Layer};
use crate::optimizers::{Optimizer, OptimizerKind};
use crate::utils::loss::{cross_entropy, cross_entropy_output_grad, softmax_cross_entropy_delta};
use crate::utils::{argmax, SimpleRng};

/// Evaluation runs in chunks of this many samples. Evaluation uses running
/// statistics only, so chunking does not change results.
const EVAL_CHUNK: usize = 1024;

/// Everything `fit` mutates, saved so an aborted run can be undone.
struct Snapshot {
    layers: Vec<HiddenLayer>,
    optimizer: Box<dyn Optimizer>,
    rng: SimpleRng,
    state: TrainingState,
}

/// Lifecycle of a network. `Trained` does not block further `fit` calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingState {
    /// Constructed, never fitted.
    Uninitialized,
    /// Inside a `fit` call.
    Training,
    /// At least one `fit` call completed.
    Trained,
}

/// Feedforward network of [`HiddenLayer`] stages trained with cross-entropy.
///
/// # Example
///
/// ```
/// use scratch_mlp::architecture::LayerSpec;
/// use scratch_mlp::config::Hyperparams;
/// use scratch_mlp::network::Mlp;
///
/// let layers = [
///     LayerSpec::new(2, 8, "softplus"),
///     LayerSpec::new(8, 2, "softmax"),
/// ];
/// let hp = Hyperparams::from_pairs([("learning_rate", 0.1)]).unwrap();
/// let mut nn = Mlp::new(&layers, "adagrad", hp, 42).unwrap();
///
/// let x = vec![vec![0.0, 1.0], vec![1.0, 0.0]];
/// let y = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
/// let losses = nn.fit(&x, &y, 5, 2).unwrap();
/// assert_eq!(losses.len(), 5);
/// ```
pub struct Mlp {
    layers: Vec<HiddenLayer>,
    optimizer: Box<dyn Optimizer>,
    optimizer_kind: OptimizerKind,
    hyperparams: Hyperparams,
    rng: SimpleRng,
    state: TrainingState,
    train_time: Option<Duration>,
    loss_history: Vec<f32>,
    log_every: Option<usize>,
}

impl Mlp {
    /// Builds the network from layer specifications.
    ///
    /// Weights are initialized from `seed`; the same generator then drives
    /// epoch shuffling, so equal seeds give equal training runs.
    ///
    /// # Errors
    ///
    /// `Configuration` for a broken layer chain, an unknown activation, an
    /// unknown optimizer, or invalid hyperparameters.
    pub fn new(
        layers: &[LayerSpec],
        optimizer: &str,
        hyperparams: Hyperparams,
        seed: u64,
    ) -> Result<Self> {
        validate_architecture(layers)?;
        let kind: OptimizerKind = optimizer.parse()?;
        hyperparams.validate()?;

        let mut rng = SimpleRng::new(seed);
        let layers = build_layers(layers, &mut rng)?;
        Ok(Self::assemble(layers, kind, hyperparams, rng))
    }

    /// Builds the network from already constructed layers.
    ///
    /// # Errors
    ///
    /// `Configuration` when `layers` is empty, adjacent widths disagree, or the
    /// optimizer/hyperparameters are invalid.
    pub fn from_layers(
        layers: Vec<HiddenLayer>,
        optimizer: &str,
        hyperparams: Hyperparams,
        seed: u64,
    ) -> Result<Self> {
        if layers.is_empty() {
            return Err(NetworkError::config("Architecture must have at least one layer"));
        }
        for (i, pair) in layers.windows(2).enumerate() {
            if pair[0].output_size() != pair[1].input_size() {
                return Err(NetworkError::config(format!(
                    "Layer connection mismatch: Layer {} output size ({}) does not match Layer {} input size ({})",
                    i,
                    pair[0].output_size(),
                    i + 1,
                    pair[1].input_size()
                )));
            }
        }
        let kind: OptimizerKind = optimizer.parse()?;
        hyperparams.validate()?;
        Ok(Self::assemble(layers, kind, hyperparams, SimpleRng::new(seed)))
    }

    /// Builds the network described by an architecture and a training config.
    pub fn from_config(arch: &ArchitectureConfig, training: &TrainingConfig) -> Result<Self> {
        training.validate()?;
        let mut nn = Self::new(
            &arch.layers,
            &training.optimizer,
            training.hyperparams,
            training.seed,
        )?;
        nn.log_every = training.log_every;
        Ok(nn)
    }

    fn assemble(
        layers: Vec<HiddenLayer>,
        kind: OptimizerKind,
        hyperparams: Hyperparams,
        rng: SimpleRng,
    ) -> Self {
        for (i, layer) in layers.iter().enumerate() {
            debug!(
                layer = i,
                n_in = layer.input_size(),
                n_out = layer.output_size(),
                activation = %layer.activation(),
                batch_norm = layer.has_batch_norm(),
                "layer built"
            );
        }
        Self {
            layers,
            optimizer: kind.build(&hyperparams),
            optimizer_kind: kind,
            hyperparams,
            rng,
            state: TrainingState::Uninitialized,
            train_time: None,
            loss_history: Vec::new(),
            log_every: None,
        }
    }

    /// Log an info line every `epochs` epochs during `fit`.
    pub fn with_log_every(mut self, epochs: usize) -> Self {
        self.log_every = Some(epochs.max(1));
        self
    }

    pub fn layers(&self) -> &[HiddenLayer] {
        &self.layers
    }

    /// Mutable access for loading or inspecting parameters; widths stay fixed.
    pub fn layers_mut(&mut self) -> &mut [HiddenLayer] {
        &mut self.layers
    }

    pub fn input_size(&self) -> usize {
        self.layers.first().map_or(0, |l| l.input_size())
    }

    /// Number of classes.
    pub fn output_size(&self) -> usize {
        self.layers.last().map_or(0, |l| l.output_size())
    }

    pub fn parameter_count(&self) -> usize {
        self.layers.iter().map(|l| l.parameter_count()).sum()
    }

    pub fn optimizer_name(&self) -> &'static str {
        self.optimizer_kind.name()
    }

    pub fn optimizer(&self) -> &dyn Optimizer {
        self.optimizer.as_ref()
    }

    pub fn hyperparams(&self) -> &Hyperparams {
        &self.hyperparams
    }

    pub fn state(&self) -> TrainingState {
        self.state
    }

    /// Wall-clock duration of the last successful `fit` call.
    pub fn train_time(&self) -> Option<Duration> {
        self.train_time
    }

    /// Per-epoch mean losses of the last successful `fit` call.
    pub fn loss_history(&self) -> &[f32] {
        &self.loss_history
    }

    /// Runs a batch through every layer in order.
    ///
    /// `training` selects batch (true) or running (false) normalization
    /// statistics in every layer, and whether layers keep backward caches.
    ///
    /// # Errors
    ///
    /// `ShapeMismatch` if `x` is empty or any sample's width differs from the
    /// first layer's input width.
    pub fn forward(&mut self, x: &[Vec<f32>], training: bool) -> Result<Vec<Vec<f32>>> {
        let input = flatten(x, self.input_size(), "feature")?;
        let output = self.forward_flat(&input, x.len(), training)?;
        Ok(unflatten(&output, self.output_size()))
    }

    /// Backpropagates the cross-entropy loss of the last training forward pass.
    ///
    /// With a softmax output the gradient w.r.t. the output pre-activation is
    /// `prediction - target`; other outputs chain `-target / prediction`
    /// through their activation derivative. Parameter gradients are left in the
    /// layers for [`Mlp::step`].
    pub fn backward(&mut self, predictions: &[Vec<f32>], targets: &[Vec<f32>]) -> Result<()> {
        if predictions.len() != targets.len() {
            return Err(NetworkError::shape(format!(
                "{} predictions but {} targets",
                predictions.len(),
                targets.len()
            )));
        }
        let n_out = self.output_size();
        let predictions = flatten(predictions, n_out, "prediction")?;
        let targets = flatten(targets, n_out, "label")?;
        self.backward_flat(&predictions, &targets)
    }

    /// Applies one optimizer update to every layer.
    ///
    /// # Errors
    ///
    /// `NumericInstability` if any layer holds a non-finite gradient; nothing
    /// is updated in that case.
    pub fn step(&mut self) -> Result<()> {
        for (i, layer) in self.layers.iter_mut().enumerate() {
            for param in layer.parameters() {
                if param.gradients.iter().any(|g| !g.is_finite()) {
                    return Err(NetworkError::NumericInstability(format!(
                        "non-finite gradient in {} of layer {}",
                        param.name, i
                    )));
                }
            }
        }
        for (i, layer) in self.layers.iter_mut().enumerate() {
            self.optimizer.update_layer(i, layer)?;
        }
        Ok(())
    }

    /// Trains on `(x, y)` for `epochs` epochs of shuffled mini-batches.
    ///
    /// Every epoch draws a fresh permutation and walks it in consecutive
    /// batches of `batch_size`; the last batch keeps whatever remains. Returns
    /// the mean batch loss of each epoch in order.
    ///
    /// # Errors
    ///
    /// - `Configuration` if `epochs` or `batch_size` is zero or `x` is empty
    /// - `ShapeMismatch` if sample counts or widths disagree with the network
    /// - `NumericInstability` if a loss or gradient becomes non-finite; the
    ///   call aborts and no loss sequence is returned
    ///
    /// On any error the layers (weights and normalization statistics), the
    /// optimizer state, the shuffling generator and the lifecycle state are
    /// put back to what they were before the call.
    pub fn fit(
        &mut self,
        x: &[Vec<f32>],
        y: &[Vec<f32>],
        epochs: usize,
        batch_size: usize,
    ) -> Result<Vec<f32>> {
        if epochs == 0 {
            return Err(NetworkError::config("epochs must be greater than 0"));
        }
        if batch_size == 0 {
            return Err(NetworkError::config("batch_size must be greater than 0"));
        }
        if x.is_empty() {
            return Err(NetworkError::config("cannot fit on an empty training set"));
        }
        self.check_samples(x, y)?;

        let snapshot = Snapshot {
            layers: self.layers.clone(),
            optimizer: self.optimizer.box_clone(),
            rng: self.rng.clone(),
            state: self.state,
        };
        self.state = TrainingState::Training;
        info!(
            samples = x.len(),
            epochs,
            batch_size,
            optimizer = self.optimizer_kind.name(),
            learning_rate = self.hyperparams.learning_rate,
            "starting training"
        );

        let start = Instant::now();
        match self.run_epochs(x, y, epochs, batch_size) {
            Ok(losses) => {
                let elapsed = start.elapsed();
                info!(
                    elapsed_secs = elapsed.as_secs_f64(),
                    final_loss = losses.last().copied().unwrap_or(f32::NAN),
                    "training finished"
                );
                self.train_time = Some(elapsed);
                self.loss_history = losses.clone();
                self.state = TrainingState::Trained;
                Ok(losses)
            }
            Err(err) => {
                error!(error = %err, "training aborted, restoring parameters");
                self.layers = snapshot.layers;
                self.optimizer = snapshot.optimizer;
                self.rng = snapshot.rng;
                self.state = snapshot.state;
                Err(err)
            }
        }
    }

    fn run_epochs(
        &mut self,
        x: &[Vec<f32>],
        y: &[Vec<f32>],
        epochs: usize,
        batch_size: usize,
    ) -> Result<Vec<f32>> {
        let n_in = self.input_size();
        let n_out = self.output_size();
        let mut losses = Vec::with_capacity(epochs);

        for epoch in 0..epochs {
            let order = self.rng.permutation(x.len());
            let mut loss_sum = 0.0f32;
            let mut batches = 0usize;

            for batch in order.chunks(batch_size) {
                let mut inputs = Vec::with_capacity(batch.len() * n_in);
                let mut targets = Vec::with_capacity(batch.len() * n_out);
                for &idx in batch {
                    inputs.extend_from_slice(&x[idx]);
                    targets.extend_from_slice(&y[idx]);
                }

                let predictions = self.forward_flat(&inputs, batch.len(), true)?;
                let loss = cross_entropy(&predictions, &targets, n_out);
                if !loss.is_finite() {
                    return Err(NetworkError::NumericInstability(format!(
                        "loss became {} at epoch {} batch {}",
                        loss, epoch, batches
                    )));
                }
                self.backward_flat(&predictions, &targets)?;
                self.step()?;

                loss_sum += loss;
                batches += 1;
            }

            let mean_loss = loss_sum / batches as f32;
            if !mean_loss.is_finite() {
                return Err(NetworkError::NumericInstability(format!(
                    "mean loss became {} at epoch {}",
                    mean_loss, epoch
                )));
            }
            losses.push(mean_loss);

            debug!(epoch = epoch + 1, loss = mean_loss, batches, "epoch done");
            let is_last = epoch + 1 == epochs;
            let on_schedule = self.log_every.is_some_and(|n| (epoch + 1) % n == 0);
            if is_last || on_schedule {
                info!(epoch = epoch + 1, epochs, loss = mean_loss, "epoch");
            }
        }

        Ok(losses)
    }

    /// Class probabilities per sample, computed in evaluation mode.
    pub fn predict_proba(&mut self, x: &[Vec<f32>]) -> Result<Vec<Vec<f32>>> {
        let n_in = self.input_size();
        let mut probabilities = Vec::with_capacity(x.len());
        for chunk in x.chunks(EVAL_CHUNK) {
            let input = flatten(chunk, n_in, "feature")?;
            let output = self.forward_flat(&input, chunk.len(), false)?;
            probabilities.extend(unflatten(&output, self.output_size()));
        }
        Ok(probabilities)
    }

    /// Most probable class per sample; ties resolve to the lowest class index.
    pub fn predict(&mut self, x: &[Vec<f32>]) -> Result<Vec<usize>> {
        Ok(self
            .predict_proba(x)?
            .iter()
            .map(|row| argmax(row))
            .collect())
    }

    /// Fraction of samples whose predicted class matches the one-hot label.
    pub fn accuracy_score(&mut self, x: &[Vec<f32>], y: &[Vec<f32>]) -> Result<f32> {
        self.evaluate(x, y).map(|(_, accuracy)| accuracy)
    }

    /// Mean cross-entropy in evaluation mode.
    pub fn loss(&mut self, x: &[Vec<f32>], y: &[Vec<f32>]) -> Result<f32> {
        self.evaluate(x, y).map(|(loss, _)| loss)
    }

    /// Evaluation-mode `(mean cross-entropy, accuracy)` over `(x, y)`.
    ///
    /// # Errors
    ///
    /// `NumericInstability` if the network produces a NaN or infinite
    /// probability for any sample.
    pub fn evaluate(&mut self, x: &[Vec<f32>], y: &[Vec<f32>]) -> Result<(f32, f32)> {
        if x.is_empty() {
            return Err(NetworkError::config("cannot evaluate on an empty set"));
        }
        self.check_samples(x, y)?;

        let n_out = self.output_size();
        let probabilities = self.predict_proba(x)?;
        if let Some(i) = probabilities
            .iter()
            .position(|row| row.iter().any(|p| !p.is_finite()))
        {
            return Err(NetworkError::NumericInstability(format!(
                "non-finite probability for sample {}",
                i
            )));
        }
        let mut loss_sum = 0.0f32;
        let mut correct = 0usize;
        for (p, t) in probabilities.iter().zip(y) {
            loss_sum += cross_entropy(p, t, n_out);
            if argmax(p) == argmax(t) {
                correct += 1;
            }
        }
        let n = x.len() as f32;
        Ok((loss_sum / n, correct as f32 / n))
    }

    fn check_samples(&self, x: &[Vec<f32>], y: &[Vec<f32>]) -> Result<()> {
        if x.len() != y.len() {
            return Err(NetworkError::shape(format!(
                "{} feature rows but {} label rows",
                x.len(),
                y.len()
            )));
        }
        check_width(x, self.input_size(), "feature")?;
        check_width(y, self.output_size(), "label")
    }

    fn forward_flat(&mut self, input: &[f32], batch_size: usize, training: bool) -> Result<Vec<f32>> {
        if batch_size == 0 {
            return Err(NetworkError::shape("forward pass needs at least one sample"));
        }
        let mut activations = input.to_vec();
        for layer in self.layers.iter_mut() {
            activations = layer.forward(&activations, batch_size, training)?;
        }
        Ok(activations)
    }

    fn backward_flat(&mut self, predictions: &[f32], targets: &[f32]) -> Result<()> {
        let Some((last, rest)) = self.layers.split_last_mut() else {
            return Ok(());
        };

        let mut grad = if last.activation().is_softmax() {
            last.backward_from_preactivation(&softmax_cross_entropy_delta(predictions, targets))?
        } else {
            last.backward(&cross_entropy_output_grad(predictions, targets))?
        };
        for layer in rest.iter_mut().rev() {
            grad = layer.backward(&grad)?;
        }
        Ok(())
    }
}

fn check_width(rows: &[Vec<f32>], width: usize, what: &str) -> Result<()> {
    if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
        return Err(NetworkError::shape(format!(
            "{} row {} has width {}, network expects {}",
            what,
            i,
            row.len(),
            width
        )));
    }
    Ok(())
}

fn flatten(rows: &[Vec<f32>], width: usize, what: &str) -> Result<Vec<f32>> {
    check_width(rows, width, what)?;
    Ok(rows.concat())
}

fn unflatten(flat: &[f32], width: usize) -> Vec<Vec<f32>> {
    flat.chunks_exact(width.max(1)).map(<[f32]>::to_vec).collect()
}
