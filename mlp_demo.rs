use scratch_mlp::architecture::{load_architecture, ArchitectureConfig};
use scratch_mlp::config::{load_config, TrainingConfig};
use scratch_mlp::dataset::synthetic;
use scratch_mlp::{Mlp, Result};
use std::env;
use std::process;
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

// Three-arm spiral classification trained from JSON configuration.
const ARCHITECTURE_PATH: &str = "config/architecture.json";
const TRAINING_PATH: &str = "config/training.json";
const SAMPLES_PER_CLASS: usize = 200;
const SPIRAL_NOISE: f32 = 0.15;

/// Loads `(architecture, training)` from the first two command-line
/// arguments, falling back to the files under `config/`.
fn load_configs() -> Result<(ArchitectureConfig, TrainingConfig)> {
    let mut args = env::args().skip(1);
    let arch_path = args.next().unwrap_or_else(|| ARCHITECTURE_PATH.to_string());
    let training_path = args.next().unwrap_or_else(|| TRAINING_PATH.to_string());

    info!(path = %arch_path, "loading architecture");
    let arch = load_architecture(&arch_path)?;
    info!(path = %training_path, "loading training config");
    let training = load_config(&training_path)?;
    Ok((arch, training))
}

fn run() -> Result<()> {
    let program_start = Instant::now();
    let (arch, training) = load_configs()?;

    let n_classes = arch.output_size().unwrap_or(0);
    let data = synthetic::spirals(SAMPLES_PER_CLASS, n_classes, SPIRAL_NOISE, training.seed)?
        .with_random_state(training.seed);
    let (x_train, y_train, x_valid, y_valid, x_test, y_test) =
        data.load(training.normalize).into_tuple();
    info!(
        train = x_train.len(),
        valid = x_valid.len(),
        test = x_test.len(),
        classes = n_classes,
        "dataset split"
    );

    let mut nn = Mlp::from_config(&arch, &training)?;
    info!(
        layers = nn.layers().len(),
        parameters = nn.parameter_count(),
        optimizer = nn.optimizer_name(),
        "network built"
    );

    let losses = nn.fit(&x_train, &y_train, training.epochs, training.batch_size)?;

    let (valid_loss, valid_acc) = nn.evaluate(&x_valid, &y_valid)?;
    let (test_loss, test_acc) = nn.evaluate(&x_test, &y_test)?;
    let train_acc = nn.accuracy_score(&x_train, &y_train)?;
    let train_time = nn.train_time().map_or(0.0, |d| d.as_secs_f64());

    println!("\n=== Training Summary ===");
    println!("Final training loss: {:.4}", losses.last().copied().unwrap_or(f32::NAN));
    println!("Train accuracy: {:.2}%", train_acc * 100.0);
    println!("Validation accuracy: {:.2}% (loss {:.4})", valid_acc * 100.0, valid_loss);
    println!("Test accuracy: {:.2}% (loss {:.4})", test_acc * 100.0, test_loss);
    println!("Total training time: {:.2} seconds", train_time);
    println!(
        "Total program time: {:.2} seconds",
        program_start.elapsed().as_secs_f64()
    );
    println!("========================");
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(err) = run() {
        error!(error = %err, "mlp_demo failed");
        process::exit(1);
    }
}
