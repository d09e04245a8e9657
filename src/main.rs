//! Command-line front end: builds or loads a model, trains it on an image
//! folder, saves it and reports test metrics, all driven by a JSON config.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use dense_nn::data::image_folder::open_grayscale;
use dense_nn::data::preprocess;
use dense_nn::network::history::{format_metrics, metric_types_to_history, store_metrics};
use dense_nn::{
    ActivationFunction, CrossEntropyLoss, DatasetLoader, EpochStats, ImageFolderLoader, Linear, Model, Result,
    RunConfig, Split, TrainObserver,
};

#[derive(Parser)]
#[command(name = "dense-nn")]
#[command(about = "Feed-forward neural network for classifying images", long_about = None)]
struct Cli {
    /// Path to the JSON config file
    #[arg(default_value = "config.json")]
    config: PathBuf,

    /// Skip training and testing
    #[arg(short, long)]
    prediction_mode: bool,

    /// Where to write the model after training (.json)
    #[arg(short, long)]
    save: Option<PathBuf>,

    /// Images to classify with the final model
    #[arg(long, num_args = 1..)]
    predict: Vec<PathBuf>,

    /// Verbosity level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

/// Logs one line per finished epoch.
struct ProgressLog;

impl TrainObserver for ProgressLog {
    fn on_epoch_end(&mut self, stats: &EpochStats) -> bool {
        match stats.val_loss {
            Some(val_loss) => info!(
                "Epoch {}/{}: train loss {:.6}, validation loss {:.6} ({} ms)",
                stats.epoch, stats.epochs, stats.train_loss, val_loss, stats.elapsed_ms
            ),
            None => info!(
                "Epoch {}/{}: train loss {:.6} ({} ms)",
                stats.epoch, stats.epochs, stats.train_loss, stats.elapsed_ms
            ),
        }
        true
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install the log subscriber: {e}");
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = RunConfig::load(&cli.config)?;
    let mut model = build_model(&config)?;

    if !cli.prediction_mode {
        if train_model(&mut model, &config)? {
            if let Some(path) = &cli.save {
                save_model(&model, path)?;
            }
        }
        test_model(&mut model, &config)?;
    }

    for path in &cli.predict {
        let sample = preprocess::apply(&preprocess::STANDARD, open_grayscale(path)?)?;
        model.set_eval(true);
        let prediction = model.predict(&sample)?;
        println!("{}: {}", path.display(), prediction.join(", "));
    }
    Ok(())
}

/// Loads `model_path`, or builds an untrained 784-250-250-10 network.
fn build_model(config: &RunConfig) -> Result<Model> {
    if let Some(path) = &config.model_path {
        return Model::load(path);
    }

    warn!("No model_path was provided. Starting from an untrained model.");
    let layers = vec![
        Linear::new(784, 250, ActivationFunction::ReLU)?,
        Linear::new(250, 250, ActivationFunction::ReLU)?,
        Linear::new(250, 10, ActivationFunction::Identity)?,
    ];
    let mut model = Model::new(layers, CrossEntropyLoss::default())?;
    model.set_train_metric_types(&config.train_metrics)?;
    model.set_validation_metric_types(&config.validation_metrics)?;
    Ok(model)
}

/// Returns whether any training happened.
fn train_model(model: &mut Model, config: &RunConfig) -> Result<bool> {
    if config.epochs == 0 {
        warn!("No value for epochs was provided or it was 0. Skipping training.");
        return Ok(false);
    }
    let Some(train_path) = &config.train_path else {
        warn!("No value for train_path was provided. Skipping training.");
        return Ok(false);
    };

    let loader = ImageFolderLoader::new(
        train_path,
        &config.file_formats,
        config.train_validation_split,
        true,
        config.seed,
    )?;
    model.train_with(&loader, &config.train_config(), &mut ProgressLog)?;

    info!("Training metrics after {} epochs:\n{}", model.total_epochs(), model.format_train_metrics()?);
    if model.validation_metrics().values().any(|history| !history.is_empty()) {
        info!("Validation metrics:\n{}", model.format_validation_metrics()?);
    }
    Ok(true)
}

fn save_model(model: &Model, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    model.save(path)?;
    info!("Model saved at {}.", path.display());
    Ok(())
}

fn test_model(model: &mut Model, config: &RunConfig) -> Result<()> {
    let Some(test_path) = &config.test_path else {
        warn!("No value for test_path was provided. Skipping testing.");
        return Ok(());
    };
    if config.test_metrics.is_empty() {
        warn!("No metrics were provided in test_metrics. Skipping testing.");
        return Ok(());
    }

    let loader = ImageFolderLoader::new(test_path, &config.file_formats, 0.0, true, config.seed)?;
    if model.classes().is_empty() {
        model.set_classes(loader.classes().to_vec());
    }
    let batcher = loader.batcher(Split::Test, config.batch_size)?;
    let (loss, confusion) = model.test(batcher.as_ref())?;

    let mut history = metric_types_to_history(&config.test_metrics)?;
    store_metrics(&mut history, &confusion, loss)?;
    println!("{}", format_metrics(&history, loader.classes())?);
    Ok(())
}
