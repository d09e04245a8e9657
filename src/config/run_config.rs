//! Settings for one run of the `dense-nn` binary, read from a JSON file.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::metrics::validate_metrics;
use crate::train::TrainConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Model to start from; a fresh default model is built when absent.
    #[serde(default)]
    pub model_path: Option<PathBuf>,

    /// Image folder to train on. Training is skipped when absent.
    #[serde(default)]
    pub train_path: Option<PathBuf>,

    /// Image folder to test on. Testing is skipped when absent.
    #[serde(default)]
    pub test_path: Option<PathBuf>,

    /// Fraction of `train_path` used for training; the rest validates.
    #[serde(default = "default_train_validation_split")]
    pub train_validation_split: f64,

    #[serde(default = "default_file_formats")]
    pub file_formats: Vec<String>,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    /// 0 skips training.
    #[serde(default)]
    pub epochs: usize,

    #[serde(default)]
    pub train_metrics: Vec<String>,

    #[serde(default)]
    pub validation_metrics: Vec<String>,

    /// Metrics reported after testing. Testing is skipped when empty.
    #[serde(default)]
    pub test_metrics: Vec<String>,

    /// Seed for shuffling the image files; unseeded when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_train_validation_split() -> f64 {
    0.7
}

fn default_file_formats() -> Vec<String> {
    vec![".png".to_string()]
}

fn default_batch_size() -> usize {
    1
}

fn default_learning_rate() -> f64 {
    1e-4
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            train_path: None,
            test_path: None,
            train_validation_split: default_train_validation_split(),
            file_formats: default_file_formats(),
            batch_size: default_batch_size(),
            learning_rate: default_learning_rate(),
            epochs: 0,
            train_metrics: Vec::new(),
            validation_metrics: Vec::new(),
            test_metrics: Vec::new(),
            seed: None,
        }
    }
}

impl RunConfig {
    /// Reads and validates a JSON config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<RunConfig> {
        let reader = BufReader::new(File::open(path)?);
        let config: RunConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.train_validation_split) {
            return Err(Error::InvalidTrainTestSplit(self.train_validation_split));
        }
        self.train_config().validate()?;
        validate_metrics(&self.train_metrics)?;
        validate_metrics(&self.validation_metrics)?;
        validate_metrics(&self.test_metrics)?;
        Ok(())
    }

    pub fn train_config(&self) -> TrainConfig {
        TrainConfig::new(self.epochs, self.batch_size, self.learning_rate)
    }
}
