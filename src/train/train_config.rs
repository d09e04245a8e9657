use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};

/// Hyperparameters of one `Model::train` run.
///
/// # Fields
/// - `epochs`: full passes over the training split
/// - `batch_size`: samples per minibatch; `1` is online SGD
/// - `learning_rate`: SGD step size, must be positive
/// - `stop_flag`: optional flag; when another thread sets it the run
///   ends after the current epoch.
#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub stop_flag: Option<Arc<AtomicBool>>,
}

impl TrainConfig {
    /// Creates a `TrainConfig` with no stop flag.
    pub fn new(epochs: usize, batch_size: usize, learning_rate: f64) -> Self {
        TrainConfig {
            epochs,
            batch_size,
            learning_rate,
            stop_flag: None,
        }
    }

    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop_flag = Some(flag);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size < 1 {
            return Err(Error::InvalidBatchSize(self.batch_size));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(Error::InvalidLearningRate(self.learning_rate));
        }
        Ok(())
    }

    pub(crate) fn stop_requested(&self) -> bool {
        self.stop_flag
            .as_ref()
            .map_or(false, |flag| flag.load(Ordering::Relaxed))
    }
}
