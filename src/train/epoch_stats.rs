use serde::{Deserialize, Serialize};

/// Per-epoch summary handed to [`TrainObserver::on_epoch_end`].
///
/// [`TrainObserver::on_epoch_end`]: crate::train::TrainObserver::on_epoch_end
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochStats {
    /// 1-based epoch number within this run.
    pub epoch: usize,
    /// Epochs requested for this run.
    pub epochs: usize,
    /// Sum of the batch losses divided by the number of batches.
    pub train_loss: f64,
    /// Mean validation loss, if the validation split has any batches.
    pub val_loss: Option<f64>,
    /// Training accuracy as a fraction in [0, 1].
    pub train_accuracy: f64,
    pub val_accuracy: Option<f64>,
    /// Wall-clock duration of this epoch in milliseconds.
    pub elapsed_ms: u64,
}
