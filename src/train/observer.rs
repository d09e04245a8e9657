use std::sync::mpsc;

use crate::train::epoch_stats::EpochStats;

/// Dataset a batch was drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Train,
    Validation,
}

/// Progress hooks called by the training loop. Both methods default to
/// doing nothing.
pub trait TrainObserver {
    /// Called after every batch with its 0-based index, the batch count and
    /// the batch loss.
    fn on_batch_end(&mut self, _phase: Phase, _batch: usize, _batches: usize, _loss: f64) {}

    /// Called after every epoch. Returning `false` ends the run early.
    fn on_epoch_end(&mut self, _stats: &EpochStats) -> bool {
        true
    }
}

/// Observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl TrainObserver for NoopObserver {}

/// Forwards each epoch's stats over a channel; training stops once the
/// receiver is dropped.
impl TrainObserver for mpsc::Sender<EpochStats> {
    fn on_epoch_end(&mut self, stats: &EpochStats) -> bool {
        self.send(stats.clone()).is_ok()
    }
}
