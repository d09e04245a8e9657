use std::time::Instant;

use tracing::debug;

use crate::data::batcher::{DatasetBatcher, DatasetLoader, Split};
use crate::error::{Error, Result};
use crate::math::functions::argmax_rows;
use crate::math::matrix::Matrix;
use crate::metrics::confusion::ConfusionMatrix;
use crate::network::history::store_metrics;
use crate::network::model::Model;
use crate::train::epoch_stats::EpochStats;
use crate::train::observer::{NoopObserver, Phase, TrainObserver};
use crate::train::train_config::TrainConfig;

// ---------------------------------------------------------------------------
// Public entry points
// ---------------------------------------------------------------------------

impl Model {
    /// One SGD step on a minibatch.
    ///
    /// Runs the forward pass, counts the argmax predictions into `confusion`,
    /// then back-propagates the loss gradient through the layers in reverse,
    /// updating each one. Returns the batch loss.
    pub fn train_step(
        &mut self,
        data: &Matrix,
        labels: &[usize],
        learning_rate: f64,
        confusion: &mut ConfusionMatrix,
    ) -> Result<f64> {
        let logits = self.forward(data)?;
        confusion.add(&argmax_rows(&logits), labels)?;

        let (layers, loss) = self.parts_mut();
        let value = loss.forward(&logits, labels)?;
        let mut grad = loss.backward()?;
        for layer in layers.iter_mut().rev() {
            grad = layer.update(&grad, learning_rate)?;
        }
        Ok(value)
    }

    /// Trains for `config.epochs` epochs on the loader's train split,
    /// validating on its test split whenever that split has batches.
    pub fn train(&mut self, loader: &dyn DatasetLoader, config: &TrainConfig) -> Result<()> {
        self.train_with(loader, config, &mut NoopObserver)
    }

    /// [`Model::train`] reporting progress to `observer`.
    ///
    /// Every epoch refreshes the classes from the loader and appends one
    /// value per tracked metric to the train history, and to the validation
    /// history when validation ran. `total_epochs` grows by the number of
    /// completed epochs once the run ends.
    ///
    /// # Early termination
    /// The loop stops after the current epoch if `config.stop_flag` is set or
    /// the observer's `on_epoch_end` returns `false`.
    pub fn train_with(
        &mut self,
        loader: &dyn DatasetLoader,
        config: &TrainConfig,
        observer: &mut dyn TrainObserver,
    ) -> Result<()> {
        config.validate()?;

        let mut completed = 0;
        for epoch in 1..=config.epochs {
            if config.stop_requested() {
                break;
            }
            let t_start = Instant::now();

            // ── One full pass over the training split ─────────────────────
            self.set_classes(loader.classes().to_vec());
            let mut confusion = ConfusionMatrix::new(self.classes().len())?;
            let batcher = loader.batcher(Split::Train, config.batch_size)?;
            let batches = batcher.len();
            let mut total_loss = 0.0;
            for (index, batch) in batcher.iter().enumerate() {
                let batch = batch?;
                let loss = self.train_step(&batch.data, &batch.labels, config.learning_rate, &mut confusion)?;
                observer.on_batch_end(Phase::Train, index, batches, loss);
                total_loss += loss;
            }
            let train_loss = mean(total_loss, batches);
            store_metrics(self.metrics_mut().0, &confusion, train_loss)?;
            let train_accuracy = confusion.accuracy();

            // ── Validation ────────────────────────────────────────────────
            let validation = loader.batcher(Split::Test, config.batch_size)?;
            let (val_loss, val_accuracy) = if validation.is_empty() {
                (None, None)
            } else {
                let (loss, confusion) = self.test_with(validation.as_ref(), observer)?;
                store_metrics(self.metrics_mut().1, &confusion, loss)?;
                (Some(loss), Some(confusion.accuracy()))
            };

            completed = epoch;
            let stats = EpochStats {
                epoch,
                epochs: config.epochs,
                train_loss,
                val_loss,
                train_accuracy,
                val_accuracy,
                elapsed_ms: t_start.elapsed().as_millis() as u64,
            };
            debug!(
                epoch,
                epochs = config.epochs,
                train_loss,
                ?val_loss,
                train_accuracy,
                ?val_accuracy,
                elapsed_ms = stats.elapsed_ms,
                "epoch finished"
            );

            if !observer.on_epoch_end(&stats) {
                break;
            }
        }

        self.add_epochs(completed);
        Ok(())
    }

    /// Evaluates the model on every batch of `batcher` and returns the mean
    /// batch loss with the confusion matrix of the predictions.
    ///
    /// Evaluation mode is forced on for the duration of the call and the
    /// previous mode restored afterwards, also when a batch fails.
    pub fn test(&mut self, batcher: &dyn DatasetBatcher) -> Result<(f64, ConfusionMatrix)> {
        self.test_with(batcher, &mut NoopObserver)
    }

    pub fn test_with(
        &mut self,
        batcher: &dyn DatasetBatcher,
        observer: &mut dyn TrainObserver,
    ) -> Result<(f64, ConfusionMatrix)> {
        if self.classes().is_empty() {
            return Err(Error::MissingClasses);
        }
        let previous = self.eval();
        self.set_eval(true);
        let result = self.evaluate_batches(batcher, observer);
        self.set_eval(previous);
        result
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

impl Model {
    fn evaluate_batches(
        &mut self,
        batcher: &dyn DatasetBatcher,
        observer: &mut dyn TrainObserver,
    ) -> Result<(f64, ConfusionMatrix)> {
        let mut confusion = ConfusionMatrix::new(self.classes().len())?;
        let batches = batcher.len();
        let mut total_loss = 0.0;
        for (index, batch) in batcher.iter().enumerate() {
            let batch = batch?;
            let logits = self.forward(&batch.data)?;
            confusion.add(&argmax_rows(&logits), &batch.labels)?;
            let loss = self.parts_mut().1.forward(&logits, &batch.labels)?;
            observer.on_batch_end(Phase::Validation, index, batches, loss);
            total_loss += loss;
        }
        Ok((mean(total_loss, batches), confusion))
    }
}

/// `total / count`, or 0 for an empty split.
fn mean(total: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}
