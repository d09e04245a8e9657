use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::layers::linear::check_class_tag;
use crate::loss::reduction::Reduction;
use crate::math::functions::{log_softmax, one_hot_encode, softmax};
use crate::math::matrix::Matrix;

const CLASS_TAG: &str = "CrossEntropyLoss";

/// Targets accepted by [`CrossEntropyLoss::forward`]: a one-hot matrix with
/// the same shape as the logits, or one class index per row.
#[derive(Debug, Clone, Copy)]
pub enum Targets<'a> {
    OneHot(&'a Matrix),
    Labels(&'a [usize]),
}

impl<'a> From<&'a Matrix> for Targets<'a> {
    fn from(matrix: &'a Matrix) -> Self {
        Targets::OneHot(matrix)
    }
}

impl<'a> From<&'a [usize]> for Targets<'a> {
    fn from(labels: &'a [usize]) -> Self {
        Targets::Labels(labels)
    }
}

impl<'a> From<&'a Vec<usize>> for Targets<'a> {
    fn from(labels: &'a Vec<usize>) -> Self {
        Targets::Labels(labels)
    }
}

/// Softmax cross-entropy over raw logits.
///
/// The softmax is folded into the loss, so `backward` returns the gradient
/// with respect to the logits: `(probabilities - targets) / batch_size`.
#[derive(Debug, Clone, Default)]
pub struct CrossEntropyLoss {
    reduction: Reduction,
    probabilities: Option<Matrix>,
    targets: Option<Matrix>,
}

#[derive(Serialize, Deserialize)]
struct CrossEntropyRecord {
    class: String,
    reduction: Reduction,
}

impl CrossEntropyLoss {
    pub fn new(reduction: Reduction) -> CrossEntropyLoss {
        CrossEntropyLoss {
            reduction,
            probabilities: None,
            targets: None,
        }
    }

    /// Builds a loss from a reduction name, `"mean"` or `"sum"`.
    pub fn with_reduction(name: &str) -> Result<CrossEntropyLoss> {
        Ok(CrossEntropyLoss::new(name.parse()?))
    }

    pub fn reduction(&self) -> Reduction {
        self.reduction
    }

    pub fn set_reduction(&mut self, name: &str) -> Result<()> {
        self.reduction = name.parse()?;
        Ok(())
    }

    /// Computes `reduce(-sum_j targets_ij * log_softmax(logits)_ij)` and
    /// caches the probabilities and one-hot targets for `backward`.
    pub fn forward<'a>(&mut self, logits: &Matrix, targets: impl Into<Targets<'a>>) -> Result<f64> {
        let targets = targets.into();
        let target_rows = match targets {
            Targets::OneHot(matrix) => matrix.rows,
            Targets::Labels(labels) => labels.len(),
        };
        if logits.rows == 0 || target_rows == 0 {
            return Err(Error::EmptyMatrix);
        }

        let targets = match targets {
            Targets::OneHot(matrix) => matrix.clone(),
            Targets::Labels(labels) => one_hot_encode(labels, logits.cols)?,
        };
        if targets.shape() != logits.shape() {
            return Err(Error::shape(logits.shape(), targets.shape()));
        }

        let log_probabilities = log_softmax(logits);
        let losses: Vec<f64> = log_probabilities
            .data
            .iter()
            .zip(targets.data.iter())
            .map(|(log_p, t)| -log_p.iter().zip(t).map(|(l, t)| t * l).sum::<f64>())
            .collect();

        self.probabilities = Some(softmax(logits));
        self.targets = Some(targets);
        Ok(self.reduction.reduce(&losses))
    }

    /// Gradient of the last `forward` with respect to its logits.
    pub fn backward(&self) -> Result<Matrix> {
        let (probabilities, targets) = match (&self.probabilities, &self.targets) {
            (Some(p), Some(t)) => (p, t),
            _ => return Err(Error::BackwardBeforeForward),
        };
        let batch_size = self.reduction.batch_size(probabilities.rows);
        Ok((probabilities - targets).map(|x| x / batch_size))
    }

    pub fn to_json(&self) -> Result<Value> {
        let record = CrossEntropyRecord {
            class: CLASS_TAG.to_owned(),
            reduction: self.reduction,
        };
        Ok(serde_json::to_value(record)?)
    }

    pub fn from_json(value: &Value) -> Result<CrossEntropyLoss> {
        check_class_tag(value, CLASS_TAG)?;
        let reduction = value
            .get("reduction")
            .and_then(Value::as_str)
            .unwrap_or_default();
        CrossEntropyLoss::with_reduction(reduction)
    }
}

/// Losses compare by configuration only.
impl PartialEq for CrossEntropyLoss {
    fn eq(&self, other: &Self) -> bool {
        self.reduction == other.reduction
    }
}
