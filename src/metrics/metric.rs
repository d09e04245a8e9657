use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::metrics::confusion::ConfusionMatrix;

/// Metrics a model can track per epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Accuracy,
    Precision,
    Recall,
    F1Score,
    Loss,
}

/// One epoch's value of a metric.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Single(f64),
    PerClass(Vec<f64>),
}

impl Metric {
    pub const ALL: [Metric; 5] = [
        Metric::Accuracy,
        Metric::Precision,
        Metric::Recall,
        Metric::F1Score,
        Metric::Loss,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Metric::Accuracy => "accuracy",
            Metric::Precision => "precision",
            Metric::Recall => "recall",
            Metric::F1Score => "f1_score",
            Metric::Loss => "loss",
        }
    }

    /// Accuracy and loss are scalars; the rest hold one value per class.
    pub fn is_single_value(&self) -> bool {
        matches!(self, Metric::Accuracy | Metric::Loss)
    }

    pub fn evaluate(&self, confusion: &ConfusionMatrix, loss: f64) -> MetricValue {
        match self {
            Metric::Accuracy => MetricValue::Single(confusion.accuracy()),
            Metric::Loss => MetricValue::Single(loss),
            Metric::Precision => MetricValue::PerClass(confusion.precision()),
            Metric::Recall => MetricValue::PerClass(confusion.recall()),
            Metric::F1Score => MetricValue::PerClass(confusion.f1_score()),
        }
    }
}

impl FromStr for Metric {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        Metric::ALL
            .into_iter()
            .find(|metric| metric.name() == name)
            .ok_or_else(|| Error::InvalidMetric(name.to_owned()))
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub fn validate_metric(name: &str) -> Result<Metric> {
    name.parse()
}

/// Parses every name, failing on the first unknown one.
pub fn validate_metrics<S: AsRef<str>>(names: &[S]) -> Result<Vec<Metric>> {
    names.iter().map(|name| validate_metric(name.as_ref())).collect()
}
