use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::metrics::{validate_metrics, ConfusionMatrix, Metric, MetricValue};

/// Per-epoch values of one tracked metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricHistory {
    Single(Vec<f64>),
    PerClass(Vec<Vec<f64>>),
}

/// Tracked metrics, keyed by metric and serialized by its name.
pub type History = BTreeMap<Metric, MetricHistory>;

impl MetricHistory {
    /// Empty history shaped for `metric`.
    pub fn for_metric(metric: Metric) -> MetricHistory {
        if metric.is_single_value() {
            MetricHistory::Single(Vec::new())
        } else {
            MetricHistory::PerClass(Vec::new())
        }
    }

    pub fn len(&self) -> usize {
        match self {
            MetricHistory::Single(values) => values.len(),
            MetricHistory::PerClass(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last(&self) -> Option<MetricValue> {
        match self {
            MetricHistory::Single(values) => values.last().copied().map(MetricValue::Single),
            MetricHistory::PerClass(values) => values.last().cloned().map(MetricValue::PerClass),
        }
    }

    fn matches(&self, metric: Metric) -> bool {
        matches!(self, MetricHistory::Single(_)) == metric.is_single_value()
    }
}

/// Fresh, empty history for every named metric.
pub fn metric_types_to_history<S: AsRef<str>>(names: &[S]) -> Result<History> {
    Ok(validate_metrics(names)?
        .into_iter()
        .map(|metric| (metric, MetricHistory::for_metric(metric)))
        .collect())
}

/// Checks that every entry has the shape its metric calls for.
pub fn validate_history(history: &History) -> Result<()> {
    match history.iter().find(|(metric, entry)| !entry.matches(**metric)) {
        Some((metric, _)) => Err(Error::InvalidMetric(metric.name().to_owned())),
        None => Ok(()),
    }
}

/// Appends this epoch's value to every tracked metric.
pub fn store_metrics(history: &mut History, confusion: &ConfusionMatrix, loss: f64) -> Result<()> {
    for (metric, entry) in history.iter_mut() {
        match (entry, metric.evaluate(confusion, loss)) {
            (MetricHistory::Single(values), MetricValue::Single(value)) => values.push(value),
            (MetricHistory::PerClass(values), MetricValue::PerClass(value)) => values.push(value),
            _ => return Err(Error::InvalidMetric(metric.name().to_owned())),
        }
    }
    Ok(())
}

pub fn history_to_json(history: &History) -> Result<Value> {
    Ok(serde_json::to_value(history)?)
}

/// Rebuilds a history, reading scalars or vectors depending on the metric.
pub fn history_from_json(value: &Value) -> Result<History> {
    let object = match value {
        Value::Object(object) => object,
        Value::Null => return Ok(History::new()),
        other => {
            return Err(Error::Json(serde::de::Error::custom(format!(
                "expected a metrics object, got {other}"
            ))))
        }
    };
    let mut history = History::new();
    for (name, values) in object {
        let metric: Metric = name.parse()?;
        let entry = if metric.is_single_value() {
            MetricHistory::Single(serde_json::from_value(values.clone())?)
        } else {
            MetricHistory::PerClass(serde_json::from_value(values.clone())?)
        };
        history.insert(metric, entry);
    }
    Ok(history)
}

/// Renders the latest value of each metric: one table for the scalar
/// metrics and one row per class for the others.
pub fn format_metrics(history: &History, classes: &[String]) -> Result<String> {
    let mut single = Vec::new();
    let mut per_class = Vec::new();
    for (metric, entry) in history {
        match entry.last() {
            Some(MetricValue::Single(value)) => single.push((*metric, value)),
            Some(MetricValue::PerClass(values)) => {
                if values.len() != classes.len() {
                    return Err(Error::ClassHistoryMismatch {
                        classes: classes.len(),
                        history: values.len(),
                        metric: metric.name().to_owned(),
                    });
                }
                per_class.push((*metric, values));
            }
            None => {}
        }
    }

    let mut out = String::new();
    if !single.is_empty() {
        let headers: Vec<String> = single.iter().map(|(m, _)| title(*m)).collect();
        let widths: Vec<usize> = headers.iter().map(|h| h.len().max(10)).collect();
        for (header, &width) in headers.iter().zip(&widths) {
            out.push_str(&format!("{header:>width$}  "));
        }
        out.push('\n');
        for ((_, value), &width) in single.iter().zip(&widths) {
            out.push_str(&format!("{value:>width$.6}  "));
        }
        out.push('\n');
    }

    if !per_class.is_empty() {
        if !out.is_empty() {
            out.push('\n');
        }
        let class_width = classes.iter().map(String::len).max().unwrap_or(0).max(5);
        let headers: Vec<String> = per_class.iter().map(|(m, _)| title(*m)).collect();
        let widths: Vec<usize> = headers.iter().map(|h| h.len().max(10)).collect();
        out.push_str(&format!("{:<class_width$}  ", "Class"));
        for (header, &width) in headers.iter().zip(&widths) {
            out.push_str(&format!("{header:>width$}  "));
        }
        out.push('\n');
        for (i, class) in classes.iter().enumerate() {
            out.push_str(&format!("{class:<class_width$}  "));
            for ((_, values), &width) in per_class.iter().zip(&widths) {
                out.push_str(&format!("{:>width$.6}  ", values[i]));
            }
            out.push('\n');
        }
    }
    Ok(out)
}

/// "f1_score" -> "F1 score"
fn title(metric: Metric) -> String {
    let name = metric.name().replace('_', " ");
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
