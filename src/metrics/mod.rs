pub mod confusion;
pub mod metric;

pub use confusion::ConfusionMatrix;
pub use metric::{validate_metric, validate_metrics, Metric, MetricValue};
