pub mod history;
pub mod model;

pub use history::{History, MetricHistory};
pub use model::Model;
