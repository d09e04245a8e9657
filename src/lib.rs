pub mod error;
pub mod math;
pub mod activation;
pub mod layers;
pub mod loss;
pub mod metrics;
pub mod network;
pub mod train;
pub mod data;
pub mod config;

// Convenience re-exports
pub use error::{Error, Result};
pub use math::matrix::Matrix;
pub use activation::activation::ActivationFunction;
pub use layers::linear::Linear;
pub use loss::cross_entropy::CrossEntropyLoss;
pub use loss::reduction::Reduction;
pub use metrics::confusion::ConfusionMatrix;
pub use metrics::metric::Metric;
pub use network::model::Model;
pub use train::{EpochStats, TrainConfig, TrainObserver};
pub use data::{DatasetBatcher, DatasetLoader, ImageFolderLoader, InMemoryLoader, Split};
pub use config::RunConfig;
