pub mod epoch_stats;
pub mod loop_fn;
pub mod observer;
pub mod train_config;

pub use epoch_stats::EpochStats;
pub use observer::{NoopObserver, Phase, TrainObserver};
pub use train_config::TrainConfig;
