pub mod cross_entropy;
pub mod reduction;

pub use cross_entropy::{CrossEntropyLoss, Targets};
pub use reduction::Reduction;
