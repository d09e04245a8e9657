pub mod batcher;
pub mod image_folder;
pub mod preprocess;

pub use batcher::{BatchOptions, DatasetBatcher, DatasetLoader, InMemoryBatcher, InMemoryLoader, Minibatch, Split};
pub use image_folder::ImageFolderLoader;
