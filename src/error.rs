//! Error type shared by every module of the crate.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // ── Configuration ────────────────────────────────────────────────────
    /// Reduction name other than `"mean"` or `"sum"`.
    #[error("invalid reduction \"{0}\", expected \"mean\" or \"sum\"")]
    InvalidReduction(String),

    #[error("unknown activation function \"{0}\"")]
    InvalidActivation(String),

    #[error("the batch size must be greater than or equal 1, got {0}")]
    InvalidBatchSize(usize),

    #[error("the train test split must be in [0, 1], got {0}")]
    InvalidTrainTestSplit(f64),

    #[error("the learning rate must be greater than 0, got {0}")]
    InvalidLearningRate(f64),

    #[error("layers vector cannot be empty")]
    EmptyLayers,

    #[error("{0} is not a valid metric")]
    InvalidMetric(String),

    #[error("the number of classes must be at least 1, got {0}")]
    InvalidNumberOfClasses(usize),

    // ── Call ordering ────────────────────────────────────────────────────
    #[error("backward was called before forward")]
    BackwardBeforeForward,

    #[error("backward cannot be called while the layer is in evaluation mode")]
    BackwardCalledInEvalMode,

    #[error("backward was called with no cached input, run forward first")]
    BackwardCalledWithNoInput,

    // ── Shape and data ───────────────────────────────────────────────────
    #[error("invalid shape: expected {expected}, got {got}")]
    InvalidShape { expected: String, got: String },

    #[error("matrix must have at least one row")]
    EmptyMatrix,

    #[error("label index {label} is out of range for {num_classes} classes")]
    InvalidLabelIndex { label: usize, num_classes: usize },

    #[error("predictions ({predictions}) and actual labels ({actual}) differ in length")]
    InvalidDataset { predictions: usize, actual: usize },

    #[error("the number of classes ({classes}) does not match the number of elements for \"{metric}\" ({history})")]
    ClassHistoryMismatch {
        classes: usize,
        history: usize,
        metric: String,
    },

    #[error("model is missing the classes")]
    MissingClasses,

    #[error("invalid range [{min}, {max}], the minimum must be below the maximum")]
    InvalidRange { min: f64, max: f64 },

    #[error("data must have 1 row after preprocessing, got {0}")]
    InvalidDataShapeAfterPreprocessing(usize),

    #[error("no matching files were found at {root} with the extensions [{formats}]")]
    NoFilesFound { root: PathBuf, formats: String },

    #[error("{path} is not a readable image file: {source}")]
    InvalidImageFile {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("batch {index} is out of range for {batches} batches")]
    BatchOutOfRange { index: usize, batches: usize },

    #[error("{0} does not belong to any class directory")]
    UnknownClass(PathBuf),

    // ── Serialization ────────────────────────────────────────────────────
    #[error("invalid \"class\" attribute, expected \"{expected}\", got \"{got}\"")]
    InvalidClassAttributeValue { expected: String, got: String },

    #[error("file format \"{0}\" is not supported, only .json is supported")]
    InvalidExtension(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn shape(expected: (usize, usize), got: (usize, usize)) -> Error {
        Error::InvalidShape {
            expected: format!("{}x{}", expected.0, expected.1),
            got: format!("{}x{}", got.0, got.1),
        }
    }
}
