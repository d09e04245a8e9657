use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde_json::{json, Value};
use tracing::info;

use crate::error::{Error, Result};
use crate::layers::linear::{check_class_tag, Linear};
use crate::loss::cross_entropy::CrossEntropyLoss;
use crate::math::functions::argmax_rows;
use crate::math::matrix::Matrix;
use crate::network::history::{
    format_metrics, history_from_json, history_to_json, metric_types_to_history, validate_history, History,
};

const CLASS_TAG: &str = "Model";

/// A stack of [`Linear`] layers trained against a [`CrossEntropyLoss`].
///
/// Besides the parameters the model carries the class names its outputs map
/// to, the number of epochs it was trained for and the per-epoch metric
/// histories of the training and validation sets.
#[derive(Debug, Clone)]
pub struct Model {
    layers: Vec<Linear>,
    loss: CrossEntropyLoss,
    eval: bool,
    classes: Vec<String>,
    total_epochs: usize,
    train_metrics: History,
    validation_metrics: History,
}

impl Model {
    pub fn new(layers: Vec<Linear>, loss: CrossEntropyLoss) -> Result<Model> {
        if layers.is_empty() {
            return Err(Error::EmptyLayers);
        }
        Ok(Model {
            layers,
            loss,
            eval: false,
            classes: Vec::new(),
            total_epochs: 0,
            train_metrics: History::new(),
            validation_metrics: History::new(),
        })
    }

    pub fn layers(&self) -> &[Linear] {
        &self.layers
    }

    /// Replaces the layers; they take over the model's evaluation mode.
    pub fn set_layers(&mut self, layers: Vec<Linear>) -> Result<()> {
        if layers.is_empty() {
            return Err(Error::EmptyLayers);
        }
        self.layers = layers;
        let eval = self.eval;
        self.layers.iter_mut().for_each(|layer| layer.set_eval(eval));
        Ok(())
    }

    pub fn loss(&self) -> &CrossEntropyLoss {
        &self.loss
    }

    pub fn set_loss(&mut self, loss: CrossEntropyLoss) {
        self.loss = loss;
    }

    pub fn eval(&self) -> bool {
        self.eval
    }

    /// Switches the model and every layer between training and evaluation.
    pub fn set_eval(&mut self, eval: bool) {
        for layer in &mut self.layers {
            layer.set_eval(eval);
        }
        self.eval = eval;
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn set_classes(&mut self, classes: Vec<String>) {
        self.classes = classes;
    }

    pub fn total_epochs(&self) -> usize {
        self.total_epochs
    }

    pub fn set_total_epochs(&mut self, total_epochs: usize) {
        self.total_epochs = total_epochs;
    }

    pub(crate) fn add_epochs(&mut self, epochs: usize) {
        self.total_epochs += epochs;
    }

    pub fn train_metrics(&self) -> &History {
        &self.train_metrics
    }

    pub fn set_train_metrics(&mut self, history: History) -> Result<()> {
        validate_history(&history)?;
        self.train_metrics = history;
        Ok(())
    }

    /// Tracks the named metrics on the training set, starting empty.
    pub fn set_train_metric_types<S: AsRef<str>>(&mut self, names: &[S]) -> Result<()> {
        self.train_metrics = metric_types_to_history(names)?;
        Ok(())
    }

    pub fn validation_metrics(&self) -> &History {
        &self.validation_metrics
    }

    pub fn set_validation_metrics(&mut self, history: History) -> Result<()> {
        validate_history(&history)?;
        self.validation_metrics = history;
        Ok(())
    }

    pub fn set_validation_metric_types<S: AsRef<str>>(&mut self, names: &[S]) -> Result<()> {
        self.validation_metrics = metric_types_to_history(names)?;
        Ok(())
    }

    pub(crate) fn metrics_mut(&mut self) -> (&mut History, &mut History) {
        (&mut self.train_metrics, &mut self.validation_metrics)
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut [Linear], &mut CrossEntropyLoss) {
        (&mut self.layers, &mut self.loss)
    }

    /// Feeds `input` through every layer and returns the logits.
    pub fn forward(&mut self, input: &Matrix) -> Result<Matrix> {
        let mut current = input.clone();
        for layer in &mut self.layers {
            current = layer.forward(&current)?;
        }
        Ok(current)
    }

    /// Class name of the highest logit of every row.
    pub fn predict(&mut self, input: &Matrix) -> Result<Vec<String>> {
        if self.classes.is_empty() {
            return Err(Error::MissingClasses);
        }
        let logits = self.forward(input)?;
        argmax_rows(&logits)
            .into_iter()
            .map(|index| {
                self.classes.get(index).cloned().ok_or(Error::InvalidLabelIndex {
                    label: index,
                    num_classes: self.classes.len(),
                })
            })
            .collect()
    }

    /// Latest training metrics as text tables.
    pub fn format_train_metrics(&self) -> Result<String> {
        format_metrics(&self.train_metrics, &self.classes)
    }

    pub fn format_validation_metrics(&self) -> Result<String> {
        format_metrics(&self.validation_metrics, &self.classes)
    }

    pub fn to_json(&self) -> Result<Value> {
        let layers = self.layers.iter().map(Linear::to_json).collect::<Result<Vec<_>>>()?;
        Ok(json!({
            "class": CLASS_TAG,
            "layers": layers,
            "loss": self.loss.to_json()?,
            "total_epochs": self.total_epochs,
            "train_metrics": history_to_json(&self.train_metrics)?,
            "validation_metrics": history_to_json(&self.validation_metrics)?,
            "classes": self.classes,
        }))
    }

    pub fn from_json(value: &Value) -> Result<Model> {
        check_class_tag(value, CLASS_TAG)?;
        let layers = field(value, "layers")?
            .as_array()
            .ok_or_else(|| invalid_field("layers", "an array"))?
            .iter()
            .map(Linear::from_json)
            .collect::<Result<Vec<_>>>()?;
        let loss = CrossEntropyLoss::from_json(field(value, "loss")?)?;

        let mut model = Model::new(layers, loss)?;
        model.total_epochs = serde_json::from_value(field(value, "total_epochs")?.clone())?;
        model.classes = serde_json::from_value(field(value, "classes")?.clone())?;
        model.train_metrics = history_from_json(field(value, "train_metrics")?)?;
        model.validation_metrics = history_from_json(field(value, "validation_metrics")?)?;
        Ok(model)
    }

    /// Writes the model as pretty-printed JSON. Only `.json` paths are accepted.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        check_extension(path)?;
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, &self.to_json()?)?;
        writer.flush()?;
        info!(path = %path.display(), layers = self.layers.len(), "saved model");
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Model> {
        let path = path.as_ref();
        check_extension(path)?;
        let reader = BufReader::new(File::open(path)?);
        let value: Value = serde_json::from_reader(reader)?;
        let model = Model::from_json(&value)?;
        info!(
            path = %path.display(),
            layers = model.layers.len(),
            total_epochs = model.total_epochs,
            "loaded model"
        );
        Ok(model)
    }
}

/// Same layers and the same loss configuration.
impl PartialEq for Model {
    fn eq(&self, other: &Self) -> bool {
        self.layers == other.layers && self.loss == other.loss
    }
}

fn check_extension(path: &Path) -> Result<()> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Ok(()),
        Some(ext) => Err(Error::InvalidExtension(format!(".{ext}"))),
        None => Err(Error::InvalidExtension(String::new())),
    }
}

fn field<'a>(value: &'a Value, key: &str) -> Result<&'a Value> {
    value
        .get(key)
        .ok_or_else(|| Error::Json(serde::de::Error::custom(format!("missing field `{key}`"))))
}

fn invalid_field(key: &str, expected: &str) -> Error {
    Error::Json(serde::de::Error::custom(format!("\"{key}\" must be {expected}")))
}
