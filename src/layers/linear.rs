use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::activation::activation::{Activation, ActivationFunction};
use crate::error::{Error, Result};
use crate::math::matrix::Matrix;

const CLASS_TAG: &str = "Linear";

/// Dense affine layer `y = f(x Wᵀ + b)`.
///
/// `weight` is `out_channels x in_channels` and `bias` is a single row of
/// `out_channels`. Neither shape can change after construction.
#[derive(Debug, Clone)]
pub struct Linear {
    in_channels: usize,
    out_channels: usize,
    weight: Matrix,
    bias: Matrix,
    activation: Activation,
    eval: bool,
    input: Option<Matrix>,  // last forward input, training mode only
}

/// `(grad_input, grad_weight, grad_bias)` as returned by [`Linear::backward`].
pub type LinearGradients = (Matrix, Matrix, Matrix);

#[derive(Serialize, Deserialize)]
struct LinearRecord {
    class: String,
    weight: Vec<Vec<f64>>,
    bias: Vec<f64>,
    activation_function: ActivationFunction,
}

impl Linear {
    /// Creates a layer with weight and bias drawn from `U(-r, r)` where
    /// `r = sqrt(1 / in_channels)`. Both channel counts must be non-zero.
    pub fn new(in_channels: usize, out_channels: usize, activation: ActivationFunction) -> Result<Linear> {
        if in_channels == 0 || out_channels == 0 {
            return Err(Error::InvalidShape {
                expected: "at least 1x1".to_owned(),
                got: format!("{out_channels}x{in_channels}"),
            });
        }
        let range = (1.0 / in_channels as f64).sqrt();
        Ok(Linear {
            in_channels,
            out_channels,
            weight: Matrix::uniform(out_channels, in_channels, range),
            bias: Matrix::uniform(1, out_channels, range),
            activation: Activation::new(activation),
            eval: false,
            input: None,
        })
    }

    /// Builds a layer around existing parameters. The channel counts are
    /// taken from `weight`.
    pub fn from_parameters(weight: Matrix, bias: Matrix, activation: ActivationFunction) -> Result<Linear> {
        if weight.is_empty() {
            return Err(Error::EmptyMatrix);
        }
        let mut layer = Linear {
            in_channels: weight.cols,
            out_channels: weight.rows,
            bias: Matrix::zeros(1, weight.rows),
            weight,
            activation: Activation::new(activation),
            eval: false,
            input: None,
        };
        layer.set_bias(bias)?;
        Ok(layer)
    }

    pub fn in_channels(&self) -> usize {
        self.in_channels
    }

    pub fn out_channels(&self) -> usize {
        self.out_channels
    }

    pub fn eval(&self) -> bool {
        self.eval
    }

    /// Switching mode drops the cached input, so a `backward` right after a
    /// toggle always needs a fresh `forward`.
    pub fn set_eval(&mut self, eval: bool) {
        if self.eval != eval {
            self.input = None;
        }
        self.eval = eval;
    }

    pub fn weight(&self) -> &Matrix {
        &self.weight
    }

    pub fn set_weight(&mut self, weight: Matrix) -> Result<()> {
        if weight.shape() != self.weight.shape() {
            return Err(Error::shape(self.weight.shape(), weight.shape()));
        }
        self.weight = weight;
        Ok(())
    }

    pub fn bias(&self) -> &Matrix {
        &self.bias
    }

    /// Accepts the bias as a `1 x out` row or an `out x 1` column.
    pub fn set_bias(&mut self, bias: Matrix) -> Result<()> {
        let bias = if bias.cols == 1 && bias.rows == self.out_channels && self.out_channels != 1 {
            bias.transpose()
        } else {
            bias
        };
        if bias.shape() != self.bias.shape() {
            return Err(Error::shape(self.bias.shape(), bias.shape()));
        }
        self.bias = bias;
        Ok(())
    }

    pub fn activation(&self) -> ActivationFunction {
        self.activation.function()
    }

    /// Replaces the activation by name (`"ReLU"`, `"Identity"`).
    pub fn set_activation(&mut self, name: &str) -> Result<()> {
        let function: ActivationFunction = name.parse()?;
        self.activation = Activation::new(function);
        Ok(())
    }

    pub fn forward(&mut self, input: &Matrix) -> Result<Matrix> {
        if input.cols != self.in_channels {
            return Err(Error::shape((input.rows, self.in_channels), input.shape()));
        }
        self.input = if self.eval { None } else { Some(input.clone()) };
        let z = (input * &self.weight.transpose()).add_row(&self.bias);
        Ok(self.activation.forward(&z))
    }

    /// Chain rule through the activation and the affine map. `grad` is
    /// `dL/d output` for the last forward input.
    pub fn backward(&self, grad: &Matrix) -> Result<LinearGradients> {
        if self.eval {
            return Err(Error::BackwardCalledInEvalMode);
        }
        let input = self.input.as_ref().ok_or(Error::BackwardCalledWithNoInput)?;
        if grad.shape() != (input.rows, self.out_channels) {
            return Err(Error::shape((input.rows, self.out_channels), grad.shape()));
        }

        let total_grad = grad.hadamard(&self.activation.backward()?);
        let grad_weight = &total_grad.transpose() * input;
        let grad_bias = total_grad.column_sums();
        let grad_input = &total_grad * &self.weight;

        Ok((grad_input, grad_weight, grad_bias))
    }

    /// Runs `backward`, takes one SGD step on weight and bias and returns the
    /// gradient for the previous layer.
    pub fn update(&mut self, grad: &Matrix, learning_rate: f64) -> Result<Matrix> {
        let (grad_input, grad_weight, grad_bias) = self.backward(grad)?;
        self.weight = &self.weight - &grad_weight.scale(learning_rate);
        self.bias = &self.bias - &grad_bias.scale(learning_rate);
        Ok(grad_input)
    }

    pub fn to_json(&self) -> Result<Value> {
        let record = LinearRecord {
            class: CLASS_TAG.to_owned(),
            weight: self.weight.data.clone(),
            bias: self.bias.data[0].clone(),
            activation_function: self.activation(),
        };
        Ok(serde_json::to_value(record)?)
    }

    pub fn from_json(value: &Value) -> Result<Linear> {
        check_class_tag(value, CLASS_TAG)?;
        let record: LinearRecord = serde_json::from_value(value.clone())?;
        let weight = Matrix::from_rows(record.weight)?;
        Linear::from_parameters(weight, Matrix::row_vector(record.bias), record.activation_function)
    }
}

/// Equal channel counts, approximately equal parameters and the same
/// activation variant.
impl PartialEq for Linear {
    fn eq(&self, other: &Self) -> bool {
        self.in_channels == other.in_channels
            && self.out_channels == other.out_channels
            && self.weight.approx_eq(&other.weight)
            && self.bias.approx_eq(&other.bias)
            && self.activation == other.activation
    }
}

/// Fails unless `value["class"] == expected`.
pub(crate) fn check_class_tag(value: &Value, expected: &str) -> Result<()> {
    match value.get("class").and_then(Value::as_str) {
        Some(tag) if tag == expected => Ok(()),
        other => Err(Error::InvalidClassAttributeValue {
            expected: expected.to_owned(),
            got: other.unwrap_or_default().to_owned(),
        }),
    }
}
