use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::math::matrix::Matrix;

/// The nonlinearity applied at the end of a `Linear` layer.
///
/// Serialized by name: `"Identity"` or `"ReLU"`. Models written before the
/// identity variant was renamed use `"NoActivation"`, which is still read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ActivationFunction {
    #[default]
    #[serde(alias = "NoActivation")]
    Identity,
    ReLU,
}

impl ActivationFunction {
    pub fn function(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::Identity => x,
            ActivationFunction::ReLU => if x > 0.0 { x } else { 0.0 },
        }
    }

    /// Element-wise derivative. ReLU uses a strict comparison, so the
    /// sub-gradient at exactly 0 is 0.
    pub fn derivative(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::Identity => 1.0,
            ActivationFunction::ReLU => if x > 0.0 { 1.0 } else { 0.0 },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ActivationFunction::Identity => "Identity",
            ActivationFunction::ReLU => "ReLU",
        }
    }
}

impl FromStr for ActivationFunction {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        match name {
            "Identity" | "NoActivation" => Ok(ActivationFunction::Identity),
            "ReLU" => Ok(ActivationFunction::ReLU),
            other => Err(Error::InvalidActivation(other.to_owned())),
        }
    }
}

impl fmt::Display for ActivationFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An activation function together with the input of its last forward pass,
/// which `backward` differentiates against.
#[derive(Debug, Clone, Default)]
pub struct Activation {
    function: ActivationFunction,
    input: Option<Matrix>,
}

impl Activation {
    pub fn new(function: ActivationFunction) -> Activation {
        Activation { function, input: None }
    }

    pub fn function(&self) -> ActivationFunction {
        self.function
    }

    /// Applies the function element-wise and remembers `input`.
    pub fn forward(&mut self, input: &Matrix) -> Matrix {
        let function = self.function;
        let output = input.map(|x| function.function(x));
        self.input = Some(input.clone());
        output
    }

    /// Local gradient `d output / d input` for the last forward input.
    pub fn backward(&self) -> Result<Matrix> {
        let input = self.input.as_ref().ok_or(Error::BackwardBeforeForward)?;
        let function = self.function;
        Ok(input.map(|x| function.derivative(x)))
    }
}

impl From<ActivationFunction> for Activation {
    fn from(function: ActivationFunction) -> Self {
        Activation::new(function)
    }
}

/// Two activations are equal when they are the same variant; the cached
/// input does not take part.
impl PartialEq for Activation {
    fn eq(&self, other: &Self) -> bool {
        self.function == other.function
    }
}
