use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// How per-sample losses collapse into the scalar a loss returns.
///
/// - `Mean`: average over the rows of the batch; gradients are divided by
///   the batch size.
/// - `Sum`: plain sum; gradients are left unscaled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reduction {
    #[default]
    Mean,
    Sum,
}

impl Reduction {
    pub fn reduce(&self, losses: &[f64]) -> f64 {
        let total: f64 = losses.iter().sum();
        match self {
            Reduction::Mean => total / losses.len() as f64,
            Reduction::Sum => total,
        }
    }

    /// Divisor applied to the gradient of a batch of `rows` samples.
    pub fn batch_size(&self, rows: usize) -> f64 {
        match self {
            Reduction::Mean => rows as f64,
            Reduction::Sum => 1.0,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Reduction::Mean => "mean",
            Reduction::Sum => "sum",
        }
    }
}

impl FromStr for Reduction {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        match name {
            "mean" => Ok(Reduction::Mean),
            "sum" => Ok(Reduction::Sum),
            other => Err(Error::InvalidReduction(other.to_owned())),
        }
    }
}

impl fmt::Display for Reduction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
