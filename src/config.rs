use nalgebra::*;
use serde::{Serialize, Deserialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use crate::optim::OptimizerConfig;

/// Numeric type of placeholders and variables. Values are always carried as f64;
/// Float32 inputs are rounded to single precision when they are fed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DType {
    Float32,
    Float64
}

impl DType {

    /// The numeric zero of this dtype, as a scalar value.
    pub fn zero(&self) -> DVector<f64> {
        DVector::from_element(1, 0.0)
    }

    pub fn cast(&self, v : &DVector<f64>) -> DVector<f64> {
        match self {
            DType::Float32 => v.map(|x| x as f32 as f64),
            DType::Float64 => v.clone()
        }
    }

}

impl Default for DType {

    fn default() -> Self {
        DType::Float64
    }

}

/// Default distance by which finite support edges are moved inward
/// before they are handed to the minimizer.
pub const BOUND_EPSILON : f64 = 1E-10;

/// Model-wide settings. Missing JSON fields fall back to the defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {

    pub dtype : DType,

    pub bound_epsilon : f64,

    pub optimizer : OptimizerConfig

}

impl Default for Config {

    fn default() -> Self {
        Self { dtype : DType::default(), bound_epsilon : BOUND_EPSILON, optimizer : OptimizerConfig::default() }
    }

}

impl Config {

    pub fn load_from_path<P>(path : P) -> anyhow::Result<Self>
    where
        P : AsRef<Path>
    {
        let f = File::open(path)?;
        Self::load(f)
    }

    pub fn load<R>(mut reader : R) -> anyhow::Result<Self>
    where
        R : Read
    {
        let mut content = String::new();
        reader.read_to_string(&mut content)?;
        let config : Config = serde_json::from_str(&content[..])?;
        if !(config.bound_epsilon >= 0.0) {
            return Err(anyhow::Error::msg("bound_epsilon should be a non-negative number"));
        }
        Ok(config)
    }

}
