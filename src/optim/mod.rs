use serde::{Serialize, Deserialize};
use std::fmt;
use crate::error::{GraphError, ModelError};

/// Quasi-Newton minimization with box constraints (argmin L-BFGS).
pub mod lbfgsb;

pub use lbfgsb::*;

/// Box constraint of a single parameter. An absent end is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bound {

    pub lower : Option<f64>,

    pub upper : Option<f64>

}

impl Bound {

    pub fn unbounded() -> Self {
        Self { lower : None, upper : None }
    }

    /// Bound as a closed interval, with absent ends at +/- infinity.
    pub fn interval(&self) -> (f64, f64) {
        (self.lower.unwrap_or(f64::NEG_INFINITY), self.upper.unwrap_or(f64::INFINITY))
    }

    pub fn clamp(&self, x : f64) -> f64 {
        let (lo, hi) = self.interval();
        x.max(lo).min(hi)
    }

}

/// Configuration for the bounded minimizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {

    /// Maximum number of iterations
    pub max_iter : u64,

    /// Convergence tolerance for the gradient norm
    pub tol : f64,

    /// Number of corrections kept to approximate the inverse Hessian
    pub m : usize

}

impl Default for OptimizerConfig {

    fn default() -> Self {
        Self { max_iter : 1000, tol : 1e-6, m : 10 }
    }

}

/// Outcome of a minimization, returned as the minimizer reports it.
/// Non-convergence is signalled by success = false, not by an error.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizeResult {

    /// Best parameter vector found
    pub x : Vec<f64>,

    /// Objective value at x
    pub fun : f64,

    pub success : bool,

    pub n_iter : u64,

    /// Number of objective evaluations requested by the solver
    pub n_fev : usize,

    /// Number of gradient evaluations
    pub n_gev : usize,

    pub message : String

}

impl fmt::Display for OptimizeResult {

    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "OptimizeResult(fun={:.6}, x={:?}, n_iter={}, n_fev={}, success={})",
            self.fun, self.x, self.n_iter, self.n_fev, self.success
        )
    }

}

/// Scalar function minimized over a parameter vector.
pub trait Objective {

    fn eval(&self, x : &[f64]) -> Result<f64, GraphError>;

}

impl<F> Objective for F
where
    F : Fn(&[f64]) -> Result<f64, GraphError>
{

    fn eval(&self, x : &[f64]) -> Result<f64, GraphError> {
        self(x)
    }

}

/// Any algorithm able to minimize an objective subject to per-parameter bounds.
/// Errors raised by the objective are propagated unchanged (as ModelError::Graph).
pub trait Minimizer {

    fn minimize(
        &self,
        objective : &dyn Objective,
        initial : &[f64],
        bounds : &[Bound]
    ) -> Result<OptimizeResult, ModelError>;

}
