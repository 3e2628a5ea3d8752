use serde::{Serialize, Deserialize};
use std::fmt::Debug;
use crate::graph::{Graph, Expr};
use crate::error::ModelError;

/// Symbolic random variables tracked by the open model.
pub mod node;

pub use node::*;

pub mod normal;

pub use normal::*;

pub mod uniform;

pub use uniform::*;

pub mod exponential;

pub use exponential::*;

/// Trait shared by every distribution variant of the catalog. A variant holds
/// the expressions for its parameters (constants or the values of parent nodes)
/// and knows how to build its log-density for a value x, which is the
/// placeholder standing for the node itself. Only logp is mandatory: the
/// density and cumulative density fail with NotImplemented unless the
/// variant supplies them. The support is what the fitter turns into
/// optimization bounds when the node is left hidden.
pub trait Distribution
    where Self : Debug
{

    /// Short name of the variant, also used as prefix of generated node names.
    fn kind(&self) -> &'static str;

    /// Log-density of x, element-wise.
    fn logp(&self, x : &Expr) -> Expr;

    fn pdf(&self, _x : &Expr) -> Result<Expr, ModelError> {
        Err(ModelError::NotImplemented { op : "pdf", kind : self.kind() })
    }

    /// Probability that the variable is at most limit.
    fn cdf(&self, _x : &Expr, _limit : &Expr) -> Result<Expr, ModelError> {
        Err(ModelError::NotImplemented { op : "cdf", kind : self.kind() })
    }

    fn support(&self) -> Support {
        Support::real()
    }

}

/// Set of values over which a distribution has positive density. Absent ends are unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Support {

    pub lower : Option<f64>,

    pub upper : Option<f64>

}

impl Support {

    pub fn real() -> Self {
        Self { lower : None, upper : None }
    }

    pub fn positive() -> Self {
        Self { lower : Some(0.0), upper : None }
    }

    pub fn interval(lower : f64, upper : f64) -> Self {
        Self { lower : Some(lower), upper : Some(upper) }
    }

    pub fn contains(&self, x : f64) -> bool {
        self.lower.map(|l| x >= l).unwrap_or(true) && self.upper.map(|u| x <= u).unwrap_or(true)
    }

}

/// A distribution parameter: either a fixed number or an expression
/// (usually the value of another node of the same model).
#[derive(Debug, Clone)]
pub enum Param {
    Value(f64),
    Expr(Expr)
}

impl Param {

    /// Expression for this parameter within graph. Numbers become constants;
    /// expressions must already belong to graph.
    pub fn resolve(self, graph : &Graph) -> Result<Expr, ModelError> {
        match self {
            Param::Value(v) => Ok(graph.scalar(v)),
            Param::Expr(e) => {
                if e.graph().same(graph) {
                    Ok(e)
                } else {
                    Err(ModelError::InvalidArgument(format!(
                        "Parameter {} belongs to the graph of another model",
                        e.name()
                    )))
                }
            }
        }
    }

}

impl From<f64> for Param {

    fn from(v : f64) -> Self {
        Param::Value(v)
    }

}

impl From<Expr> for Param {

    fn from(e : Expr) -> Self {
        Param::Expr(e)
    }

}

impl From<&Expr> for Param {

    fn from(e : &Expr) -> Self {
        Param::Expr(e.clone())
    }

}

impl From<&Node> for Param {

    fn from(n : &Node) -> Self {
        Param::Expr(n.value().clone())
    }

}
