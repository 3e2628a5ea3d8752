use nalgebra::*;
use serde::{Serialize, Deserialize};
use crate::config::DType;
use crate::error::GraphError;

/// Operations supported by the expression graph. Inputs are not held by the
/// operation itself, but by the graph edges (ordered by argument position).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Op {

    Const { value : DVector<f64> },

    /// Run-time input, which must be fed at every evaluation.
    Placeholder { dtype : DType },

    /// Mutable parameter whose value lives in the session.
    Variable { dtype : DType, init : DVector<f64> },

    Add,

    Sub,

    Mul,

    Div,

    Neg,

    Exp,

    Ln,

    Square,

    /// Reduces its input to a single-element vector.
    Sum,

    /// Element-wise sum over any number of inputs.
    AddN,

    /// Limits every entry to [lower, upper]. Absent ends are unbounded.
    Clamp { lower : Option<f64>, upper : Option<f64> },

    /// Zero for entries inside the closed interval [lower, upper] and
    /// -inf outside of it. Absent ends are unbounded.
    LogIndicator { lower : Option<f64>, upper : Option<f64> }

}

impl Op {

    /// Base name used when auto-naming nodes holding this operation.
    pub fn kind(&self) -> &'static str {
        match self {
            Op::Const{..} => "Const",
            Op::Placeholder{..} => "Placeholder",
            Op::Variable{..} => "Variable",
            Op::Add => "Add",
            Op::Sub => "Sub",
            Op::Mul => "Mul",
            Op::Div => "Div",
            Op::Neg => "Neg",
            Op::Exp => "Exp",
            Op::Ln => "Ln",
            Op::Square => "Square",
            Op::Sum => "Sum",
            Op::AddN => "AddN",
            Op::Clamp{..} => "Clamp",
            Op::LogIndicator{..} => "LogIndicator"
        }
    }

    /// Number of inputs the operation expects (None for variadic operations).
    pub fn arity(&self) -> Option<usize> {
        match self {
            Op::Const{..} | Op::Placeholder{..} | Op::Variable{..} => Some(0),
            Op::Add | Op::Sub | Op::Mul | Op::Div => Some(2),
            Op::Neg | Op::Exp | Op::Ln | Op::Square | Op::Sum | Op::Clamp{..} | Op::LogIndicator{..} => Some(1),
            Op::AddN => None
        }
    }

    /// Fails unless the operation accepts the informed number of inputs.
    pub fn check_arity(&self, given : usize) -> Result<(), GraphError> {
        match self.arity() {
            Some(expected) if expected != given => Err(GraphError::Arity { op : self.kind(), expected, given }),
            None if given == 0 => Err(GraphError::EmptyInput(self.kind())),
            _ => Ok(())
        }
    }

    /// Evaluates a computational operation over already-evaluated inputs. Sources
    /// (placeholders and variables) are resolved by the session, not here.
    pub fn eval(&self, inputs : &[&DVector<f64>]) -> Result<DVector<f64>, GraphError> {
        self.check_arity(inputs.len())?;
        match self {
            Op::Const{ value } => Ok(value.clone()),
            Op::Placeholder{..} | Op::Variable{..} => Err(GraphError::Unevaluable(self.kind())),
            Op::Add => broadcast(self.kind(), inputs[0], inputs[1], |a, b| a + b),
            Op::Sub => broadcast(self.kind(), inputs[0], inputs[1], |a, b| a - b),
            Op::Mul => broadcast(self.kind(), inputs[0], inputs[1], |a, b| a * b),
            Op::Div => broadcast(self.kind(), inputs[0], inputs[1], |a, b| a / b),
            Op::Neg => Ok(inputs[0].map(|a| -a)),
            Op::Exp => Ok(inputs[0].map(|a| a.exp())),
            Op::Ln => Ok(inputs[0].map(|a| a.ln())),
            Op::Square => Ok(inputs[0].map(|a| a * a)),
            Op::Sum => Ok(DVector::from_element(1, inputs[0].sum())),
            Op::AddN => {
                let (first, rest) = inputs.split_first()
                    .ok_or(GraphError::EmptyInput(self.kind()))?;
                let mut acc = (*first).clone();
                for v in rest {
                    acc = broadcast(self.kind(), &acc, v, |a, b| a + b)?;
                }
                Ok(acc)
            },
            Op::Clamp{ lower, upper } => {
                let lo = lower.unwrap_or(f64::NEG_INFINITY);
                let hi = upper.unwrap_or(f64::INFINITY);
                Ok(inputs[0].map(|a| a.max(lo).min(hi) ))
            },
            Op::LogIndicator{ lower, upper } => {
                Ok(inputs[0].map(|a| {
                    let above = lower.map(|l| a >= l).unwrap_or(true);
                    let below = upper.map(|u| a <= u).unwrap_or(true);
                    if above && below { 0.0 } else { f64::NEG_INFINITY }
                }))
            }
        }
    }

}

/// Applies f element-wise; single-element operands are broadcast against
/// the other operand.
fn broadcast<F>(op : &'static str, a : &DVector<f64>, b : &DVector<f64>, f : F) -> Result<DVector<f64>, GraphError>
where
    F : Fn(f64, f64) -> f64
{
    match (a.nrows(), b.nrows()) {
        (n, m) if n == m => Ok(a.zip_map(b, f)),
        (1, _) => Ok(b.map(|y| f(a[0], y))),
        (_, 1) => Ok(a.map(|x| f(x, b[0]))),
        (n, m) => Err(GraphError::ShapeMismatch { op, left : n, right : m })
    }
}
