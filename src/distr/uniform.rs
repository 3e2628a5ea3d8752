use crate::error::ModelError;
use crate::graph::Expr;
use crate::model::registry;
use super::*;

/// Uniform distribution over [lower, upper]. A missing end leaves the support
/// unbounded on that side, and the density becomes an improper flat density
/// (log-density zero inside the support).
#[derive(Debug)]
pub struct Uniform {

    lower : Option<f64>,

    upper : Option<f64>

}

impl Uniform {

    pub fn new(name : Option<&str>, lower : Option<f64>, upper : Option<f64>) -> Result<Node, ModelError> {
        registry::current()?;
        for end in lower.iter().chain(upper.iter()) {
            if !end.is_finite() {
                return Err(ModelError::InvalidArgument(format!("Uniform bounds should be finite, got {}", end)));
            }
        }
        if let (Some(l), Some(u)) = (lower, upper) {
            if !(l < u) {
                return Err(ModelError::InvalidArgument(format!("Uniform requires lower < upper, got [{}, {}]", l, u)));
            }
        }
        Node::create(name, Uniform { lower, upper })
    }

    fn width(&self) -> Option<f64> {
        match (self.lower, self.upper) {
            (Some(l), Some(u)) => Some(u - l),
            _ => None
        }
    }

}

impl Distribution for Uniform {

    fn kind(&self) -> &'static str {
        "Uniform"
    }

    fn logp(&self, x : &Expr) -> Expr {
        let indicator = x.log_indicator(self.lower, self.upper);
        match self.width() {
            Some(w) => indicator - w.ln(),
            None => indicator
        }
    }

    fn pdf(&self, x : &Expr) -> Result<Expr, ModelError> {
        Ok(self.logp(x).exp())
    }

    fn cdf(&self, _x : &Expr, limit : &Expr) -> Result<Expr, ModelError> {
        match (self.lower, self.width()) {
            (Some(l), Some(w)) => Ok(((limit - l) / w).clamp(Some(0.0), Some(1.0))),
            _ => Err(ModelError::NotImplemented { op : "cdf", kind : "unbounded Uniform" })
        }
    }

    fn support(&self) -> Support {
        Support { lower : self.lower, upper : self.upper }
    }

}
