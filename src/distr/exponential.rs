use crate::error::ModelError;
use crate::graph::Expr;
use crate::model::registry;
use super::*;

/// Exponential distribution with the informed rate (inverse scale).
#[derive(Debug)]
pub struct Exponential {

    rate : Expr

}

impl Exponential {

    pub fn new<R>(name : Option<&str>, rate : R) -> Result<Node, ModelError>
    where
        R : Into<Param>
    {
        let graph = registry::current()?.graph().clone();
        let rate = rate.into().resolve(&graph)?;
        Node::create(name, Exponential { rate })
    }

}

impl Distribution for Exponential {

    fn kind(&self) -> &'static str {
        "Exponential"
    }

    fn logp(&self, x : &Expr) -> Expr {
        self.rate.ln() - &self.rate * x + x.log_indicator(Some(0.0), None)
    }

    fn pdf(&self, x : &Expr) -> Result<Expr, ModelError> {
        Ok(self.logp(x).exp())
    }

    fn cdf(&self, _x : &Expr, limit : &Expr) -> Result<Expr, ModelError> {
        let tail = (-(&self.rate * limit)).exp();
        Ok((1.0 - tail).clamp(Some(0.0), None))
    }

    fn support(&self) -> Support {
        Support::positive()
    }

}
