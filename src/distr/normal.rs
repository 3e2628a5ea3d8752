use std::f64::consts::PI;
use crate::error::ModelError;
use crate::graph::Expr;
use crate::model::registry;
use super::*;

/// Normal distribution parametrized by location (mu) and standard deviation (sigma).
#[derive(Debug)]
pub struct Normal {

    mu : Expr,

    sigma : Expr

}

impl Normal {

    pub fn new<M, S>(name : Option<&str>, mu : M, sigma : S) -> Result<Node, ModelError>
    where
        M : Into<Param>,
        S : Into<Param>
    {
        let graph = registry::current()?.graph().clone();
        let mu = mu.into().resolve(&graph)?;
        let sigma = sigma.into().resolve(&graph)?;
        Node::create(name, Normal { mu, sigma })
    }

}

impl Distribution for Normal {

    fn kind(&self) -> &'static str {
        "Normal"
    }

    // -0.5 ln(2 pi) - ln(sigma) - (x - mu)^2 / (2 sigma^2)
    fn logp(&self, x : &Expr) -> Expr {
        let z = (x - &self.mu) / &self.sigma;
        -(z.square() * 0.5) - self.sigma.ln() - 0.5 * (2.0 * PI).ln()
    }

    fn pdf(&self, x : &Expr) -> Result<Expr, ModelError> {
        Ok(self.logp(x).exp())
    }

}
