use nalgebra::*;
use crate::error::{GraphError, ModelError};
use crate::model::Context;
use crate::optim::{Minimizer, OptimizeResult};

/// Derivation of optimization bounds from distribution supports.
pub mod bounds;

pub use bounds::*;

/// Maximum likelihood estimation of the hidden parameters of an observed model.
/// The fitter bridges the rewritten graph and a minimizer: candidate vectors
/// proposed by the minimizer are written into the hidden variables, and the
/// joint negative log-likelihood is evaluated against fixed data.
pub struct Fitter<'a> {

    context : &'a Context,

    epsilon : f64

}

impl<'a> Fitter<'a> {

    /// epsilon is the margin kept from the finite edges of each support.
    pub fn new(context : &'a Context, epsilon : f64) -> Self {
        Self { context, epsilon }
    }

    /// Bounds of every hidden parameter, in component order.
    pub fn bounds(&self) -> Result<Vec<Bound>, ModelError> {
        self.context.hidden().iter()
            .map(|node| derive_bound(&node.support(), self.epsilon) )
            .collect()
    }

    /// Starting point: the current value of every hidden parameter.
    pub fn initial(&self) -> Result<Vec<f64>, ModelError> {
        self.context.values()
    }

    /// Minimizes the joint negative log-likelihood of args (one vector per
    /// observed node) over the hidden parameters. The optimum is written back
    /// into the hidden parameters, and the minimizer result returned as is.
    pub fn fit(&self, minimizer : &dyn Minimizer, args : &[DVector<f64>]) -> Result<OptimizeResult, ModelError> {
        let feed = self.context.feed(args)?;
        let initial = self.initial()?;

        if initial.is_empty() {
            let fun = self.context.nll(&feed)?;
            return Ok(OptimizeResult {
                x : Vec::new(),
                fun,
                success : true,
                n_iter : 0,
                n_fev : 1,
                n_gev : 0,
                message : String::from("No hidden parameters")
            });
        }

        let bounds = self.bounds()?;
        log::debug!("Fitting {} hidden parameters from {:?} within {:?}", initial.len(), initial, bounds);
        let objective = |xs : &[f64]| -> Result<f64, GraphError> {
            self.context.nll_at(xs, &feed)
        };
        let res = minimizer.minimize(&objective, &initial[..], &bounds[..])?;
        log::debug!("{}", res);

        let optimum : Vec<_> = self.context.params().iter()
            .zip(res.x.iter())
            .map(|(p, x)| (p, *x) )
            .collect();
        self.context.assign(&optimum[..])?;
        Ok(res)
    }

}
