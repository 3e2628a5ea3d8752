use argmin::core::{CostFunction, Executor, Gradient, State, TerminationReason, TerminationStatus};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;
use finitediff::FiniteDiff;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use super::*;

fn clamp_params(params : &[f64], bounds : &[Bound]) -> Vec<f64> {
    params.iter().zip(bounds.iter()).map(|(v, b)| b.clamp(*v) ).collect()
}

#[derive(Default)]
struct FuncCounts {
    cost : Cell<usize>,
    grad : Cell<usize>
}

/// Adapts an Objective to argmin. Parameters proposed by the solver are clamped
/// into the bounds before the objective sees them; gradients are taken by
/// central differences over the clamped objective.
struct BoundedProblem<'a> {
    objective : &'a dyn Objective,
    bounds : &'a [Bound],
    counts : Rc<FuncCounts>
}

impl<'a> BoundedProblem<'a> {

    fn eval_clamped(&self, params : &[f64]) -> Result<f64, GraphError> {
        let clamped = clamp_params(params, self.bounds);
        let v = self.objective.eval(&clamped)?;
        log::trace!("objective({:?}) = {}", clamped, v);
        Ok(v)
    }

}

impl<'a> CostFunction for BoundedProblem<'a> {

    type Param = Vec<f64>;

    type Output = f64;

    fn cost(&self, params : &Self::Param) -> Result<Self::Output, argmin::core::Error> {
        self.counts.cost.set(self.counts.cost.get() + 1);
        Ok(self.eval_clamped(params)?)
    }

}

impl<'a> Gradient for BoundedProblem<'a> {

    type Param = Vec<f64>;

    type Gradient = Vec<f64>;

    fn gradient(&self, params : &Self::Param) -> Result<Self::Gradient, argmin::core::Error> {
        self.counts.grad.set(self.counts.grad.get() + 1);
        let clamped = clamp_params(params, self.bounds);

        // finitediff expects an infallible closure: keep the first failure and
        // report it once the differences are taken.
        let failure : RefCell<Option<GraphError>> = RefCell::new(None);
        let mut g = clamped.central_diff(&|x : &Vec<f64>| {
            match self.eval_clamped(x) {
                Ok(v) => v,
                Err(e) => {
                    failure.borrow_mut().get_or_insert(e);
                    f64::NAN
                }
            }
        });
        if let Some(e) = failure.into_inner() {
            return Err(e.into());
        }

        // A component pushing further outside an active bound is zeroed, so that
        // the line search does not keep stepping into the flat clamped region.
        const EPS : f64 = 1e-12;
        for (i, (x, b)) in clamped.iter().zip(self.bounds.iter()).enumerate() {
            let (lo, hi) = b.interval();
            if *x <= lo + EPS && g[i] > 0.0 {
                g[i] = 0.0;
            }
            if *x >= hi - EPS && g[i] < 0.0 {
                g[i] = 0.0;
            }
        }
        Ok(g)
    }

}

/// Errors raised by the objective travel through argmin as anyhow errors;
/// graph failures are recovered so callers see them unchanged.
fn recover_error(e : argmin::core::Error) -> ModelError {
    match e.downcast::<GraphError>() {
        Ok(graph_err) => ModelError::Graph(graph_err),
        Err(other) => ModelError::Optimizer(other.to_string())
    }
}

/// L-BFGS with box constraints enforced by clamping (a projected-gradient
/// approximation of L-BFGS-B).
#[derive(Debug, Clone, Default)]
pub struct Lbfgsb {
    config : OptimizerConfig
}

impl Lbfgsb {

    pub fn new(config : OptimizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

}

impl Minimizer for Lbfgsb {

    fn minimize(
        &self,
        objective : &dyn Objective,
        initial : &[f64],
        bounds : &[Bound]
    ) -> Result<OptimizeResult, ModelError> {
        if initial.len() != bounds.len() {
            return Err(ModelError::InvalidArgument(format!(
                "Parameter and bounds length mismatch: {} != {}",
                initial.len(),
                bounds.len()
            )));
        }
        for (i, b) in bounds.iter().enumerate() {
            let (lo, hi) = b.interval();
            if !(lo <= hi) {
                return Err(ModelError::InvalidArgument(format!("Empty bound for parameter {}: [{}, {}]", i, lo, hi)));
            }
        }

        let init = clamp_params(initial, bounds);
        if init.is_empty() {
            let fun = objective.eval(&init)?;
            return Ok(OptimizeResult {
                x : init,
                fun,
                success : true,
                n_iter : 0,
                n_fev : 1,
                n_gev : 0,
                message : String::from("No free parameters")
            });
        }

        let counts = Rc::new(FuncCounts::default());
        let problem = BoundedProblem { objective, bounds, counts : counts.clone() };

        // argmin's default cost tolerance is close to machine epsilon, which is too
        // strict for likelihood scales.
        let tol_cost = if self.config.tol == 0.0 { 0.0 } else { (0.1 * self.config.tol).max(1e-12) };
        let linesearch = MoreThuenteLineSearch::new();
        let solver = LBFGS::new(linesearch, self.config.m)
            .with_tolerance_grad(self.config.tol)
            .map_err(|e| ModelError::Optimizer(format!("Invalid tolerance: {}", e)) )?
            .with_tolerance_cost(tol_cost)
            .map_err(|e| ModelError::Optimizer(format!("Invalid cost tolerance: {}", e)) )?;

        let res = Executor::new(problem, solver)
            .configure(|state| state.param(init).max_iters(self.config.max_iter) )
            .run()
            .map_err(recover_error)?;

        let state = res.state();
        let best = state.get_best_param()
            .ok_or_else(|| ModelError::Optimizer(String::from("No best parameters found")) )?;
        let x = clamp_params(best, bounds);
        let termination = state.get_termination_status();
        let success = matches!(
            termination,
            TerminationStatus::Terminated(TerminationReason::SolverConverged)
                | TerminationStatus::Terminated(TerminationReason::TargetCostReached)
        );
        Ok(OptimizeResult {
            x,
            fun : state.get_best_cost(),
            success,
            n_iter : state.get_iter(),
            n_fev : counts.cost.get(),
            n_gev : counts.grad.get(),
            message : termination.to_string()
        })
    }

}
