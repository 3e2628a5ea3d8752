use nalgebra::*;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use crate::config::Config;
use crate::distr::Node;
use crate::error::ModelError;
use crate::fit::Fitter;
use crate::graph::{Expr, Feed, GraphDef};
use crate::naming;
use crate::optim::{Lbfgsb, Minimizer, OptimizeResult};

/// Single-slot registry of the open model, and the structural state
/// (graph and components) a model shares with it.
pub mod registry;

use registry::Tracker;

/// Rewritten graphs built at observe time.
pub mod context;

pub use context::{Context, Bindings};

use context::Closed;

/// A probabilistic model: a set of distribution nodes declared while the model
/// is open, whose joint negative log-likelihood is minimized over the nodes
/// left hidden once some of them are bound to data.
///
/// The life of a model goes through four stages:
///
/// 1. Open: model.open() (or model.enter(.)) makes it the single open model of
/// the thread. Distribution nodes created now are tracked by it, in creation order.
///
/// 2. Close: closing the guard (or dropping it) builds the joint negative
/// log-likelihood under a name scope equal to the model name, and keeps an
/// immutable snapshot of the graph as it stands.
///
/// 3. Observe: model.observed(&[..]) splits the components into observed nodes
/// (fed with data at each query) and hidden nodes (scalar parameters), and
/// imports the snapshot into a fresh graph where each node is replaced accordingly.
/// Observing again discards that graph and starts over from the snapshot.
///
/// 4. Query: pdf(.), nll(.) and fit(.) receive one data vector per observed node,
/// in the order they were informed to observed(.).
///
/// ```ignore
/// let mut model = Model::new(None);
/// let open = model.open()?;
/// let mu = Uniform::new(Some("mu"), Some(0.0), None)?;
/// let x = Normal::new(Some("x"), &mu, 1.0)?;
/// open.close()?;
/// model.observed(&[&x])?;
/// let res = model.fit(&[DVector::from_vec(vec![1.0, 2.0, 3.0])])?;
/// ```
pub struct Model {

    name : String,

    config : Config,

    tracker : Rc<Tracker>,

    closed : Option<Closed>,

    context : Option<Context>

}

/// Keeps a model open while alive. Closing happens exactly once: either
/// explicitly, at close(), or when the guard goes out of scope.
pub struct OpenModel<'a> {

    model : &'a mut Model,

    done : bool

}

impl<'a> OpenModel<'a> {

    pub fn name(&self) -> &str {
        &self.model.name
    }

    /// Nodes tracked so far.
    pub fn components(&self) -> Vec<Node> {
        self.model.tracker.components()
    }

    /// Closes the model, building the joint negative log-likelihood and the snapshot.
    pub fn close(mut self) -> Result<(), ModelError> {
        self.done = true;
        self.model.exit()
    }

}

impl<'a> Drop for OpenModel<'a> {

    fn drop(&mut self) {
        if !self.done {
            self.done = true;
            if let Err(e) = self.model.exit() {
                log::warn!("Error while closing model {}: {}", self.model.name, e);
            }
        }
    }

}

/// Anything that can select a hidden parameter in assign(.): the hidden node
/// itself or the variable that replaced it in the rewritten graph.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    Node(&'a Node),
    Param(&'a Expr)
}

impl<'a> From<&'a Node> for Target<'a> {

    fn from(n : &'a Node) -> Self {
        Target::Node(n)
    }

}

impl<'a> From<&'a Expr> for Target<'a> {

    fn from(e : &'a Expr) -> Self {
        Target::Param(e)
    }

}

impl Model {

    pub fn new(name : Option<&str>) -> Self {
        Self::with_config(name, Config::default())
    }

    pub fn with_config(name : Option<&str>, config : Config) -> Self {
        let name = match name {
            Some(n) => n.to_string(),
            None => naming::generate_name("Model")
        };
        let tracker = Rc::new(Tracker::new(&name, config.dtype));
        Self { name, config, tracker, closed : None, context : None }
    }

    /// Makes this the open model. Fails with Nesting if any model (this one
    /// included) is already open.
    pub fn open(&mut self) -> Result<OpenModel<'_>, ModelError> {
        registry::open(self.tracker.clone())?;
        log::debug!("Opened model {}", self.name);
        Ok(OpenModel { model : self, done : false })
    }

    /// Runs f with this model open, closing it on every exit path. An error
    /// from f takes precedence over an error from closing.
    pub fn enter<F, T>(&mut self, f : F) -> Result<T, ModelError>
    where
        F : FnOnce() -> Result<T, ModelError>
    {
        let guard = self.open()?;
        let out = f();
        let closed = guard.close();
        let out = out?;
        closed?;
        Ok(out)
    }

    fn exit(&mut self) -> Result<(), ModelError> {
        registry::close();
        self.finalize()
    }

    /// Builds the joint negative log-likelihood and snapshots the graph. Log-densities
    /// built at a previous close are reused, and so is the likelihood when the
    /// components did not change since then.
    fn finalize(&mut self) -> Result<(), ModelError> {
        let components = self.tracker.components();
        let members : Vec<_> = components.iter().map(|n| n.id() ).collect();
        let graph = self.tracker.graph();
        let previous = self.closed.take();
        let mut logps = HashMap::new();
        let mut terms = Vec::with_capacity(components.len());
        for node in components.iter() {
            let built = previous.as_ref().and_then(|c| c.logps.get(&node.id()) );
            let lp = match built {
                Some(name) => graph.get(name)?,
                None => node.logp()
            };
            logps.insert(node.id(), lp.name());
            terms.push(lp);
        }

        // Empty models are closed without a likelihood.
        let unchanged = previous.as_ref().filter(|c| c.members == members );
        let nll = if terms.is_empty() {
            None
        } else if let Some(c) = unchanged {
            c.nll.clone()
        } else {
            graph.push_scope(&self.name);
            let sums : Vec<Expr> = terms.iter().map(|t| t.sum() ).collect();
            let joint = Expr::add_n(&sums[..]).map(|s| -s );
            graph.pop_scope();
            Some(joint?.name())
        };

        let snapshot = graph.to_def();
        log::debug!(
            "Closed model {} with {} components ({} graph nodes)",
            self.name,
            components.len(),
            snapshot.len()
        );
        self.closed = Some(Closed { snapshot, nll, logps, members });
        Ok(())
    }

    /// Binds the informed nodes to data. Every other component becomes a hidden
    /// scalar parameter, initialized to zero. Replaces the state left by any
    /// previous call.
    pub fn observed(&mut self, nodes : &[&Node]) -> Result<(), ModelError> {
        if registry::is_open() {
            return Err(ModelError::WrongScope);
        }
        let closed = self.closed.as_ref()
            .ok_or_else(|| ModelError::NotClosed(self.name.clone()) )?;
        if nodes.is_empty() {
            return Err(ModelError::InvalidArgument(String::from("observed() requires at least one node")));
        }
        let components = self.tracker.components();
        let mut observed : Vec<Node> = Vec::with_capacity(nodes.len());
        for &node in nodes.iter() {
            if !components.contains(node) {
                return Err(ModelError::InvalidArgument(format!("Argument {} is not a variable of model {}", node, self.name)));
            }
            if observed.contains(node) {
                return Err(ModelError::InvalidArgument(format!("Argument {} was informed more than once", node)));
            }
            observed.push(node.clone());
        }

        let context = Context::build(closed, &components[..], &observed[..])?;
        if let Some(mut previous) = self.context.take() {
            previous.close();
        }
        context.initialize()?;
        log::debug!(
            "Model {} observes {:?}; hidden: {:?}",
            self.name,
            context.observed().iter().map(|n| n.name() ).collect::<Vec<_>>(),
            context.hidden().iter().map(|n| n.name() ).collect::<Vec<_>>()
        );
        self.context = Some(context);
        Ok(())
    }

    /// Removes node from the components. If the model was already closed,
    /// the likelihood and snapshot are rebuilt without it, and the model must
    /// be observed again. The likelihood left behind stays in the model graph,
    /// unreachable from the new one.
    pub fn untrack_variable(&mut self, node : &Node) -> Result<(), ModelError> {
        self.tracker.remove(node)?;
        if self.closed.is_some() && !self.tracker.is_open() {
            if let Some(mut previous) = self.context.take() {
                previous.close();
            }
            self.finalize()?;
        }
        Ok(())
    }

    /// Current rewritten graph and session. Fails with NotObserved before observed(.).
    pub fn context(&self) -> Result<&Context, ModelError> {
        self.context.as_ref().ok_or(ModelError::NotObserved)
    }

    fn prepare(&self, args : &[DVector<f64>]) -> Result<(&Context, Feed), ModelError> {
        let ctx = self.context()?;
        let feed = ctx.feed(args)?;
        Ok((ctx, feed))
    }

    /// Density of the data, as the product of the densities of the observed nodes
    /// (element-wise over samples).
    pub fn pdf(&self, args : &[DVector<f64>]) -> Result<DVector<f64>, ModelError> {
        let (ctx, feed) = self.prepare(args)?;
        ctx.pdf(&feed)
    }

    /// Joint negative log-likelihood at the current hidden values.
    pub fn nll(&self, args : &[DVector<f64>]) -> Result<f64, ModelError> {
        let (ctx, feed) = self.prepare(args)?;
        ctx.nll(&feed)
    }

    /// Sets hidden parameters, each selected by its node or by its variable.
    pub fn assign<'a, T>(&self, values : Vec<(T, f64)>) -> Result<(), ModelError>
    where
        T : Into<Target<'a>>
    {
        if values.is_empty() {
            return Err(ModelError::InvalidArgument(String::from("assign() requires at least one value")));
        }
        let ctx = self.context()?;
        let mut resolved : Vec<(&Expr, f64)> = Vec::with_capacity(values.len());
        for (target, v) in values {
            let param = match target.into() {
                Target::Node(n) => ctx.param(n)
                    .ok_or_else(|| ModelError::InvalidArgument(format!("{} is not a hidden variable", n)) )?,
                Target::Param(e) => if ctx.is_param(e) {
                    e
                } else {
                    return Err(ModelError::InvalidArgument(format!("{} is not a hidden parameter", e)));
                }
            };
            resolved.push((param, v));
        }
        ctx.assign(&resolved[..])
    }

    /// Fits the hidden parameters with L-BFGS under the bounds of their supports.
    pub fn fit(&self, args : &[DVector<f64>]) -> Result<OptimizeResult, ModelError> {
        let minimizer = Lbfgsb::new(self.config.optimizer.clone());
        self.fit_with(&minimizer, args)
    }

    pub fn fit_with(&self, minimizer : &dyn Minimizer, args : &[DVector<f64>]) -> Result<OptimizeResult, ModelError> {
        let ctx = self.context()?;
        Fitter::new(ctx, self.config.bound_epsilon).fit(minimizer, args)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.tracker.is_open()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_some()
    }

    /// Tracked nodes, in creation order.
    pub fn components(&self) -> Vec<Node> {
        self.tracker.components()
    }

    /// Hidden nodes of the last observed(.) call.
    pub fn hidden(&self) -> Option<&[Node]> {
        self.context.as_ref().map(|c| c.hidden() )
    }

    pub fn observed_nodes(&self) -> Option<&[Node]> {
        self.context.as_ref().map(|c| c.observed() )
    }

    /// Graph snapshot taken at the last close.
    pub fn snapshot(&self) -> Option<&GraphDef> {
        self.closed.as_ref().map(|c| &c.snapshot )
    }

    /// Joint negative log-likelihood within the rewritten graph.
    pub fn nll_expr(&self) -> Option<&Expr> {
        self.context.as_ref().map(|c| c.nll_expr() )
    }

    pub fn hidden_params(&self) -> Option<&[Expr]> {
        self.context.as_ref().map(|c| c.params() )
    }

    pub fn observed_inputs(&self) -> Option<&[Expr]> {
        self.context.as_ref().map(|c| c.inputs() )
    }

    pub fn bindings(&self) -> Option<&Bindings> {
        self.context.as_ref().map(|c| c.bindings() )
    }

    /// Current value of a hidden node.
    pub fn value(&self, node : &Node) -> Result<f64, ModelError> {
        let ctx = self.context()?;
        let param = ctx.param(node)
            .ok_or_else(|| ModelError::InvalidArgument(format!("{} is not a hidden variable", node)) )?;
        ctx.value(param)
    }

}

impl fmt::Debug for Model {

    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("name", &self.name)
            .field("components", &self.tracker.components())
            .field("closed", &self.closed.is_some())
            .field("observed", &self.observed_nodes())
            .finish()
    }

}
