use nalgebra::*;
use petgraph::stable_graph::NodeIndex;
use std::collections::HashMap;
use crate::distr::{Node, NodeId};
use crate::error::{GraphError, ModelError};
use crate::graph::{Graph, GraphDef, Expr, Feed, Session};

/// Correspondence between the nodes of a model and the placeholders
/// (observed nodes) or variables (hidden nodes) standing for them in one
/// rewritten graph. A fresh Bindings is built on every observe.
#[derive(Debug, Clone, Default)]
pub struct Bindings {

    exprs : HashMap<NodeId, Expr>,

    nodes : HashMap<NodeIndex, Node>

}

impl Bindings {

    fn bind(&mut self, node : &Node, expr : &Expr) {
        self.exprs.insert(node.id(), expr.clone());
        self.nodes.insert(expr.index(), node.clone());
    }

    /// Placeholder or variable bound to node.
    pub fn expr(&self, node : &Node) -> Option<&Expr> {
        self.exprs.get(&node.id())
    }

    /// Node the placeholder or variable expr stands for. Expressions of any
    /// other graph stand for no node, even when their index is bound here.
    pub fn node(&self, expr : &Expr) -> Option<&Node> {
        self.nodes.get(&expr.index())
            .filter(|n| self.exprs.get(&n.id()) == Some(expr) )
    }

    pub fn len(&self) -> usize {
        self.exprs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }

}

/// Names of the expressions built at model close, as they appear in the snapshot.
#[derive(Debug, Clone)]
pub(crate) struct Closed {

    pub(crate) snapshot : GraphDef,

    /// Joint negative log-likelihood. Absent when the model had no components.
    pub(crate) nll : Option<String>,

    /// Element-wise log-density of each tracked node.
    pub(crate) logps : HashMap<NodeId, String>,

    /// Components the likelihood was built over, in creation order.
    pub(crate) members : Vec<NodeId>

}

/// A rewritten graph and the session evaluating it. Observed nodes are
/// placeholders fed at every query; hidden nodes are scalar variables,
/// zero right after the context is built.
#[derive(Debug)]
pub struct Context {

    graph : Graph,

    session : Session,

    observed : Vec<Node>,

    inputs : Vec<Expr>,

    hidden : Vec<Node>,

    params : Vec<Expr>,

    bindings : Bindings,

    nll : Expr,

    pdf : Expr

}

impl Context {

    /// Imports the snapshot into a new graph, with every observed node
    /// substituted by a new placeholder and every other component by a new
    /// variable, each carrying the name of the node it replaces. The session is
    /// created but not initialized.
    pub(crate) fn build(closed : &Closed, components : &[Node], observed : &[Node]) -> Result<Self, ModelError> {
        let nll_name = closed.nll.as_ref()
            .ok_or_else(|| ModelError::InvalidArgument(String::from("Model has no components")) )?;
        let graph = Graph::new();
        let mut bindings = Bindings::default();
        let mut input_map : HashMap<String, Expr> = HashMap::new();

        let mut inputs = Vec::with_capacity(observed.len());
        for node in observed.iter() {
            let ph = graph.placeholder(node.dtype(), Some(node.name()));
            bindings.bind(node, &ph);
            input_map.insert(node.name().to_string(), ph.clone());
            inputs.push(ph);
        }

        let hidden : Vec<Node> = components.iter()
            .filter(|n| !observed.contains(*n) )
            .cloned()
            .collect();
        let mut params = Vec::with_capacity(hidden.len());
        for node in hidden.iter() {
            let var = graph.variable(node.dtype(), node.dtype().zero(), Some(node.name()));
            bindings.bind(node, &var);
            input_map.insert(node.name().to_string(), var.clone());
            params.push(var);
        }

        graph.import(&closed.snapshot, &input_map)?;

        let nll = graph.get(nll_name)?;
        let mut logps = Vec::with_capacity(observed.len());
        for node in observed.iter() {
            let name = closed.logps.get(&node.id())
                .ok_or_else(|| ModelError::InvalidArgument(format!("No log-density recorded for {}", node.name())) )?;
            logps.push(graph.get(name)?);
        }
        let pdf = Expr::add_n(&logps[..])?.exp();

        let session = Session::new(graph.clone());
        Ok(Self { graph, session, observed : observed.to_vec(), inputs, hidden, params, bindings, nll, pdf })
    }

    pub(crate) fn initialize(&self) -> Result<(), ModelError> {
        Ok(self.session.initialize()?)
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn observed(&self) -> &[Node] {
        &self.observed
    }

    /// Placeholders of the observed nodes, in observe order.
    pub fn inputs(&self) -> &[Expr] {
        &self.inputs
    }

    pub fn hidden(&self) -> &[Node] {
        &self.hidden
    }

    /// Variables of the hidden nodes, in component order.
    pub fn params(&self) -> &[Expr] {
        &self.params
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    pub fn nll_expr(&self) -> &Expr {
        &self.nll
    }

    pub fn pdf_expr(&self) -> &Expr {
        &self.pdf
    }

    /// Binds each argument to the observed placeholder at the same position.
    pub fn feed(&self, args : &[DVector<f64>]) -> Result<Feed, ModelError> {
        if args.len() != self.inputs.len() {
            return Err(ModelError::ArgumentMismatch { given : args.len(), expected : self.inputs.len() });
        }
        let mut feed = Feed::new();
        for (ph, arg) in self.inputs.iter().zip(args.iter()) {
            feed.insert(ph, arg.clone())?;
        }
        Ok(feed)
    }

    pub fn nll(&self, feed : &Feed) -> Result<f64, ModelError> {
        Ok(self.session.run_scalar(&self.nll, feed)?)
    }

    pub fn pdf(&self, feed : &Feed) -> Result<DVector<f64>, ModelError> {
        Ok(self.session.run(&self.pdf, feed)?)
    }

    /// Sets the hidden parameters to xs (in component order) and evaluates the
    /// joint negative log-likelihood against feed.
    pub(crate) fn nll_at(&self, xs : &[f64], feed : &Feed) -> Result<f64, GraphError> {
        let values : Vec<(&Expr, DVector<f64>)> = self.params.iter()
            .zip(xs.iter())
            .map(|(p, x)| (p, DVector::from_element(1, *x)) )
            .collect();
        self.session.assign(&values[..])?;
        self.session.run_scalar(&self.nll, feed)
    }

    /// Variable bound to node, if node is hidden in this context.
    pub fn param(&self, node : &Node) -> Option<&Expr> {
        self.bindings.expr(node).filter(|e| self.params.contains(*e) )
    }

    pub fn is_param(&self, expr : &Expr) -> bool {
        self.params.contains(expr)
    }

    /// Overwrites hidden parameters with scalar values.
    pub fn assign(&self, values : &[(&Expr, f64)]) -> Result<(), ModelError> {
        let values : Vec<(&Expr, DVector<f64>)> = values.iter()
            .map(|(e, v)| (*e, DVector::from_element(1, *v)) )
            .collect();
        Ok(self.session.assign(&values[..])?)
    }

    /// Scalar value of the hidden parameter param.
    pub fn value(&self, param : &Expr) -> Result<f64, ModelError> {
        let v = self.session.value(param)?;
        v.get(0).cloned().ok_or_else(|| ModelError::InvalidArgument(format!("{} holds an empty value", param.name())) )
    }

    /// Current values of every hidden parameter, in component order.
    pub fn values(&self) -> Result<Vec<f64>, ModelError> {
        self.params.iter().map(|p| self.value(p) ).collect()
    }

    pub fn is_closed(&self) -> bool {
        self.session.is_closed()
    }

    /// Tears down the session. The context is unusable afterwards.
    pub fn close(&mut self) {
        self.session.close();
    }

}
