use nalgebra::*;
use petgraph::stable_graph::NodeIndex;
use petgraph::visit::{DfsPostOrder, Reversed};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use super::{Graph, Expr, Op};
use crate::error::GraphError;

/// Values bound to placeholders for a single evaluation.
#[derive(Debug, Clone, Default)]
pub struct Feed {

    graph : Option<Graph>,

    values : HashMap<NodeIndex, DVector<f64>>

}

impl Feed {

    pub fn new() -> Self {
        Self::default()
    }

    /// Binds value to the placeholder target. All targets of a feed must
    /// belong to the same graph.
    pub fn insert(&mut self, target : &Expr, value : DVector<f64>) -> Result<(), GraphError> {
        if !matches!(target.op(), Op::Placeholder{..}) {
            return Err(GraphError::InvalidFeedTarget(target.name()));
        }
        match &self.graph {
            Some(g) if !g.same(target.graph()) => return Err(GraphError::ForeignGraph(target.name())),
            Some(_) => { },
            None => self.graph = Some(target.graph().clone())
        }
        self.values.insert(target.index(), value);
        Ok(())
    }

    pub fn with(mut self, target : &Expr, value : DVector<f64>) -> Result<Self, GraphError> {
        self.insert(target, value)?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

}

/// Evaluates expressions of a single graph. The session owns the state of every
/// variable in the graph; placeholders are resolved from the feed informed at each
/// call to run(.). Variable state is interior-mutable, so a session can be shared
/// by an objective closure which assigns and evaluates repeatedly.
#[derive(Debug)]
pub struct Session {

    graph : Graph,

    variables : RefCell<HashMap<NodeIndex, DVector<f64>>>,

    open : Cell<bool>

}

impl Session {

    pub fn new(graph : Graph) -> Self {
        Self { graph, variables : RefCell::new(HashMap::new()), open : Cell::new(true) }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn is_closed(&self) -> bool {
        !self.open.get()
    }

    fn check(&self, e : &Expr) -> Result<(), GraphError> {
        if self.is_closed() {
            return Err(GraphError::SessionClosed);
        }
        if !self.graph.same(e.graph()) {
            return Err(GraphError::ForeignGraph(e.name()));
        }
        Ok(())
    }

    /// Sets every variable of the graph to its initial value.
    pub fn initialize(&self) -> Result<(), GraphError> {
        if self.is_closed() {
            return Err(GraphError::SessionClosed);
        }
        let mut vars = self.variables.borrow_mut();
        vars.clear();
        for (ix, init) in self.graph.variables() {
            vars.insert(ix, init);
        }
        Ok(())
    }

    /// Overwrites the informed variables. Either all values are written or,
    /// if any target is invalid, none is.
    pub fn assign(&self, values : &[(&Expr, DVector<f64>)]) -> Result<(), GraphError> {
        for (target, _) in values.iter() {
            self.check(target)?;
            if !matches!(target.op(), Op::Variable{..}) {
                return Err(GraphError::NotAVariable(target.name()));
            }
        }
        let mut vars = self.variables.borrow_mut();
        for (target, value) in values.iter() {
            vars.insert(target.index(), value.clone());
        }
        Ok(())
    }

    /// Current value of a variable.
    pub fn value(&self, target : &Expr) -> Result<DVector<f64>, GraphError> {
        self.check(target)?;
        if !matches!(target.op(), Op::Variable{..}) {
            return Err(GraphError::NotAVariable(target.name()));
        }
        self.variables.borrow().get(&target.index()).cloned()
            .ok_or_else(|| GraphError::Uninitialized(target.name()) )
    }

    /// Evaluates target. Only the ancestors of target are visited, inputs
    /// before their consumers (post-order over the reversed edges).
    pub fn run(&self, target : &Expr, feed : &Feed) -> Result<DVector<f64>, GraphError> {
        self.check(target)?;
        if let Some(g) = &feed.graph {
            if !g.same(&self.graph) {
                return Err(GraphError::ForeignGraph(target.name()));
            }
        }
        let data = self.graph.data();
        let vars = self.variables.borrow();
        let reversed = Reversed(&data.inner);
        let mut dfs = DfsPostOrder::new(reversed, target.index());
        let mut values : HashMap<NodeIndex, DVector<f64>> = HashMap::new();
        while let Some(ix) = dfs.next(reversed) {
            let node = &data.inner[ix];
            let value = match &node.op {
                Op::Placeholder{ dtype } => {
                    let fed = feed.values.get(&ix)
                        .ok_or_else(|| GraphError::MissingFeed(node.name.clone()) )?;
                    dtype.cast(fed)
                },
                Op::Variable{..} => {
                    vars.get(&ix).cloned()
                        .ok_or_else(|| GraphError::Uninitialized(node.name.clone()) )?
                },
                op => {
                    let inputs = data.inputs(ix);
                    let args : Vec<&DVector<f64>> = inputs.iter()
                        .map(|i| &values[i] )
                        .collect();
                    op.eval(&args[..])?
                }
            };
            values.insert(ix, value);
        }
        values.remove(&target.index())
            .ok_or_else(|| GraphError::UnknownName(target.name()) )
    }

    /// Convenience for scalar-valued expressions.
    pub fn run_scalar(&self, target : &Expr, feed : &Feed) -> Result<f64, GraphError> {
        let v = self.run(target, feed)?;
        if v.nrows() != 1 {
            return Err(GraphError::ShapeMismatch { op : "scalar", left : v.nrows(), right : 1 });
        }
        Ok(v[0])
    }

    /// Releases all variable state. Every later call fails with SessionClosed.
    pub fn close(&mut self) {
        self.variables.borrow_mut().clear();
        self.open.set(false);
    }

}
