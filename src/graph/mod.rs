use nalgebra::*;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::cell::{Ref, RefCell};
use std::collections::HashMap;
use std::fmt::{self, Display, Debug};
use std::ops::{Add, Sub, Mul, Div, Neg};
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use crate::config::DType;
use crate::error::GraphError;
use crate::naming;

/// Operations and their numerical evaluation.
pub mod op;

pub use op::*;

/// Immutable, serializable snapshots of a graph.
pub mod def;

pub use def::*;

/// Evaluation of expressions against fed inputs and variable state.
pub mod session;

pub use session::*;

static GRAPH_IDS : AtomicUsize = AtomicUsize::new(0);

#[derive(Debug, Clone)]
pub(crate) struct OpNode {

    pub(crate) name : String,

    pub(crate) op : Op

}

#[derive(Debug)]
pub(crate) struct GraphData {

    id : usize,

    /// Edges point from an input to its consumer; the edge weight is the
    /// argument position at the consumer.
    pub(crate) inner : StableDiGraph<OpNode, usize>,

    names : HashMap<String, NodeIndex>,

    scopes : Vec<String>

}

impl GraphData {

    fn insert(&mut self, op : Op, inputs : &[NodeIndex], name : String) -> Result<NodeIndex, GraphError> {
        if self.names.contains_key(&name) {
            return Err(GraphError::DuplicateName(name));
        }
        let ix = self.inner.add_node(OpNode { name : name.clone(), op });
        for (pos, input) in inputs.iter().enumerate() {
            self.inner.add_edge(*input, ix, pos);
        }
        self.names.insert(name, ix);
        Ok(ix)
    }

    fn auto_name(&self, base : &str) -> String {
        let scoped = match self.scopes.last() {
            Some(scope) => format!("{}/{}", scope, base),
            None => base.to_string()
        };
        naming::unique_name(&scoped, |n| self.names.contains_key(n))
    }

    /// Inputs of the node at ix, in argument order.
    pub(crate) fn inputs(&self, ix : NodeIndex) -> Vec<NodeIndex> {
        let mut edges : Vec<(usize, NodeIndex)> = self.inner.edges_directed(ix, Direction::Incoming)
            .map(|e| (*e.weight(), e.source()) )
            .collect();
        edges.sort();
        edges.into_iter().map(|(_, src)| src ).collect()
    }

}

/// A directed graph of operations over f64 vectors. Graph is a handle: clones
/// refer to the same underlying graph, and every Expr keeps its graph alive.
/// Nodes are never removed, and a node is only ever inserted after all of its
/// inputs, so the insertion order is a topological order.
#[derive(Clone)]
pub struct Graph {
    data : Rc<RefCell<GraphData>>
}

impl Graph {

    pub fn new() -> Self {
        let data = GraphData {
            id : GRAPH_IDS.fetch_add(1, Ordering::Relaxed),
            inner : StableDiGraph::new(),
            names : HashMap::new(),
            scopes : Vec::new()
        };
        Self { data : Rc::new(RefCell::new(data)) }
    }

    pub fn id(&self) -> usize {
        self.data.borrow().id
    }

    /// Whether both handles refer to the same graph.
    pub fn same(&self, other : &Graph) -> bool {
        Rc::ptr_eq(&self.data, &other.data)
    }

    pub(crate) fn data(&self) -> Ref<'_, GraphData> {
        self.data.borrow()
    }

    pub fn node_count(&self) -> usize {
        self.data.borrow().inner.node_count()
    }

    /// Nodes auto-named after this call receive the scope as a prefix,
    /// until the matching pop_scope.
    pub fn push_scope(&self, scope : &str) {
        let mut data = self.data.borrow_mut();
        let full = match data.scopes.last() {
            Some(outer) => format!("{}/{}", outer, scope),
            None => scope.to_string()
        };
        data.scopes.push(full);
    }

    pub fn pop_scope(&self) {
        self.data.borrow_mut().scopes.pop();
    }

    fn push(&self, op : Op, inputs : &[NodeIndex]) -> Expr {
        let mut data = self.data.borrow_mut();
        let name = data.auto_name(op.kind());
        let ix = data.insert(op, inputs, name)
            .unwrap_or_else(|e| unreachable!("auto-generated name clashed: {}", e) );
        Expr { graph : self.clone(), ix }
    }

    fn push_named(&self, op : Op, name : Option<&str>) -> Expr {
        let mut data = self.data.borrow_mut();
        let name = match name {
            Some(n) => naming::unique_name(n, |c| data.names.contains_key(c)),
            None => data.auto_name(op.kind())
        };
        let ix = data.insert(op, &[], name)
            .unwrap_or_else(|e| unreachable!("unique name clashed: {}", e) );
        Expr { graph : self.clone(), ix }
    }

    /// Adds a run-time input. If name is taken, a numeric suffix is appended;
    /// the actual name can be read from the returned expression.
    pub fn placeholder(&self, dtype : DType, name : Option<&str>) -> Expr {
        self.push_named(Op::Placeholder { dtype }, name)
    }

    /// Adds a mutable parameter, set to init when its session is initialized.
    pub fn variable(&self, dtype : DType, init : DVector<f64>, name : Option<&str>) -> Expr {
        self.push_named(Op::Variable { dtype, init }, name)
    }

    pub fn constant(&self, value : DVector<f64>) -> Expr {
        self.push(Op::Const { value }, &[])
    }

    pub fn scalar(&self, value : f64) -> Expr {
        self.constant(DVector::from_element(1, value))
    }

    /// Retrieves an expression by the name of its node.
    pub fn get(&self, name : &str) -> Result<Expr, GraphError> {
        let ix = self.data.borrow().names.get(name).cloned()
            .ok_or_else(|| GraphError::UnknownName(name.to_string()) )?;
        Ok(Expr { graph : self.clone(), ix })
    }

    /// Every variable of the graph, with its initial value.
    pub(crate) fn variables(&self) -> Vec<(NodeIndex, DVector<f64>)> {
        let data = self.data.borrow();
        data.inner.node_indices()
            .filter_map(|ix| match &data.inner[ix].op {
                Op::Variable{ init, .. } => Some((ix, init.clone())),
                _ => None
            })
            .collect()
    }

    /// Serializes the current state of the graph into an immutable snapshot.
    pub fn to_def(&self) -> GraphDef {
        let data = self.data.borrow();
        let nodes = data.inner.node_indices()
            .map(|ix| {
                let node = &data.inner[ix];
                let inputs = data.inputs(ix).into_iter()
                    .map(|i| data.inner[i].name.clone() )
                    .collect();
                NodeDef { name : node.name.clone(), op : node.op.clone(), inputs }
            })
            .collect();
        GraphDef { nodes }
    }

    /// Re-instantiates every node of def into this graph under its original name.
    /// A node whose name is a key of input_map is not imported: its consumers are
    /// wired to the mapped expression instead. Every key of input_map must name a
    /// node of def, and every node of def must carry as many inputs as its
    /// operation takes.
    pub fn import(&self, def : &GraphDef, input_map : &HashMap<String, Expr>) -> Result<(), GraphError> {
        for (name, e) in input_map.iter() {
            if !self.same(&e.graph) {
                return Err(GraphError::ForeignGraph(name.clone()));
            }
            if def.node(name).is_none() {
                return Err(GraphError::UnknownName(name.clone()));
            }
        }
        for node in def.nodes.iter() {
            if !input_map.contains_key(&node.name) {
                node.op.check_arity(node.inputs.len())?;
            }
        }
        let mut data = self.data.borrow_mut();
        let mut resolved : HashMap<&str, NodeIndex> = HashMap::new();
        for node in def.nodes.iter() {
            if let Some(e) = input_map.get(&node.name) {
                resolved.insert(&node.name[..], e.ix);
                continue;
            }
            let mut inputs = Vec::with_capacity(node.inputs.len());
            for input in node.inputs.iter() {
                let ix = resolved.get(&input[..]).cloned()
                    .ok_or_else(|| GraphError::UnknownName(input.clone()) )?;
                inputs.push(ix);
            }
            let ix = data.insert(node.op.clone(), &inputs, node.name.clone())?;
            resolved.insert(&node.name[..], ix);
        }
        Ok(())
    }

}

impl Default for Graph {

    fn default() -> Self {
        Self::new()
    }

}

impl Debug for Graph {

    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Graph(id={}, nodes={})", self.id(), self.node_count())
    }

}

/// Symbolic value: a handle to one node of a graph. Arithmetic between
/// expressions appends new nodes to their graph.
///
/// # Panics
///
/// Binary operations panic if both operands belong to different graphs.
#[derive(Clone)]
pub struct Expr {

    graph : Graph,

    ix : NodeIndex

}

impl Expr {

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn index(&self) -> NodeIndex {
        self.ix
    }

    pub fn name(&self) -> String {
        self.graph.data().inner[self.ix].name.clone()
    }

    pub fn op(&self) -> Op {
        self.graph.data().inner[self.ix].op.clone()
    }

    fn unary(&self, op : Op) -> Expr {
        self.graph.push(op, &[self.ix])
    }

    fn binary(&self, other : &Expr, op : Op) -> Expr {
        assert!(
            self.graph.same(&other.graph),
            "Cannot combine {} and {}: expressions belong to different graphs",
            self.name(),
            other.name()
        );
        self.graph.push(op, &[self.ix, other.ix])
    }

    fn binary_scalar(&self, other : f64, op : Op, scalar_first : bool) -> Expr {
        let c = self.graph.scalar(other);
        if scalar_first {
            c.binary(self, op)
        } else {
            self.binary(&c, op)
        }
    }

    pub fn exp(&self) -> Expr {
        self.unary(Op::Exp)
    }

    pub fn ln(&self) -> Expr {
        self.unary(Op::Ln)
    }

    pub fn square(&self) -> Expr {
        self.unary(Op::Square)
    }

    /// Sum over all entries (a single-element result).
    pub fn sum(&self) -> Expr {
        self.unary(Op::Sum)
    }

    pub fn clamp(&self, lower : Option<f64>, upper : Option<f64>) -> Expr {
        self.unary(Op::Clamp { lower, upper })
    }

    pub fn log_indicator(&self, lower : Option<f64>, upper : Option<f64>) -> Expr {
        self.unary(Op::LogIndicator { lower, upper })
    }

    /// Element-wise sum of all terms, which must share the same graph.
    pub fn add_n(terms : &[Expr]) -> Result<Expr, GraphError> {
        let first = terms.first().ok_or(GraphError::EmptyInput("AddN"))?;
        let mut inputs = Vec::with_capacity(terms.len());
        for t in terms.iter() {
            if !first.graph.same(&t.graph) {
                return Err(GraphError::ForeignGraph(t.name()));
            }
            inputs.push(t.ix);
        }
        Ok(first.graph.push(Op::AddN, &inputs))
    }

}

impl PartialEq for Expr {

    fn eq(&self, other : &Expr) -> bool {
        self.graph.same(&other.graph) && self.ix == other.ix
    }

}

impl Debug for Expr {

    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Expr({})", self.name())
    }

}

impl Display for Expr {

    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }

}

impl Neg for &Expr {

    type Output = Expr;

    fn neg(self) -> Expr {
        self.unary(Op::Neg)
    }

}

impl Neg for Expr {

    type Output = Expr;

    fn neg(self) -> Expr {
        self.unary(Op::Neg)
    }

}

macro_rules! impl_binary {
    ($tr:ident, $method:ident, $op:expr) => {

        impl $tr<&Expr> for &Expr {
            type Output = Expr;
            fn $method(self, rhs : &Expr) -> Expr {
                self.binary(rhs, $op)
            }
        }

        impl $tr<Expr> for Expr {
            type Output = Expr;
            fn $method(self, rhs : Expr) -> Expr {
                self.binary(&rhs, $op)
            }
        }

        impl $tr<&Expr> for Expr {
            type Output = Expr;
            fn $method(self, rhs : &Expr) -> Expr {
                self.binary(rhs, $op)
            }
        }

        impl $tr<Expr> for &Expr {
            type Output = Expr;
            fn $method(self, rhs : Expr) -> Expr {
                self.binary(&rhs, $op)
            }
        }

        impl $tr<f64> for &Expr {
            type Output = Expr;
            fn $method(self, rhs : f64) -> Expr {
                self.binary_scalar(rhs, $op, false)
            }
        }

        impl $tr<f64> for Expr {
            type Output = Expr;
            fn $method(self, rhs : f64) -> Expr {
                self.binary_scalar(rhs, $op, false)
            }
        }

        impl $tr<&Expr> for f64 {
            type Output = Expr;
            fn $method(self, rhs : &Expr) -> Expr {
                rhs.binary_scalar(self, $op, true)
            }
        }

        impl $tr<Expr> for f64 {
            type Output = Expr;
            fn $method(self, rhs : Expr) -> Expr {
                rhs.binary_scalar(self, $op, true)
            }
        }

    };
}

impl_binary!(Add, add, Op::Add);

impl_binary!(Sub, sub, Op::Sub);

impl_binary!(Mul, mul, Op::Mul);

impl_binary!(Div, div, Op::Div);
