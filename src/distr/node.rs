use std::fmt::{self, Debug, Display};
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use crate::config::DType;
use crate::error::ModelError;
use crate::graph::Expr;
use crate::model::registry;
use crate::naming;
use super::{Distribution, Param, Support};

static NODE_IDS : AtomicUsize = AtomicUsize::new(0);

/// Process-wide identity of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

struct NodeInner {
    id : NodeId,
    name : String,
    dtype : DType,
    value : Expr,
    distribution : Box<dyn Distribution>
}

/// A random variable of a model: a placeholder in the model graph standing for
/// the variable's value, plus the distribution of that value. Clones share
/// the same node, and equality and hashing follow node identity, never values
/// (two nodes with identical distributions are different variables).
#[derive(Clone)]
pub struct Node {
    inner : Rc<NodeInner>
}

impl Node {

    /// Creates a node in the graph of the currently open model, and tracks it
    /// there. Fails with NoActiveModel if no model is open.
    pub fn create<D>(name : Option<&str>, distribution : D) -> Result<Node, ModelError>
    where
        D : Distribution + 'static
    {
        let tracker = registry::current()?;
        let base = match name {
            Some(n) => n.to_string(),
            None => naming::generate_name(distribution.kind())
        };
        let dtype = tracker.dtype();
        let value = tracker.graph().placeholder(dtype, Some(&base));
        let inner = NodeInner {
            id : NodeId(NODE_IDS.fetch_add(1, Ordering::Relaxed)),
            name : value.name(),
            dtype,
            value,
            distribution : Box::new(distribution)
        };
        let node = Node { inner : Rc::new(inner) };
        registry::track(node.clone())?;
        Ok(node)
    }

    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn dtype(&self) -> DType {
        self.inner.dtype
    }

    /// Placeholder standing for the value of this variable in the model graph.
    pub fn value(&self) -> &Expr {
        &self.inner.value
    }

    pub fn distribution(&self) -> &dyn Distribution {
        self.inner.distribution.as_ref()
    }

    pub fn kind(&self) -> &'static str {
        self.inner.distribution.kind()
    }

    /// Appends the log-density of this node's value to the model graph.
    pub fn logp(&self) -> Expr {
        self.inner.distribution.logp(&self.inner.value)
    }

    /// Appends the density of this node's value to the model graph. Like cdf(.),
    /// this can be called after the model is closed, in which case the new
    /// nodes only reach the snapshot taken at the next close.
    pub fn pdf(&self) -> Result<Expr, ModelError> {
        self.inner.distribution.pdf(&self.inner.value)
    }

    pub fn cdf<L>(&self, limit : L) -> Result<Expr, ModelError>
    where
        L : Into<Param>
    {
        let limit = limit.into().resolve(self.inner.value.graph())?;
        self.inner.distribution.cdf(&self.inner.value, &limit)
    }

    pub fn support(&self) -> Support {
        self.inner.distribution.support()
    }

}

impl PartialEq for Node {

    fn eq(&self, other : &Node) -> bool {
        self.inner.id == other.inner.id
    }

}

impl Eq for Node { }

impl Hash for Node {

    fn hash<H : Hasher>(&self, state : &mut H) {
        self.inner.id.hash(state);
    }

}

impl Debug for Node {

    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({} ~ {:?})", self.inner.name, self.inner.distribution)
    }

}

impl Display for Node {

    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner.name)
    }

}
