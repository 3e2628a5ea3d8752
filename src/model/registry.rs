use std::cell::{Cell, RefCell};
use std::rc::Rc;
use crate::config::DType;
use crate::distr::Node;
use crate::error::ModelError;
use crate::graph::Graph;

thread_local! {

    static CURRENT : RefCell<Option<Rc<Tracker>>> = RefCell::new(None);

}

/// Structural state of a model while it is open: the graph its nodes are built
/// into and the ordered list of those nodes. A tracker is shared between the
/// model that owns it and the registry slot for as long as the model is open.
#[derive(Debug)]
pub struct Tracker {

    name : String,

    dtype : DType,

    graph : Graph,

    components : RefCell<Vec<Node>>,

    open : Cell<bool>

}

impl Tracker {

    pub fn new(name : &str, dtype : DType) -> Self {
        Self {
            name : name.to_string(),
            dtype,
            graph : Graph::new(),
            components : RefCell::new(Vec::new()),
            open : Cell::new(false)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Tracked nodes, in creation order.
    pub fn components(&self) -> Vec<Node> {
        self.components.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.components.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.borrow().is_empty()
    }

    pub fn contains(&self, node : &Node) -> bool {
        self.components.borrow().iter().any(|n| n == node )
    }

    pub fn is_open(&self) -> bool {
        self.open.get()
    }

    pub(crate) fn push(&self, node : Node) {
        self.components.borrow_mut().push(node);
    }

    pub(crate) fn remove(&self, node : &Node) -> Result<(), ModelError> {
        let mut comps = self.components.borrow_mut();
        let pos = comps.iter().position(|n| n == node )
            .ok_or_else(|| ModelError::InvalidArgument(format!("{} is not tracked by model {}", node.name(), self.name)) )?;
        comps.remove(pos);
        Ok(())
    }

}

/// Marks tracker as the single open model of this thread.
pub fn open(tracker : Rc<Tracker>) -> Result<(), ModelError> {
    CURRENT.with(|slot| {
        let mut slot = slot.borrow_mut();
        if slot.is_some() {
            return Err(ModelError::Nesting);
        }
        tracker.open.set(true);
        *slot = Some(tracker);
        Ok(())
    })
}

/// Clears the open model, if any.
pub fn close() {
    CURRENT.with(|slot| {
        if let Some(tracker) = slot.borrow_mut().take() {
            tracker.open.set(false);
        }
    });
}

pub fn current() -> Result<Rc<Tracker>, ModelError> {
    CURRENT.with(|slot| slot.borrow().clone() ).ok_or(ModelError::NoActiveModel)
}

pub fn is_open() -> bool {
    CURRENT.with(|slot| slot.borrow().is_some() )
}

/// Appends node to the components of the open model.
pub fn track(node : Node) -> Result<(), ModelError> {
    current()?.push(node);
    Ok(())
}

/// Removes node from the components of the open model.
pub fn untrack(node : &Node) -> Result<(), ModelError> {
    current()?.remove(node)
}
