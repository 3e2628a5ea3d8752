use serde::{Serialize, Deserialize};
use super::Op;
use crate::error::GraphError;

/// Serialized form of a single graph node. Inputs are referred to by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDef {

    pub name : String,

    pub op : Op,

    pub inputs : Vec<String>

}

/// Snapshot of a graph. Nodes are kept in an order where every node comes
/// after its inputs, so a snapshot can be re-instantiated in a single pass
/// (see Graph::import).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDef {

    pub nodes : Vec<NodeDef>

}

impl GraphDef {

    pub fn node(&self, name : &str) -> Option<&NodeDef> {
        self.nodes.iter().find(|n| n.name == name )
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn to_json(&self) -> Result<String, GraphError> {
        Ok(serde_json::to_string_pretty(&self)?)
    }

    pub fn from_json(s : &str) -> Result<Self, GraphError> {
        Ok(serde_json::from_str(s)?)
    }

}
