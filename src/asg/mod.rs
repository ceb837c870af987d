//! ASG: Abstract Semantic Graph.
//!
//! The graph is the only thing score functions produce. Nodes reference their
//! operands by `NodeId`; execution is left to a [`Backend`](crate::runtime::backend::Backend).

use ndarray::ArrayD;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Node identifier.
pub type NodeId = usize;
/// Graph identifier.
pub type AsgId = usize;
/// Tensor shape. An empty shape is a scalar.
pub type Shape = Vec<usize>;

pub type AsgResult<T> = std::result::Result<T, AsgError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AsgError {
    #[error("Node with ID {0} not found")]
    NodeNotFound(NodeId),
    #[error("Graph serialization failed: {0}")]
    Serialization(String),
}

/// Element type of a node. The CPU engine stores everything as `f32`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DType {
    F32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Node ID (duplicates the HashMap key for convenience)
    pub id: NodeId,
    pub name: Option<String>,
    pub node_type: NodeType,
    pub shape: Option<Shape>,
    pub dtype: Option<DType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeType {
    // Data
    Input { name: String },
    Literal(Value),

    // Elementwise binary, NumPy broadcasting
    Subtract(NodeId, NodeId),
    Divide(NodeId, NodeId),
    /// Tensor base raised to a scalar exponent.
    Power(NodeId, NodeId),

    // Reductions
    /// Sum over all elements, result is a scalar.
    Sum(NodeId),
    /// Mean over all elements. With `keep_dims` every axis is kept with length 1.
    Mean { input: NodeId, keep_dims: bool },
    /// Mean along one axis, the axis is removed.
    MeanAxis(NodeId, usize),
    /// Population variance (ddof = 0) along one axis, the axis is removed.
    VarianceAxis(NodeId, usize),
}

impl NodeType {
    /// Operand IDs this node reads, in evaluation order.
    pub fn operands(&self) -> Vec<NodeId> {
        match self {
            NodeType::Input { .. } | NodeType::Literal(_) => vec![],
            NodeType::Subtract(a, b)
            | NodeType::Divide(a, b)
            | NodeType::Power(a, b) => vec![*a, *b],
            NodeType::Sum(a)
            | NodeType::Mean { input: a, .. }
            | NodeType::MeanAxis(a, _)
            | NodeType::VarianceAxis(a, _) => vec![*a],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Tensor(ArrayD<f32>),
    ScalarF32(f32),
}

impl Value {
    /// Views the value as a tensor; a scalar becomes a 0-dimensional array.
    pub fn into_array(self) -> ArrayD<f32> {
        match self {
            Value::Tensor(arr) => arr,
            Value::ScalarF32(v) => ndarray::arr0(v).into_dyn(),
        }
    }

    pub fn shape(&self) -> Shape {
        match self {
            Value::Tensor(arr) => arr.shape().to_vec(),
            Value::ScalarF32(_) => vec![],
        }
    }
}

impl From<ArrayD<f32>> for Value {
    fn from(arr: ArrayD<f32>) -> Self {
        Value::Tensor(arr)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asg {
    pub id: AsgId,
    pub name: Option<String>,
    pub nodes: HashMap<NodeId, Node>,
    pub inputs: Vec<NodeId>,
    pub outputs: Vec<NodeId>,
}

impl Asg {
    pub fn new(id: AsgId, name: Option<String>) -> Self {
        Self { id, name, nodes: HashMap::new(), inputs: vec![], outputs: vec![] }
    }

    pub fn add_node(&mut self, name: Option<String>, node_type: NodeType) -> NodeId {
        let new_id = self.nodes.len();
        let mut node = Node { id: new_id, name, node_type, shape: None, dtype: None };

        // Literals know their shape up front so inference never asks for it.
        if let NodeType::Literal(value) = &node.node_type {
            node.shape = Some(value.shape());
            node.dtype = Some(DType::F32);
        }

        self.nodes.insert(new_id, node);
        new_id
    }

    pub fn set_outputs(&mut self, outputs: Vec<NodeId>) { self.outputs = outputs; }

    /// Shortcut for single-output graphs.
    pub fn set_output(&mut self, output: NodeId) {
        self.set_outputs(vec![output]);
    }

    pub fn get_node(&self, id: NodeId) -> AsgResult<&Node> {
        self.nodes.get(&id).ok_or(AsgError::NodeNotFound(id))
    }

    /// Serializes the graph, literals included, to pretty JSON.
    pub fn to_json(&self) -> AsgResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| AsgError::Serialization(e.to_string()))
    }

    pub fn from_json(json: &str) -> AsgResult<Self> {
        serde_json::from_str(json).map_err(|e| AsgError::Serialization(e.to_string()))
    }
}
