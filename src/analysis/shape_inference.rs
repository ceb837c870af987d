//! Module for shape and data type inference (Shape Inference).
//!
//! Traverses the computation graph and determines the shape and data type of
//! the output tensor for each node based on its input shapes and operation type.

use crate::asg::{Asg, AsgError, DType, Node, NodeId, NodeType, Shape};
use log::debug;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ShapeInferenceError {
    #[error("Graph error: {0}")]
    AsgError(#[from] AsgError),

    #[error("Incompatible shapes for operation '{op}': left operand {shape1:?}, right operand {shape2:?}.")]
    IncompatibleShapes {
        op: String,
        shape1: Shape,
        shape2: Shape,
    },

    #[error("Shape information missing for node {0}. \
             The node has not been processed yet or the graph contains a cyclic dependency.")]
    MissingShapeInfo(NodeId),

    #[error("Initial shape not specified for '{0}'. \
             Add the shape to the initial_shapes HashMap when calling ShapeInference::run().")]
    MissingInitialShape(String),

    #[error("Invalid tensor rank for node {node_id}: expected at least {expected}D, got {actual}D.")]
    InvalidRank {
        node_id: NodeId,
        expected: usize,
        actual: usize,
    },

    #[error("Broadcast error: cannot broadcast shapes {0:?} and {1:?} to a common shape.")]
    BroadcastError(Shape, Shape),

    #[error("Cycle detected at node {0}.")]
    CycleDetected(NodeId),
}

type Result<T> = std::result::Result<T, ShapeInferenceError>;

/// Performs shape inference for an ASG.
pub struct ShapeInference;

impl ShapeInference {
    /// Runs shape inference over every node reachable from the graph outputs.
    ///
    /// Modifies the graph in-place, filling in `shape` and `dtype` of each node.
    ///
    /// # Arguments
    /// * `asg` - Graph to analyze.
    /// * `initial_shapes` - Shapes and types of all `Input` nodes, keyed by name.
    pub fn run(asg: &mut Asg, initial_shapes: &HashMap<String, (Shape, DType)>) -> Result<()> {
        let sorted_nodes = Self::topological_sort(asg)?;
        debug!("shape inference over {} nodes of graph {}", sorted_nodes.len(), asg.id);

        for node_id in sorted_nodes {
            let mut node = asg.get_node(node_id)?.clone();

            let (shape, dtype) = Self::infer_node_shape(asg, &node, initial_shapes)?;

            node.shape = Some(shape);
            node.dtype = Some(dtype);
            asg.nodes.insert(node_id, node);
        }

        Ok(())
    }

    /// Shape inference for a single node.
    fn infer_node_shape(
        asg: &Asg,
        node: &Node,
        initial_shapes: &HashMap<String, (Shape, DType)>,
    ) -> Result<(Shape, DType)> {
        match &node.node_type {
            NodeType::Input { name } => initial_shapes
                .get(name)
                .cloned()
                .ok_or_else(|| ShapeInferenceError::MissingInitialShape(name.clone())),

            NodeType::Literal(value) => Ok((value.shape(), DType::F32)),

            NodeType::Subtract(l, r) | NodeType::Divide(l, r) => {
                let (ls, ld) = Self::get_shape_dtype(asg, *l)?;
                let (rs, _) = Self::get_shape_dtype(asg, *r)?;
                let out_shape = Self::broadcast_shapes(&ls, &rs)
                    .ok_or(ShapeInferenceError::BroadcastError(ls, rs))?;
                Ok((out_shape, ld))
            }

            NodeType::Power(base_id, power_id) => {
                let (base_shape, dtype) = Self::get_shape_dtype(asg, *base_id)?;
                let (power_shape, _) = Self::get_shape_dtype(asg, *power_id)?;
                if !power_shape.is_empty() {
                    return Err(ShapeInferenceError::IncompatibleShapes {
                        op: "Power".to_string(),
                        shape1: base_shape,
                        shape2: power_shape,
                    });
                }
                Ok((base_shape, dtype))
            }

            NodeType::Sum(id) => {
                let (_, dtype) = Self::get_shape_dtype(asg, *id)?;
                Ok((vec![], dtype))
            }

            NodeType::Mean { input, keep_dims } => {
                let (shape, dtype) = Self::get_shape_dtype(asg, *input)?;
                if *keep_dims {
                    // Rank is preserved so the mean broadcasts back against the input.
                    Ok((vec![1; shape.len()], dtype))
                } else {
                    Ok((vec![], dtype))
                }
            }

            NodeType::MeanAxis(id, axis) | NodeType::VarianceAxis(id, axis) => {
                let (mut shape, dtype) = Self::get_shape_dtype(asg, *id)?;
                if *axis >= shape.len() {
                    return Err(ShapeInferenceError::InvalidRank {
                        node_id: node.id,
                        expected: axis + 1,
                        actual: shape.len(),
                    });
                }
                shape.remove(*axis);
                Ok((shape, dtype))
            }
        }
    }

    /// NumPy broadcasting of two shapes. Trailing axes are aligned; an axis of
    /// length 1 stretches to the other. Returns `None` when the shapes conflict.
    pub fn broadcast_shapes(a: &[usize], b: &[usize]) -> Option<Shape> {
        let rank = a.len().max(b.len());
        let mut out = vec![0; rank];
        for i in 0..rank {
            let da = if i < rank - a.len() { 1 } else { a[i - (rank - a.len())] };
            let db = if i < rank - b.len() { 1 } else { b[i - (rank - b.len())] };
            out[i] = match (da, db) {
                (x, y) if x == y => x,
                (1, y) => y,
                (x, 1) => x,
                _ => return None,
            };
        }
        Some(out)
    }

    /// Returns the already computed shape and type for a node.
    fn get_shape_dtype(asg: &Asg, node_id: NodeId) -> Result<(Shape, DType)> {
        let node = asg.get_node(node_id)?;
        match (&node.shape, &node.dtype) {
            (Some(s), Some(d)) => Ok((s.clone(), *d)),
            _ => Err(ShapeInferenceError::MissingShapeInfo(node_id)),
        }
    }

    /// Topological sort of the nodes reachable from the graph outputs.
    /// Returns node IDs in an order suitable for computation.
    pub fn topological_sort(asg: &Asg) -> Result<Vec<NodeId>> {
        let mut sorted = Vec::new();
        let mut visited = HashSet::new();
        let mut in_progress = HashSet::new();
        // Every output is a root, not just the first one.
        for output_id in &asg.outputs {
            Self::build_sorted_graph(*output_id, asg, &mut visited, &mut in_progress, &mut sorted)?;
        }
        Ok(sorted)
    }

    fn build_sorted_graph(
        node_id: NodeId,
        asg: &Asg,
        visited: &mut HashSet<NodeId>,
        in_progress: &mut HashSet<NodeId>,
        sorted: &mut Vec<NodeId>,
    ) -> Result<()> {
        if visited.contains(&node_id) {
            return Ok(());
        }
        if !in_progress.insert(node_id) {
            return Err(ShapeInferenceError::CycleDetected(node_id));
        }

        let node = asg.get_node(node_id)?;
        for input_id in node.node_type.operands() {
            Self::build_sorted_graph(input_id, asg, visited, in_progress, sorted)?;
        }

        in_progress.remove(&node_id);
        visited.insert(node_id);
        sorted.push(node_id);
        Ok(())
    }
}
