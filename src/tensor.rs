//! Module defining `Tensor` and `GraphContext`.
//!
//! `Tensor` holds no data. It is a lightweight handle (a "symbolic variable")
//! pointing at a node of the Abstract Semantic Graph (ASG).
//!
//! Every operation on tensors (`-`, `pow`, `var_axis`, ...) adds a node to the
//! graph instead of computing anything. `GraphContext` owns the graph being built.

use crate::asg::{Asg, NodeId, NodeType, Value};
use ndarray::ArrayD;
use std::cell::RefCell;
use std::ops::{Div, Sub};
use std::rc::Rc;

/// Owns the graph under construction.
///
/// Shared between tensor handles as `Rc<RefCell<GraphContext>>`.
#[derive(Debug, Clone)]
pub struct GraphContext {
    main_graph: Asg,
}

impl GraphContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self {
            main_graph: Asg::new(0, Some("main".to_string())),
        }
    }

    pub fn main_graph_mut(&mut self) -> &mut Asg {
        &mut self.main_graph
    }

    pub fn main_graph(&self) -> &Asg {
        &self.main_graph
    }
}

impl Default for GraphContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Symbolic handle of a node in the graph.
///
/// Any operation on it appends a new node to the graph of `context`. Both
/// operands of a binary operation must come from the same context.
#[derive(Debug, Clone)]
pub struct Tensor {
    /// ID of the node this tensor stands for.
    pub node_id: NodeId,
    /// Shared reference to the context the graph is built in.
    pub context: Rc<RefCell<GraphContext>>,
}

impl Tensor {
    /// Creates an input node and registers it in the graph inputs.
    /// Real data is fed to inputs by name at execution time.
    pub fn new_input(context: &Rc<RefCell<GraphContext>>, name: &str) -> Self {
        let mut ctx = context.borrow_mut();
        let graph = ctx.main_graph_mut();

        let node_id = graph.add_node(
            Some(name.to_string()),
            NodeType::Input {
                name: name.to_string(),
            },
        );
        graph.inputs.push(node_id);

        Self {
            node_id,
            context: Rc::clone(context),
        }
    }

    /// Creates a constant node embedding `data` into the graph.
    pub fn new_literal(context: &Rc<RefCell<GraphContext>>, data: ArrayD<f32>, name: &str) -> Self {
        let node_id = context.borrow_mut().main_graph_mut().add_node(
            Some(name.to_string()),
            NodeType::Literal(Value::Tensor(data)),
        );
        Self {
            node_id,
            context: Rc::clone(context),
        }
    }

    /// Creates a scalar constant node.
    pub fn scalar(context: &Rc<RefCell<GraphContext>>, value: f32) -> Self {
        let node_id = context
            .borrow_mut()
            .main_graph_mut()
            .add_node(None, NodeType::Literal(Value::ScalarF32(value)));
        Self {
            node_id,
            context: Rc::clone(context),
        }
    }

    fn apply(&self, node_type: NodeType) -> Self {
        let node_id = self
            .context
            .borrow_mut()
            .main_graph_mut()
            .add_node(None, node_type);
        Self {
            node_id,
            context: Rc::clone(&self.context),
        }
    }

    // --- Elementwise ---

    /// Raises every element to `power`, which must be a scalar node.
    pub fn pow(&self, power: &Tensor) -> Self {
        self.apply(NodeType::Power(self.node_id, power.node_id))
    }

    pub fn square(&self) -> Self {
        let two = Tensor::scalar(&self.context, 2.0);
        self.pow(&two)
    }

    // --- Reductions ---

    /// Sum over all elements.
    pub fn sum(&self) -> Self {
        self.apply(NodeType::Sum(self.node_id))
    }

    /// Mean over all elements, as a scalar.
    pub fn mean(&self) -> Self {
        self.apply(NodeType::Mean {
            input: self.node_id,
            keep_dims: false,
        })
    }

    /// Mean over all elements with every axis kept at length 1,
    /// so the result broadcasts back against `self`.
    pub fn mean_keepdims(&self) -> Self {
        self.apply(NodeType::Mean {
            input: self.node_id,
            keep_dims: true,
        })
    }

    /// Mean along `axis`; the axis is removed.
    pub fn mean_axis(&self, axis: usize) -> Self {
        self.apply(NodeType::MeanAxis(self.node_id, axis))
    }

    /// Population variance along `axis`; the axis is removed.
    pub fn var_axis(&self, axis: usize) -> Self {
        self.apply(NodeType::VarianceAxis(self.node_id, axis))
    }
}

// Operator overloads for `&a - &b` and `&a / &b` syntax.

impl Sub<&Tensor> for &Tensor {
    type Output = Tensor;
    fn sub(self, rhs: &Tensor) -> Self::Output {
        self.apply(NodeType::Subtract(self.node_id, rhs.node_id))
    }
}

impl Div<&Tensor> for &Tensor {
    type Output = Tensor;
    fn div(self, rhs: &Tensor) -> Self::Output {
        self.apply(NodeType::Divide(self.node_id, rhs.node_id))
    }
}
