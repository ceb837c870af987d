//! Backend executing an ASG on the CPU.
//!
//! Walks the graph in topological order and evaluates each node with `ndarray`.
//! Division follows IEEE-754: a zero denominator yields `inf` or `NaN`, never an error.

use super::backend::{Backend, Memo, RuntimeError};
use crate::analysis::shape_inference::ShapeInference;
use crate::asg::{Asg, NodeId, NodeType, Value};
use log::{debug, trace};
use ndarray::{ArrayD, Axis, IxDyn, Zip};
use std::collections::HashMap;

/// Execution state for one graph run.
struct ExecutionContext<'a> {
    asg: &'a Asg,
    /// Values computed so far, keyed by (AsgId, NodeId).
    memo: Memo<Value>,
}

impl<'a> ExecutionContext<'a> {
    fn new(asg: &'a Asg, initial_memo: Memo<Value>) -> Self {
        Self {
            asg,
            memo: initial_memo,
        }
    }

    /// Recursively computes the value of a node, memoizing the result.
    fn evaluate_node(&mut self, node_id: NodeId) -> Result<Value, RuntimeError> {
        let asg_id = self.asg.id;
        if let Some(value) = self.memo.get(&(asg_id, node_id)) {
            return Ok(value.clone());
        }

        let asg: &'a Asg = self.asg;
        let node = asg
            .nodes
            .get(&node_id)
            .ok_or(RuntimeError::NodeNotFound(node_id, asg_id))?;
        trace!("evaluating node {} {:?}", node_id, node.node_type);

        let result = match &node.node_type {
            NodeType::Input { name } => {
                return Err(RuntimeError::MissingInput(name.clone(), node.id));
            }
            NodeType::Literal(value) => Ok(value.clone()),

            NodeType::Subtract(l, r) => {
                let (lhs, rhs) = self.evaluate_pair(*l, *r)?;
                elementwise(lhs, rhs, "Subtract", |a, b| a - b)
            }
            NodeType::Divide(l, r) => {
                let (lhs, rhs) = self.evaluate_pair(*l, *r)?;
                elementwise(lhs, rhs, "Divide", |a, b| a / b)
            }
            NodeType::Power(base, exp) => {
                let (base, exp) = self.evaluate_pair(*base, *exp)?;
                op_power(base, exp)
            }

            NodeType::Sum(op) => {
                let operand = self.evaluate_node(*op)?;
                op_sum(operand)
            }
            NodeType::Mean { input, keep_dims } => {
                let operand = self.evaluate_node(*input)?;
                op_mean(operand, *keep_dims)
            }
            NodeType::MeanAxis(op, axis) => {
                let operand = self.evaluate_node(*op)?;
                op_mean_axis(operand, *axis)
            }
            NodeType::VarianceAxis(op, axis) => {
                let operand = self.evaluate_node(*op)?;
                op_variance_axis(operand, *axis)
            }
        }?;

        self.memo.insert((asg_id, node_id), result.clone());
        Ok(result)
    }

    fn evaluate_pair(&mut self, l: NodeId, r: NodeId) -> Result<(Value, Value), RuntimeError> {
        Ok((self.evaluate_node(l)?, self.evaluate_node(r)?))
    }
}

pub struct CpuBackend;

impl CpuBackend {
    pub fn new() -> Self { Self }
}

impl Default for CpuBackend {
    fn default() -> Self { Self::new() }
}

impl Backend for CpuBackend {
    type DeviceData = Value;

    fn load_data(
        &self,
        data: &HashMap<String, Value>,
    ) -> Result<HashMap<String, Self::DeviceData>, RuntimeError> {
        Ok(data.clone())
    }

    fn run(
        &self,
        main_asg: &Asg,
        initial_memo: Memo<Self::DeviceData>,
    ) -> Result<(Vec<Self::DeviceData>, Memo<Self::DeviceData>), RuntimeError> {
        let sorted_nodes = ShapeInference::topological_sort(main_asg)
            .map_err(|e| RuntimeError::ComputationError(format!("Topological sort failed: {}", e)))?;
        debug!("cpu backend: running graph {} ({} nodes)", main_asg.id, sorted_nodes.len());

        let mut context = ExecutionContext::new(main_asg, initial_memo);
        for node_id in sorted_nodes {
            context.evaluate_node(node_id)?;
        }

        let mut results = Vec::with_capacity(main_asg.outputs.len());
        for output_node_id in &main_asg.outputs {
            let result = context
                .memo
                .get(&(main_asg.id, *output_node_id))
                .ok_or(RuntimeError::NodeNotFound(*output_node_id, main_asg.id))?
                .clone();
            results.push(result);
        }
        Ok((results, context.memo))
    }

    fn retrieve_data(&self, device_data: &[Self::DeviceData]) -> Result<Vec<Value>, RuntimeError> {
        Ok(device_data.to_vec())
    }
}

/// Applies `f` elementwise after broadcasting both operands to a common shape.
fn elementwise(
    lhs: Value,
    rhs: Value,
    op: &str,
    f: impl Fn(f32, f32) -> f32,
) -> Result<Value, RuntimeError> {
    let a = lhs.into_array();
    let b = rhs.into_array();
    let shape = ShapeInference::broadcast_shapes(a.shape(), b.shape()).ok_or_else(|| {
        RuntimeError::ShapeError(format!(
            "{}: cannot broadcast {:?} and {:?}",
            op,
            a.shape(),
            b.shape()
        ))
    })?;
    let shape = IxDyn(&shape);
    let av = a
        .broadcast(shape.clone())
        .ok_or_else(|| RuntimeError::ShapeError(format!("{}: cannot broadcast {:?}", op, a.shape())))?;
    let bv = b
        .broadcast(shape)
        .ok_or_else(|| RuntimeError::ShapeError(format!("{}: cannot broadcast {:?}", op, b.shape())))?;
    Ok(Value::Tensor(Zip::from(av).and(bv).map_collect(|&x, &y| f(x, y))))
}

fn op_power(base: Value, power: Value) -> Result<Value, RuntimeError> {
    let a = base.into_array();
    let p = power.into_array();
    if p.ndim() != 0 {
        return Err(RuntimeError::TypeError {
            expected: "scalar exponent".to_string(),
            actual: format!("tensor of shape {:?}", p.shape()),
        });
    }
    let exponent = p.iter().next().copied().ok_or_else(|| RuntimeError::ComputationError("empty exponent".to_string()))?;
    if exponent.fract() == 0.0 && exponent.abs() <= i32::MAX as f32 {
        let n = exponent as i32;
        Ok(Value::Tensor(a.mapv(|x| x.powi(n))))
    } else {
        Ok(Value::Tensor(a.mapv(|x| x.powf(exponent))))
    }
}

fn op_sum(operand: Value) -> Result<Value, RuntimeError> {
    let a = operand.into_array();
    Ok(Value::Tensor(ndarray::arr0(a.sum()).into_dyn()))
}

fn op_mean(operand: Value, keep_dims: bool) -> Result<Value, RuntimeError> {
    let a = operand.into_array();
    // Mean of nothing is 0/0.
    let mean = a.mean().unwrap_or(f32::NAN);
    if keep_dims {
        Ok(Value::Tensor(ArrayD::from_elem(IxDyn(&vec![1; a.ndim()]), mean)))
    } else {
        Ok(Value::Tensor(ndarray::arr0(mean).into_dyn()))
    }
}

fn check_axis(a: &ArrayD<f32>, axis: usize) -> Result<(), RuntimeError> {
    if axis >= a.ndim() {
        return Err(RuntimeError::ShapeError(format!(
            "axis {} out of range for tensor of shape {:?}",
            axis,
            a.shape()
        )));
    }
    Ok(())
}

fn nan_without_axis(a: &ArrayD<f32>, axis: usize) -> ArrayD<f32> {
    let mut shape = a.shape().to_vec();
    shape.remove(axis);
    ArrayD::from_elem(IxDyn(&shape), f32::NAN)
}

fn op_mean_axis(operand: Value, axis: usize) -> Result<Value, RuntimeError> {
    let a = operand.into_array();
    check_axis(&a, axis)?;
    let mean = a
        .mean_axis(Axis(axis))
        .unwrap_or_else(|| nan_without_axis(&a, axis));
    Ok(Value::Tensor(mean))
}

fn op_variance_axis(operand: Value, axis: usize) -> Result<Value, RuntimeError> {
    let a = operand.into_array();
    check_axis(&a, axis)?;
    if a.len_of(Axis(axis)) == 0 {
        return Ok(Value::Tensor(nan_without_axis(&a, axis)));
    }
    Ok(Value::Tensor(a.var_axis(Axis(axis), 0.0)))
}
