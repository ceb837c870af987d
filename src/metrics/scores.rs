//! Regression scores in graph paradigm.
//!
//! Like the loss functions of a graph engine, these are plain Rust functions
//! that take symbolic `Tensor` descriptors and add the nodes needed to compute
//! the score. Nothing is computed until a backend runs the graph.
//!
//! Neither score guards its denominator: a constant target yields `NaN` or
//! `-inf` from the backend's IEEE-754 division.

use super::MultiOutput;
use crate::tensor::Tensor;

/// Explained variance score, one value per trailing dimension.
///
/// Formula: `1 - Var(y_true - y_pred, axis=0) / Var(y_true, axis=0)`, with
/// population variance (ddof = 0).
///
/// # Arguments
///
/// * `y_true` - Symbolic `Tensor` with true values, shape `(N, ...)`.
/// * `y_pred` - Symbolic `Tensor` with predictions, same shape.
///
/// # Returns
///
/// Symbolic `Tensor` of shape `(...)`: for `(N, M)` inputs a vector of `M`
/// scores, for `(N,)` inputs a scalar.
pub fn explained_variance_score(y_true: &Tensor, y_pred: &Tensor) -> Tensor {
    let residual_var = (y_true - y_pred).var_axis(0);
    let target_var = y_true.var_axis(0);
    let one = Tensor::scalar(&y_true.context, 1.0);
    &one - &(&residual_var / &target_var)
}

/// Explained variance with an explicit output mode.
///
/// `MultiOutput::RawValues` is [`explained_variance_score`];
/// `MultiOutput::UniformAverage` averages the per-dimension scores into a scalar.
pub fn explained_variance_score_with(y_true: &Tensor, y_pred: &Tensor, multioutput: MultiOutput) -> Tensor {
    let raw = explained_variance_score(y_true, y_pred);
    match multioutput {
        MultiOutput::RawValues => raw,
        MultiOutput::UniformAverage => raw.mean(),
    }
}

/// R² (coefficient of determination) over all elements.
///
/// Formula: `1 - sum((y_true - y_pred)^2) / sum((y_true - mean(y_true))^2)`,
/// where both sums and the mean run over every element, whatever the rank.
///
/// # Returns
///
/// Symbolic scalar `Tensor`.
pub fn r2_score(y_true: &Tensor, y_pred: &Tensor) -> Tensor {
    let ss_res = (y_true - y_pred).square().sum();
    let ss_tot = (y_true - &y_true.mean_keepdims()).square().sum();
    let one = Tensor::scalar(&y_true.context, 1.0);
    &one - &(&ss_res / &ss_tot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asg::{NodeType, Value};
    use crate::runtime::backend::{Backend, Memo};
    use crate::runtime::cpu_backend::CpuBackend;
    use crate::tensor::GraphContext;
    use ndarray::{arr1, arr2, ArrayD};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn eval(
        score: fn(&Tensor, &Tensor) -> Tensor,
        y_true: ArrayD<f32>,
        y_pred: ArrayD<f32>,
    ) -> ArrayD<f32> {
        let context = Rc::new(RefCell::new(GraphContext::new()));
        let t = Tensor::new_input(&context, "y_true");
        let p = Tensor::new_input(&context, "y_pred");
        let out = score(&t, &p);

        let mut graph = context.borrow().main_graph().clone();
        graph.set_output(out.node_id);

        let mut memo = Memo::new();
        memo.insert((graph.id, t.node_id), Value::Tensor(y_true));
        memo.insert((graph.id, p.node_id), Value::Tensor(y_pred));
        let (outputs, _) = CpuBackend::new().run(&graph, memo).unwrap();
        outputs[0].clone().into_array()
    }

    #[test]
    fn test_perfect_prediction_scores_one() {
        let y = arr1(&[1.0f32, 2.0, 3.0, 4.0]).into_dyn();
        let r2 = eval(r2_score, y.clone(), y.clone());
        let ev = eval(explained_variance_score, y.clone(), y);
        assert_eq!(r2.ndim(), 0);
        assert_eq!(ev.ndim(), 0);
        assert!((r2.sum() - 1.0).abs() < 1e-6);
        assert!((ev.sum() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_mean_prediction_scores_zero() {
        let y = arr1(&[1.0f32, 2.0, 3.0, 4.0]).into_dyn();
        let mean = arr1(&[2.5f32; 4]).into_dyn();
        let r2 = eval(r2_score, y, mean);
        assert!(r2.sum().abs() < 1e-6);
    }

    #[test]
    fn test_explained_variance_is_per_column() {
        let y = arr2(&[[1.0f32, 2.0], [3.0, 4.0]]).into_dyn();
        let ev = eval(explained_variance_score, y.clone(), y);
        assert_eq!(ev.shape(), &[2]);
        assert!(ev.iter().all(|v| (v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_explained_variance_ignores_constant_offset() {
        // A constant bias leaves the residual variance at zero.
        let y = arr1(&[1.0f32, 2.0, 3.0, 4.0]).into_dyn();
        let shifted = y.mapv(|v| v + 10.0);
        let ev = eval(explained_variance_score, y.clone(), shifted.clone());
        let r2 = eval(r2_score, y, shifted);
        assert!((ev.sum() - 1.0).abs() < 1e-6);
        assert!(r2.sum() < 0.0);
    }

    #[test]
    fn test_uniform_average_collapses_columns() {
        let y = arr2(&[[1.0f32, 1.0], [2.0, 3.0], [3.0, 5.0]]).into_dyn();
        let p = arr2(&[[1.0f32, 2.0], [2.0, 3.0], [3.0, 4.0]]).into_dyn();
        let raw = eval(explained_variance_score, y.clone(), p.clone());
        let avg = eval(
            |t, p| explained_variance_score_with(t, p, MultiOutput::UniformAverage),
            y,
            p,
        );
        assert_eq!(avg.ndim(), 0);
        assert!((avg.sum() - raw.mean().unwrap()).abs() < 1e-6);
    }

    #[test]
    fn test_r2_uses_global_mean() {
        let context = Rc::new(RefCell::new(GraphContext::new()));
        let t = Tensor::new_input(&context, "y_true");
        let p = Tensor::new_input(&context, "y_pred");
        r2_score(&t, &p);

        let ctx = context.borrow();
        let graph = ctx.main_graph();
        assert!(graph
            .nodes
            .values()
            .any(|n| n.node_type == NodeType::Mean { input: t.node_id, keep_dims: true }));
        assert!(!graph.nodes.values().any(|n| matches!(n.node_type, NodeType::VarianceAxis(..))));
    }
}
