//! Builds both regression scores into one graph and runs it on a backend.

use super::scores::{explained_variance_score_with, r2_score};
use super::MultiOutput;
use crate::analysis::shape_inference::{ShapeInference, ShapeInferenceError};
use crate::asg::{Asg, DType, Value};
use crate::runtime::backend::{Backend, Memo, RuntimeError};
use crate::tensor::{GraphContext, Tensor};
use log::debug;
use ndarray::ArrayD;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use thiserror::Error;

/// Input name of the ground-truth tensor.
pub const Y_TRUE: &str = "y_true";
/// Input name of the prediction tensor.
pub const Y_PRED: &str = "y_pred";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("Shape inference failed: {0}")]
    ShapeInference(#[from] ShapeInferenceError),

    #[error("Execution failed: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("Unexpected graph output: {0}")]
    UnexpectedOutput(String),
}

/// Scores of one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionScores {
    /// Per trailing dimension with `MultiOutput::RawValues`, 0-dimensional otherwise.
    pub explained_variance: ArrayD<f32>,
    pub r2: f32,
}

/// Graph computing explained variance and R² of `y_true` / `y_pred` inputs.
///
/// The graph is built once; each [`evaluate`](ScoreGraph::evaluate) call
/// infers shapes for the data it gets and runs a fresh copy.
#[derive(Debug, Clone)]
pub struct ScoreGraph {
    context: Rc<RefCell<GraphContext>>,
    y_true: Tensor,
    y_pred: Tensor,
    multioutput: MultiOutput,
}

impl ScoreGraph {
    pub fn new(multioutput: MultiOutput) -> Self {
        let context = Rc::new(RefCell::new(GraphContext::new()));
        let y_true = Tensor::new_input(&context, Y_TRUE);
        let y_pred = Tensor::new_input(&context, Y_PRED);

        let explained_variance = explained_variance_score_with(&y_true, &y_pred, multioutput);
        let r2 = r2_score(&y_true, &y_pred);
        context
            .borrow_mut()
            .main_graph_mut()
            .set_outputs(vec![explained_variance.node_id, r2.node_id]);
        debug!(
            "built score graph with {} nodes ({:?})",
            context.borrow().main_graph().nodes.len(),
            multioutput
        );

        Self {
            context,
            y_true,
            y_pred,
            multioutput,
        }
    }

    /// Rebuilds the graph with another output mode.
    pub fn with_multioutput(self, multioutput: MultiOutput) -> Self {
        Self::new(multioutput)
    }

    pub fn multioutput(&self) -> MultiOutput {
        self.multioutput
    }

    /// Copy of the built graph; outputs are `[explained_variance, r2]`.
    pub fn graph(&self) -> Asg {
        self.context.borrow().main_graph().clone()
    }

    /// Runs the score graph on `backend`.
    ///
    /// `y_true` and `y_pred` must have broadcast-compatible shapes; a mismatch is
    /// reported by shape inference before anything executes. Constant targets
    /// produce non-finite scores, not an error.
    pub fn evaluate<B: Backend>(
        &self,
        backend: &B,
        y_true: &ArrayD<f32>,
        y_pred: &ArrayD<f32>,
    ) -> Result<RegressionScores, EvalError> {
        let mut graph = self.graph();
        let shapes = HashMap::from([
            (Y_TRUE.to_string(), (y_true.shape().to_vec(), DType::F32)),
            (Y_PRED.to_string(), (y_pred.shape().to_vec(), DType::F32)),
        ]);
        ShapeInference::run(&mut graph, &shapes)?;
        debug!("evaluating scores for y_true {:?}, y_pred {:?}", y_true.shape(), y_pred.shape());

        let data = HashMap::from([
            (Y_TRUE.to_string(), Value::Tensor(y_true.clone())),
            (Y_PRED.to_string(), Value::Tensor(y_pred.clone())),
        ]);
        let mut device_data = backend.load_data(&data)?;

        let mut memo = Memo::new();
        for (name, tensor) in [(Y_TRUE, &self.y_true), (Y_PRED, &self.y_pred)] {
            let value = device_data
                .remove(name)
                .ok_or_else(|| RuntimeError::MissingInput(name.to_string(), tensor.node_id))?;
            memo.insert((graph.id, tensor.node_id), value);
        }

        let (outputs, _) = backend.run(&graph, memo)?;
        let mut values = backend.retrieve_data(&outputs)?.into_iter();

        let explained_variance = values
            .next()
            .ok_or_else(|| EvalError::UnexpectedOutput("explained variance missing".to_string()))?
            .into_array();
        let r2 = values
            .next()
            .ok_or_else(|| EvalError::UnexpectedOutput("r2 missing".to_string()))?
            .into_array();
        if r2.ndim() != 0 {
            return Err(EvalError::UnexpectedOutput(format!(
                "r2 must be a scalar, got shape {:?}",
                r2.shape()
            )));
        }
        let r2 = r2
            .iter()
            .next()
            .copied()
            .ok_or_else(|| EvalError::UnexpectedOutput("r2 is empty".to_string()))?;

        Ok(RegressionScores { explained_variance, r2 })
    }
}

impl Default for ScoreGraph {
    fn default() -> Self {
        Self::new(MultiOutput::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asg::NodeType;
    use crate::runtime::cpu_backend::CpuBackend;
    use ndarray::arr2;

    #[test]
    fn test_graph_has_two_inputs_and_two_outputs() {
        let scores = ScoreGraph::default();
        let graph = scores.graph();
        assert_eq!(graph.inputs.len(), 2);
        assert_eq!(graph.outputs.len(), 2);
        assert_eq!(scores.multioutput(), MultiOutput::RawValues);

        let input_names: Vec<_> = graph
            .inputs
            .iter()
            .map(|id| match &graph.nodes[id].node_type {
                NodeType::Input { name } => name.clone(),
                other => panic!("unexpected input node {:?}", other),
            })
            .collect();
        assert_eq!(input_names, vec![Y_TRUE.to_string(), Y_PRED.to_string()]);
    }

    #[test]
    fn test_evaluate_is_repeatable() {
        let scores = ScoreGraph::default();
        let backend = CpuBackend::new();
        let y = arr2(&[[1.0f32, 2.0], [3.0, 4.0]]).into_dyn();

        let first = scores.evaluate(&backend, &y, &y).unwrap();
        let second = scores.evaluate(&backend, &y, &y).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.explained_variance.shape(), &[2]);
    }

    #[test]
    fn test_with_multioutput_rebuilds() {
        let scores = ScoreGraph::default().with_multioutput(MultiOutput::UniformAverage);
        assert_eq!(scores.multioutput(), MultiOutput::UniformAverage);

        let y = arr2(&[[1.0f32, 2.0], [3.0, 4.0]]).into_dyn();
        let result = scores.evaluate(&CpuBackend::new(), &y, &y).unwrap();
        assert_eq!(result.explained_variance.ndim(), 0);
    }

    #[test]
    fn test_shape_mismatch_is_reported_before_execution() {
        let scores = ScoreGraph::default();
        let y_true = arr2(&[[1.0f32, 2.0], [3.0, 4.0]]).into_dyn();
        let y_pred = arr2(&[[1.0f32, 2.0, 3.0], [3.0, 4.0, 5.0]]).into_dyn();

        let err = scores.evaluate(&CpuBackend::new(), &y_true, &y_pred).unwrap_err();
        assert!(matches!(
            err,
            EvalError::ShapeInference(ShapeInferenceError::BroadcastError(_, _))
        ));
    }
}
