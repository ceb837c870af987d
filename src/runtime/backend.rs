//! Abstract interface (trait) for execution backends.

use crate::asg::{Asg, AsgId, NodeId, Value};
use std::collections::HashMap;
use thiserror::Error;

/// Errors raised while executing a graph. Shared by all backends.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("Node with ID {0} not found in graph {1}. Check that the graph was built correctly.")]
    NodeNotFound(NodeId, AsgId),

    #[error("Type mismatch: operation expected {expected}, got {actual}.")]
    TypeError { expected: String, actual: String },

    #[error("Tensor shape error: {0}.")]
    ShapeError(String),

    #[error("Missing value for input '{0}' (node ID: {1}). Add it to the initial memo before calling backend.run().")]
    MissingInput(String, NodeId),

    #[error("Computation error: {0}")]
    ComputationError(String),
}

/// Cache of computed node values, keyed by (AsgId, NodeId).
pub type Memo<T> = HashMap<(AsgId, NodeId), T>;

/// Common interface of an execution environment (backend).
///
/// Anything implementing this trait takes an ASG plus data and runs the computation.
pub trait Backend {
    /// Device-specific data representation.
    type DeviceData: std::fmt::Debug;

    /// Moves host values onto the device.
    fn load_data(
        &self,
        data: &HashMap<String, Value>,
    ) -> Result<HashMap<String, Self::DeviceData>, RuntimeError>;

    /// Runs the graph, reading and extending the memo.
    ///
    /// # Arguments
    /// * `main_asg` - Graph to execute.
    /// * `initial_memo` - Values already known: inputs and any earlier results.
    ///
    /// # Returns
    /// 1. Values of the graph outputs, in `main_asg.outputs` order.
    /// 2. The final memo with every intermediate result.
    fn run(
        &self,
        main_asg: &Asg,
        initial_memo: Memo<Self::DeviceData>,
    ) -> Result<(Vec<Self::DeviceData>, Memo<Self::DeviceData>), RuntimeError>;

    /// Copies results from the device back into host values.
    fn retrieve_data(&self, device_data: &[Self::DeviceData]) -> Result<Vec<Value>, RuntimeError>;
}
