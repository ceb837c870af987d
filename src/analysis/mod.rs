//! # Graph Analysis Module
//!
//! Analysis passes that process the ASG before execution.
//!
//! ## Available Passes
//!
//! - [`ShapeInference`](shape_inference::ShapeInference): Propagates tensor shapes
//!   through the graph, detecting shape mismatches before runtime.
//!
//! ```text
//! ASG (untyped) -> Shape Inference -> ASG (with shapes/dtypes)
//! ```
//!
//! Running inference first turns a `y_true`/`y_pred` shape mismatch into a
//! `BroadcastError` instead of a failure halfway through execution.
//!
//! ## Example
//!
//! ```ignore
//! use asg_scores::analysis::shape_inference::ShapeInference;
//!
//! let mut graph = context.borrow().main_graph().clone();
//!
//! let shapes = HashMap::from([
//!     ("y_true".to_string(), (vec![32, 4], DType::F32)),
//!     ("y_pred".to_string(), (vec![32, 4], DType::F32)),
//! ]);
//!
//! ShapeInference::run(&mut graph, &shapes)?;
//! ```

pub mod shape_inference;
