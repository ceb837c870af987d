//! # asg-scores: regression scores on a graph engine
//!
//! Explained variance and R² built as an **Abstract Semantic Graph (ASG)** and
//! executed by a backend. The score functions only add nodes to a graph; the
//! CPU backend runs them with `ndarray`.
//!
//! The two scores reduce differently:
//! - `explained_variance_score` reduces along axis 0 and returns one score per
//!   trailing dimension;
//! - `r2_score` reduces over every element and returns a scalar.
//!
//! ## Usage Example
//!
//! ```no_run
//! use asg_scores::metrics::{MultiOutput, ScoreGraph};
//! use asg_scores::runtime::cpu_backend::CpuBackend;
//! use ndarray::arr2;
//!
//! let y_true = arr2(&[[1.0f32, 2.0], [3.0, 4.0], [5.0, 7.0]]).into_dyn();
//! let y_pred = arr2(&[[1.5f32, 2.0], [2.5, 4.5], [5.0, 6.0]]).into_dyn();
//!
//! let scores = ScoreGraph::new(MultiOutput::RawValues)
//!     .evaluate(&CpuBackend::new(), &y_true, &y_pred)
//!     .expect("shapes match");
//!
//! println!("explained variance per column: {}", scores.explained_variance);
//! println!("r2: {}", scores.r2);
//! ```

pub mod analysis;
pub mod asg;
pub mod metrics;
pub mod runtime;
pub mod tensor;
