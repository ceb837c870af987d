//! Regression scores: explained variance and R² (coefficient of determination).
//!
//! Three ways to use them:
//! - **Graph mode** ([`scores`]): functions over symbolic `Tensor`s that add
//!   the score computation to an ASG, like graph-mode loss functions.
//! - **Session** ([`session`]): [`ScoreGraph`] builds both scores once and
//!   evaluates them on any backend.
//! - **Streaming** ([`regression`]): [`Metric`] implementations that
//!   accumulate batches and compute the score eagerly.
//!
//! The two scores reduce differently. Explained variance reduces along axis 0
//! only and yields one score per trailing dimension; R² reduces over every
//! element and yields a single scalar.
//!
//! # Example
//!
//! ```rust,ignore
//! use asg_scores::metrics::{ExplainedVariance, Metric};
//!
//! let mut ev = ExplainedVariance::new();
//! ev.update(&predictions, &targets);
//! println!("{}: {:?}", ev.name(), ev.compute());
//! ev.reset();
//! ```

pub mod regression;
pub mod scores;
pub mod session;

use serde::{Deserialize, Serialize};

pub use regression::{ExplainedVariance, RSquared};
pub use scores::{explained_variance_score, explained_variance_score_with, r2_score};
pub use session::{EvalError, RegressionScores, ScoreGraph};

/// Base trait of the streaming metrics.
pub trait Metric: Send + Sync {
    /// Prediction type
    type Prediction;
    /// Target type
    type Target;
    /// Result type
    type Output;

    /// Feeds a batch of predictions and targets.
    fn update(&mut self, predictions: &Self::Prediction, targets: &Self::Target);

    /// Computes the current value.
    fn compute(&self) -> Self::Output;

    /// Clears the accumulated state.
    fn reset(&mut self);

    /// Metric name.
    fn name(&self) -> &str;
}

/// How a per-dimension score is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiOutput {
    /// One score per trailing dimension.
    #[default]
    RawValues,
    /// Scores averaged with equal weight into a single scalar.
    UniformAverage,
}
