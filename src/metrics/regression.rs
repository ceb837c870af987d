//! Streaming regression metrics.
//!
//! Both metrics accumulate Welford statistics batch by batch, so the full
//! dataset is never stored. Batches are split along axis 0.

use super::Metric;
use ndarray::{ArrayD, Axis, IxDyn, Zip};

/// Welford's online mean/variance accumulator.
#[derive(Debug, Clone, Copy, Default)]
struct RunningVariance {
    count: usize,
    mean: f64,
    m2: f64, // Sum of squares of differences from mean
}

impl RunningVariance {
    fn update(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = value - self.mean;
        self.m2 += delta * delta2;
    }

    /// Population variance; `NaN` before the first value.
    fn variance(&self) -> f64 {
        self.m2 / self.count as f64
    }
}

fn assert_same_shape(predictions: &ArrayD<f32>, targets: &ArrayD<f32>) {
    assert_eq!(
        predictions.shape(),
        targets.shape(),
        "predictions and targets must have the same shape"
    );
}

/// Explained Variance Score, one value per trailing dimension.
///
/// EVS = 1 - Var(y_true - y_pred, axis=0) / Var(y_true, axis=0)
///
/// For batches of shape `(n, M)` the output has shape `(M,)`; for `(n,)`
/// batches it is a 0-dimensional array. A dimension with constant targets
/// scores `NaN` or `-inf`. Before the first batch the trailing shape is
/// unknown and `compute` returns a 0-dimensional `NaN`.
#[derive(Debug, Clone, Default)]
pub struct ExplainedVariance {
    targets: Option<ArrayD<RunningVariance>>,
    residuals: Option<ArrayD<RunningVariance>>,
}

impl ExplainedVariance {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Metric for ExplainedVariance {
    type Prediction = ArrayD<f32>;
    type Target = ArrayD<f32>;
    type Output = ArrayD<f64>;

    /// # Panics
    ///
    /// If the shapes differ, if the batch is 0-dimensional, or if its trailing
    /// shape differs from earlier batches.
    fn update(&mut self, predictions: &Self::Prediction, targets: &Self::Target) {
        assert_same_shape(predictions, targets);
        assert!(targets.ndim() >= 1, "batches need a leading sample axis");

        let trailing = IxDyn(&targets.shape()[1..]);
        let target_acc = self
            .targets
            .get_or_insert_with(|| ArrayD::from_elem(trailing.clone(), RunningVariance::default()));
        let residual_acc = self
            .residuals
            .get_or_insert_with(|| ArrayD::from_elem(trailing.clone(), RunningVariance::default()));
        assert_eq!(
            target_acc.shape(),
            &targets.shape()[1..],
            "batch trailing shape differs from earlier batches"
        );

        for (target_row, pred_row) in targets.axis_iter(Axis(0)).zip(predictions.axis_iter(Axis(0))) {
            Zip::from(&mut *target_acc)
                .and(&mut *residual_acc)
                .and(&target_row)
                .and(&pred_row)
                .for_each(|t_acc, r_acc, &t, &p| {
                    let t = t as f64;
                    t_acc.update(t);
                    r_acc.update(t - p as f64);
                });
        }
    }

    fn compute(&self) -> Self::Output {
        match (&self.targets, &self.residuals) {
            (Some(targets), Some(residuals)) => Zip::from(targets)
                .and(residuals)
                .map_collect(|t, r| 1.0 - r.variance() / t.variance()),
            _ => ArrayD::from_elem(IxDyn(&[]), f64::NAN),
        }
    }

    fn reset(&mut self) {
        self.targets = None;
        self.residuals = None;
    }

    fn name(&self) -> &str {
        "ExplainedVariance"
    }
}

/// R-Squared (Coefficient of Determination) over all elements.
///
/// R² = 1 - SS_res / SS_tot
/// where SS_res = Σ(y_true - y_pred)²
///       SS_tot = Σ(y_true - mean(y_true))²
///
/// Every element of every batch counts, whatever the rank. Constant targets
/// give `SS_tot = 0` and a non-finite score.
#[derive(Debug, Clone, Default)]
pub struct RSquared {
    sum_squared_residuals: f64,
    targets: RunningVariance,
}

impl RSquared {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Metric for RSquared {
    type Prediction = ArrayD<f32>;
    type Target = ArrayD<f32>;
    type Output = f64;

    /// # Panics
    ///
    /// If the shapes differ.
    fn update(&mut self, predictions: &Self::Prediction, targets: &Self::Target) {
        assert_same_shape(predictions, targets);
        for (&pred, &target) in predictions.iter().zip(targets.iter()) {
            let diff = target as f64 - pred as f64;
            self.sum_squared_residuals += diff * diff;
            self.targets.update(target as f64);
        }
    }

    fn compute(&self) -> Self::Output {
        // SS_tot is the Welford M2 of the targets.
        1.0 - self.sum_squared_residuals / self.targets.m2
    }

    fn reset(&mut self) {
        self.sum_squared_residuals = 0.0;
        self.targets = RunningVariance::default();
    }

    fn name(&self) -> &str {
        "R²"
    }
}
