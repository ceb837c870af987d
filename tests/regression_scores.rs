//! Integration tests for the regression scores: graph mode on the CPU backend,
//! cross-checked against the streaming metrics.

use asg_scores::asg::Asg;
use asg_scores::metrics::{ExplainedVariance, Metric, MultiOutput, RSquared, RegressionScores, ScoreGraph};
use asg_scores::runtime::cpu_backend::CpuBackend;

use ndarray::{arr1, arr2, Array, ArrayD, Axis, IxDyn};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::SeedableRng;

const TOL: f32 = 1e-5;

fn assert_close(actual: f32, expected: f32, tol: f32, what: &str) {
    assert!(
        (actual - expected).abs() <= tol,
        "{}: expected {}, got {} (tol {})",
        what,
        expected,
        actual,
        tol
    );
}

fn evaluate(y_true: &ArrayD<f32>, y_pred: &ArrayD<f32>) -> RegressionScores {
    ScoreGraph::default()
        .evaluate(&CpuBackend::new(), y_true, y_pred)
        .expect("evaluation failed")
}

#[test]
fn perfect_prediction_on_a_vector() {
    let y = arr1(&[1.0f32, 2.0, 3.0, 4.0]).into_dyn();
    let scores = evaluate(&y, &y);

    assert_eq!(scores.explained_variance.ndim(), 0);
    assert_close(scores.r2, 1.0, TOL, "r2");
    assert_close(scores.explained_variance.sum(), 1.0, TOL, "explained variance");
}

#[test]
fn predicting_the_mean_gives_zero_r2() {
    let y_true = arr1(&[1.0f32, 2.0, 3.0, 4.0]).into_dyn();
    let y_pred = arr1(&[2.5f32, 2.5, 2.5, 2.5]).into_dyn();
    let scores = evaluate(&y_true, &y_pred);

    assert_close(scores.r2, 0.0, TOL, "r2");
    // A constant prediction explains none of the variance either.
    assert_close(scores.explained_variance.sum(), 0.0, TOL, "explained variance");
}

#[test]
fn explained_variance_keeps_trailing_dimension() {
    let y = arr2(&[[1.0f32, 2.0], [3.0, 4.0]]).into_dyn();
    let scores = evaluate(&y, &y);

    assert_eq!(scores.explained_variance.shape(), &[2]);
    for v in scores.explained_variance.iter() {
        assert_close(*v, 1.0, TOL, "explained variance");
    }
    assert_close(scores.r2, 1.0, TOL, "r2");
}

#[test]
fn column_means_give_zero_explained_variance() {
    let y_true = arr2(&[[1.0f32, 10.0], [2.0, 20.0], [6.0, 60.0]]).into_dyn();
    let means = y_true.mean_axis(Axis(0)).unwrap();
    let y_pred = means.broadcast(y_true.raw_dim()).unwrap().to_owned();

    let scores = evaluate(&y_true, &y_pred);
    assert_eq!(scores.explained_variance.shape(), &[2]);
    for v in scores.explained_variance.iter() {
        assert_close(*v, 0.0, TOL, "explained variance");
    }
}

#[test]
fn global_mean_gives_zero_r2_on_matrices() {
    let y_true = arr2(&[[1.0f32, 10.0], [2.0, 20.0], [6.0, 60.0]]).into_dyn();
    let mean = y_true.mean().unwrap();
    let y_pred = ArrayD::from_elem(y_true.raw_dim(), mean);

    let scores = evaluate(&y_true, &y_pred);
    assert_close(scores.r2, 0.0, TOL, "r2");
}

#[test]
fn r2_differs_from_averaged_per_column_r2() {
    // Columns on very different scales: the global R² is dominated by the
    // large column, so collapsing it to per-column reductions would change it.
    let y_true = arr2(&[[1.0f32, 100.0], [2.0, 200.0], [3.0, 300.0]]).into_dyn();
    let y_pred = arr2(&[[2.0f32, 100.0], [2.0, 200.0], [2.0, 300.0]]).into_dyn();
    let scores = evaluate(&y_true, &y_pred);

    // mean = 101, SS_tot = 10000+9801+9604 + 1+9801+39601 = 78808, SS_res = 2
    assert_close(scores.r2, 1.0 - 2.0 / 78808.0, TOL, "r2");
    assert_close(scores.explained_variance[[0]], 0.0, TOL, "explained variance col 0");
    assert_close(scores.explained_variance[[1]], 1.0, TOL, "explained variance col 1");
}

#[test]
fn constant_target_is_not_an_error() {
    let y_true = ArrayD::from_elem(IxDyn(&[4]), 5.0f32);

    let exact = evaluate(&y_true, &y_true);
    assert!(exact.r2.is_nan());
    assert!(exact.explained_variance.sum().is_nan());

    let off = evaluate(&y_true, &arr1(&[4.0f32, 6.0, 5.0, 5.0]).into_dyn());
    assert_eq!(off.r2, f32::NEG_INFINITY);
    assert_eq!(off.explained_variance.sum(), f32::NEG_INFINITY);
}

#[test]
fn r2_is_invariant_under_a_global_shift() {
    let mut rng = StdRng::seed_from_u64(7);
    let y_true = Array::random_using((64, 3), Uniform::new(-1.0f32, 1.0), &mut rng).into_dyn();
    let noise = Array::random_using((64, 3), Uniform::new(-0.3f32, 0.3), &mut rng).into_dyn();
    let y_pred = &y_true + &noise;

    let base = evaluate(&y_true, &y_pred);
    let shifted = evaluate(&y_true.mapv(|v| v + 10.0), &y_pred.mapv(|v| v + 10.0));

    assert_close(shifted.r2, base.r2, 1e-3, "shifted r2");
    for (a, b) in shifted.explained_variance.iter().zip(base.explained_variance.iter()) {
        assert_close(*a, *b, 1e-3, "shifted explained variance");
    }
}

#[test]
fn graph_and_streaming_metrics_agree() {
    let mut rng = StdRng::seed_from_u64(42);
    let y_true = Array::random_using((100, 4), Uniform::new(-5.0f32, 5.0), &mut rng).into_dyn();
    let noise = Array::random_using((100, 4), Uniform::new(-1.0f32, 1.0), &mut rng).into_dyn();
    let y_pred = &y_true + &noise;

    let scores = evaluate(&y_true, &y_pred);

    let mut ev = ExplainedVariance::new();
    let mut r2 = RSquared::new();
    for start in (0..100).step_by(25) {
        let t = y_true.slice_axis(Axis(0), (start..start + 25).into()).to_owned();
        let p = y_pred.slice_axis(Axis(0), (start..start + 25).into()).to_owned();
        ev.update(&p, &t);
        r2.update(&p, &t);
    }

    assert_close(scores.r2, r2.compute() as f32, 1e-4, "r2");
    let streamed = ev.compute();
    assert_eq!(streamed.shape(), scores.explained_variance.shape());
    for (g, s) in scores.explained_variance.iter().zip(streamed.iter()) {
        assert_close(*g, *s as f32, 1e-4, "explained variance");
    }
}

#[test]
fn rank_three_input_keeps_trailing_dimensions() {
    let mut rng = StdRng::seed_from_u64(3);
    let y_true = Array::random_using((5, 2, 3), Uniform::new(-4.0f32, 4.0), &mut rng).into_dyn();
    let noise = Array::random_using((5, 2, 3), Uniform::new(-0.4f32, 0.4), &mut rng).into_dyn();
    let y_pred = &y_true + &noise;

    let scores = evaluate(&y_true, &y_pred);
    assert_eq!(scores.explained_variance.shape(), &[2, 3]);

    let mut ev = ExplainedVariance::new();
    let mut r2 = RSquared::new();
    ev.update(&y_pred, &y_true);
    r2.update(&y_pred, &y_true);

    let streamed = ev.compute();
    assert_eq!(streamed.shape(), &[2, 3]);
    for (g, s) in scores.explained_variance.iter().zip(streamed.iter()) {
        assert_close(*g, *s as f32, 1e-4, "explained variance");
    }
    // R² stays one number over all 30 elements.
    assert_close(scores.r2, r2.compute() as f32, 1e-4, "r2");
}

#[test]
fn uniform_average_is_the_mean_of_raw_values() {
    let y_true = arr2(&[[1.0f32, 1.0], [2.0, 3.0], [3.0, 5.0]]).into_dyn();
    let y_pred = arr2(&[[1.0f32, 2.0], [2.0, 3.0], [3.0, 4.0]]).into_dyn();
    let backend = CpuBackend::new();

    let raw = ScoreGraph::new(MultiOutput::RawValues)
        .evaluate(&backend, &y_true, &y_pred)
        .unwrap();
    let avg = ScoreGraph::new(MultiOutput::UniformAverage)
        .evaluate(&backend, &y_true, &y_pred)
        .unwrap();

    assert_eq!(avg.explained_variance.ndim(), 0);
    assert_close(avg.explained_variance.sum(), 0.875, TOL, "averaged explained variance");
    assert_close(raw.explained_variance.mean().unwrap(), 0.875, TOL, "raw mean");
    assert_eq!(raw.r2, avg.r2);
}

#[test]
fn score_graph_exports_to_json() {
    let graph = ScoreGraph::default().graph();
    let json = graph.to_json().unwrap();
    assert!(json.contains("VarianceAxis"));

    let restored = Asg::from_json(&json).unwrap();
    assert_eq!(restored, graph);
}

#[test]
fn scores_serialize_with_serde() {
    let y = arr2(&[[1.0f32, 2.0], [3.0, 4.0]]).into_dyn();
    let scores = evaluate(&y, &y);
    let json = serde_json::to_string(&scores).unwrap();
    let restored: RegressionScores = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, scores);
}

#[test]
fn multioutput_config_uses_snake_case() {
    let json = serde_json::to_string(&MultiOutput::UniformAverage).unwrap();
    assert_eq!(json, "\"uniform_average\"");
    let parsed: MultiOutput = serde_json::from_str("\"raw_values\"").unwrap();
    assert_eq!(parsed, MultiOutput::RawValues);
}
