//! Regression Scores Example.
//!
//! Scores a noisy fit of y = 2*x + 1 (first column) and y = -x (second column):
//! 1. Build the score graph
//! 2. Evaluate it on the CPU backend
//! 3. Compare with the streaming metrics fed in batches
//!
//! Run with: `cargo run --example regression_scores`

use asg_scores::metrics::{ExplainedVariance, Metric, MultiOutput, RSquared, ScoreGraph};
use asg_scores::runtime::cpu_backend::CpuBackend;
use ndarray::{ArrayD, Axis, IxDyn};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Regression Scores Example ===\n");

    let rows = 12;
    let mut y_true = Vec::with_capacity(rows * 2);
    let mut y_pred = Vec::with_capacity(rows * 2);
    for i in 0..rows {
        let x = i as f32;
        // Deterministic "noise" so the output is reproducible.
        let wobble = if i % 2 == 0 { 0.5 } else { -0.5 };
        y_true.extend([2.0 * x + 1.0, -x]);
        y_pred.extend([2.0 * x + 1.0 + wobble, -x + 0.25 * wobble + 1.0]);
    }
    let y_true = ArrayD::from_shape_vec(IxDyn(&[rows, 2]), y_true)?;
    let y_pred = ArrayD::from_shape_vec(IxDyn(&[rows, 2]), y_pred)?;

    let backend = CpuBackend::new();
    let graph = ScoreGraph::new(MultiOutput::RawValues);
    println!("Score graph: {} nodes", graph.graph().nodes.len());

    let scores = graph.evaluate(&backend, &y_true, &y_pred)?;
    println!("Explained variance (per column): {}", scores.explained_variance);
    println!("R² (all elements):               {:.6}", scores.r2);

    let averaged = graph
        .with_multioutput(MultiOutput::UniformAverage)
        .evaluate(&backend, &y_true, &y_pred)?;
    println!("Explained variance (averaged):   {}", averaged.explained_variance);

    // The second column is shifted by +1: explained variance ignores the
    // constant offset, R² does not.
    let mut ev = ExplainedVariance::new();
    let mut r2 = RSquared::new();
    for (t, p) in y_true
        .axis_chunks_iter(Axis(0), 4)
        .zip(y_pred.axis_chunks_iter(Axis(0), 4))
    {
        ev.update(&p.to_owned(), &t.to_owned());
        r2.update(&p.to_owned(), &t.to_owned());
    }
    println!("\nStreaming {}: {}", ev.name(), ev.compute());
    println!("Streaming {}: {:.6}", r2.name(), r2.compute());

    Ok(())
}
