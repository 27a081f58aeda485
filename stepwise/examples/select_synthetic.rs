//! Runs a full selection on synthetic data and prints the report.
//!
//! ```sh
//! RUST_LOG=info cargo run --example select_synthetic
//! ```

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use stepwise::config::SelectionConfig;
use stepwise::engine::EnhancedStepwise;
use stepwise::linalg::matrix::DataMatrix;

fn gaussian(rng: &mut ChaCha8Rng) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen_range(0.0..1.0);
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

fn main() -> anyhow::Result<()> {
    env_logger::builder().format_timestamp(None).init();

    let n = 500;
    let mut rng = ChaCha8Rng::seed_from_u64(12345);
    let mut columns = Vec::new();
    let mut raw = Vec::new();
    for i in 0..8 {
        let column: Vec<f64> = (0..n).map(|_| gaussian(&mut rng)).collect();
        raw.push(column.clone());
        columns.push((format!("x{}", i + 1), column));
    }
    // The target depends on x2, x5, and an interaction the quadratic
    // expansion can capture.
    let y: Vec<f64> = (0..n)
        .map(|row| {
            2.0 * raw[1][row] - 1.5 * raw[4][row] + 0.5 * raw[1][row] * raw[4][row]
                + 0.2 * gaussian(&mut rng)
        })
        .collect();
    let names: Vec<String> = (0..8).map(|i| format!("x{}", i + 1)).collect();
    let x = DataMatrix::from_columns(columns)?;

    let engine = EnhancedStepwise::with_default_model(SelectionConfig {
        n_kept: 5,
        n_folds: 4,
        max_predictors: Some(4),
        mcpt_replications: 100,
        ..Default::default()
    });
    let report = engine.run_on_data(x, y, names, "target")?;
    println!("{}", report.to_json()?);
    Ok(())
}
