//! The engine façade: one call from raw data (or a data file) to a shaped
//! selection report.

use std::ops::Range;
use std::path::Path;

use anyhow::{ensure, Result};
use log::info;
use serde::{Deserialize, Serialize};
use stepwise_linalg::matrix::{population_moments, DataMatrix};

use crate::config::SelectionConfig;
use crate::model::{LinearQuadratic, RegressionModel};
use crate::reader;
use crate::selection::StepwiseSelector;
use crate::timed;
use crate::util::timing::Stopwatch;

/// Aggregate result of one selection run.
///
/// The per-step vectors all share the same length: the number of steps that
/// were executed and recorded.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SelectionReport {
    pub selected_feature_indices: Vec<usize>,
    pub selected_feature_names: Vec<String>,
    pub target_name: String,
    pub final_r_square: f64,
    pub model_p_values: Vec<f64>,
    pub change_p_values: Vec<f64>,
    pub step_r_squares: Vec<f64>,
    pub step_timing_ms: Vec<f64>,
    pub terminated_early: bool,
    pub termination_reason: String,
    pub total_cases_loaded: usize,
    pub total_steps: usize,
    /// Final-model coefficients in the fixed design order; empty when the
    /// model has no coefficient representation.
    pub final_coefficients: Vec<f64>,
    pub total_elapsed_ms: f64,
}

impl SelectionReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Enhanced stepwise selection over a pluggable model.
pub struct EnhancedStepwise {
    config: SelectionConfig,
    template: Box<dyn RegressionModel>,
}

impl EnhancedStepwise {
    pub fn new(template: Box<dyn RegressionModel>, config: SelectionConfig) -> Self {
        Self { config, template }
    }

    /// The default engine: the linear-quadratic model.
    pub fn with_default_model(config: SelectionConfig) -> Self {
        Self::new(Box::new(LinearQuadratic::new()), config)
    }

    pub fn config(&self) -> &SelectionConfig {
        &self.config
    }

    /// Runs selection on in-memory data. Predictor columns and the target
    /// are standardized in place (population moments) before the search; a
    /// zero-variance target is an error.
    pub fn run_on_data(
        &self,
        mut x: DataMatrix,
        mut y: Vec<f64>,
        feature_names: Vec<String>,
        target_name: &str,
    ) -> Result<SelectionReport> {
        let watch = Stopwatch::start();
        ensure!(x.rows() > 0 && x.cols() > 0, "empty data matrix");
        ensure!(
            y.len() == x.rows(),
            "target has {} rows but the matrix has {}",
            y.len(),
            x.rows()
        );
        x.set_column_names(feature_names)?;

        timed!("standardizing inputs", {
            for col in 0..x.cols() {
                x.standardize_column(col);
            }
            let (mean, std_dev) = population_moments(&y);
            ensure!(std_dev > 0.0, "target has zero variance");
            for value in &mut y {
                *value = (*value - mean) / std_dev;
            }
        });

        let selector = StepwiseSelector::new(self.template.clone_unfitted(), self.config.clone())?;
        let outcome = selector.select(&x, &y)?;

        let mut report = SelectionReport {
            target_name: target_name.to_string(),
            total_cases_loaded: x.rows(),
            total_steps: outcome.steps.len(),
            terminated_early: outcome.terminated_early,
            termination_reason: outcome.termination_reason,
            ..Default::default()
        };
        for step in &outcome.steps {
            report.model_p_values.push(step.model_p_value);
            report.change_p_values.push(step.change_p_value);
            report.step_r_squares.push(step.performance);
            report.step_timing_ms.push(step.elapsed_ms);
        }

        if let Some(winner) = &outcome.final_feature_set {
            report.selected_feature_indices = winner.indices.clone();
            report.final_r_square = winner.cv_score;
            report.selected_feature_names = winner
                .indices
                .iter()
                .map(|&idx| x.column_name(idx))
                .collect();
            if self.template.has_coefficients() && !winner.indices.is_empty() {
                let mut model = self.template.clone_unfitted();
                report.final_coefficients = timed!(
                    "final coefficient fit",
                    model.coefficients(&x, &y, &winner.indices)?
                );
            }
        }

        report.total_elapsed_ms = watch.elapsed_ms();
        Ok(report)
    }

    /// Runs selection on a whitespace-separated data file, slicing an
    /// optional half-open record range, then falls through to
    /// [`EnhancedStepwise::run_on_data`].
    pub fn run_from_file(
        &self,
        path: &Path,
        feature_names: &[String],
        target_name: &str,
        rows: Option<Range<usize>>,
    ) -> Result<SelectionReport> {
        info!("Loading data from: {}", path.display());
        if let Some(range) = &rows {
            info!("Using record range: {}..{}", range.start, range.end);
        }
        let loaded = reader::load_table(path, feature_names, target_name, rows)?;
        info!(
            "Loaded {} cases with {} features ({} rows skipped)",
            loaded.n_cases_loaded,
            loaded.features.cols(),
            loaded.n_cases_skipped
        );
        self.run_on_data(
            loaded.features,
            loaded.target,
            feature_names.to_vec(),
            target_name,
        )
    }
}
