//! The stepwise beam search.
//!
//! Each step proposes every unseen one-feature extension of the surviving
//! beam, scores the proposals by cross-validation in parallel, keeps the
//! top `n_kept`, and interleaves the permutation test before moving on.

use anyhow::{ensure, Result};
use hashbrown::HashSet;
use itertools::Itertools;
use log::{debug, info};
use rayon::prelude::*;
use stepwise_linalg::matrix::DataMatrix;

use crate::config::SelectionConfig;
use crate::model::RegressionModel;
use crate::selection::cross_validation::CrossValidator;
use crate::selection::feature_set::FeatureSet;
use crate::selection::mcpt::McptDriver;
use crate::util::timing::Stopwatch;

const REASON_NO_VARIABLES: &str = "No variables found";
const REASON_DEGRADATION: &str = "Adding a new variable caused performance degradation";
const REASON_CANCELLED: &str = "Analysis cancelled by user";

/// One beam expansion: the surviving feature sets and the step's statistics.
#[derive(Clone, Debug)]
pub struct SelectionStep {
    pub feature_sets: Vec<FeatureSet>,
    /// Best cross-validated score of the step (unclamped).
    pub performance: f64,
    pub model_p_value: f64,
    pub change_p_value: f64,
    pub elapsed_ms: f64,
}

/// Everything a selection run produced.
#[derive(Clone, Debug, Default)]
pub struct SelectionOutcome {
    pub steps: Vec<SelectionStep>,
    pub final_feature_set: Option<FeatureSet>,
    pub terminated_early: bool,
    pub termination_reason: String,
    pub total_elapsed_ms: f64,
}

/// Beam-search stepwise selector over a pluggable model template.
pub struct StepwiseSelector {
    config: SelectionConfig,
    cv: CrossValidator,
    template: Box<dyn RegressionModel>,
}

impl StepwiseSelector {
    pub fn new(template: Box<dyn RegressionModel>, config: SelectionConfig) -> Result<Self> {
        config.validate()?;
        let cv = CrossValidator::new(config.n_folds);
        Ok(Self {
            config,
            cv,
            template,
        })
    }

    pub fn config(&self) -> &SelectionConfig {
        &self.config
    }

    /// Runs the full search. `x` and `y` are read-shared across worker
    /// threads and must already be standardized by the caller.
    pub fn select(&self, x: &DataMatrix, y: &[f64]) -> Result<SelectionOutcome> {
        let total_watch = Stopwatch::start();
        ensure!(x.rows() > 0 && x.cols() > 0, "no data provided");
        ensure!(
            x.rows() == y.len(),
            "target has {} rows but the matrix has {}",
            y.len(),
            x.rows()
        );
        ensure!(
            y.len() > self.config.n_folds,
            "number of cases ({}) must exceed the fold count ({})",
            y.len(),
            self.config.n_folds
        );

        let ncand = x.cols();
        let replications = self.config.mcpt_replications;
        let mut outcome = SelectionOutcome::default();
        let mut beam: Vec<FeatureSet> = Vec::new();
        let mut prior_performance = f64::NEG_INFINITY;
        let mut tested: HashSet<Vec<usize>> = HashSet::new();

        info!("");
        info!("Stepwise inclusion of variables ({})...", self.template.kind());
        if replications > 1 {
            info!("R-square  MOD pval  CHG pval  Predictors...");
        } else {
            info!("R-square  Predictors...");
        }

        // A set can never be larger than the candidate pool or the row count.
        let max_steps = self
            .config
            .max_predictors
            .unwrap_or(ncand)
            .min(ncand)
            .min(x.rows());
        for step_number in 0..max_steps {
            if self.config.is_cancelled() {
                outcome.termination_reason = REASON_CANCELLED.to_string();
                outcome.terminated_early = true;
                break;
            }
            let step_watch = Stopwatch::start();

            // Unpermuted baseline: evaluate this step's candidates in
            // parallel, then merge the attempted combinations serially.
            let tasks = generate_tasks(ncand, &beam, &tested);
            let mut step_beam = self.evaluate_tasks(x, y, &tasks, true);
            for task in tasks {
                tested.insert(task);
            }
            if self.config.is_cancelled() {
                outcome.termination_reason = REASON_CANCELLED.to_string();
                outcome.terminated_early = true;
                break;
            }
            if step_beam.is_empty() {
                outcome.termination_reason = REASON_NO_VARIABLES.to_string();
                outcome.terminated_early = true;
                break;
            }

            let step_performance = step_beam[0].cv_score;
            let new_crit = if step_performance < 0.0 { 0.0 } else { step_performance };
            let normalized_prior = if prior_performance < 0.0 { 0.0 } else { prior_performance };
            let original_change = new_crit - normalized_prior;

            // Early-termination gate, clamped to zero on both sides. The
            // degraded step is not recorded; the prior winner stands.
            if self.config.early_termination
                && new_crit <= normalized_prior
                && step_beam[0].len() > self.config.min_predictors
            {
                outcome.termination_reason = REASON_DEGRADATION.to_string();
                outcome.terminated_early = true;
                break;
            }

            // Permuted replications replay this step's search serially per
            // worker; the replications themselves are the parallel layer.
            let mut model_count = 1usize;
            let mut change_count = 1usize;
            if replications > 1 {
                debug!(
                    "Running {} permutation replications for step {}",
                    replications - 1,
                    step_number + 1
                );
                let driver = McptDriver {
                    replications,
                    kind: self.config.mcpt_type,
                };
                let counts = driver.run(y, new_crit, original_change, prior_performance, |permuted| {
                    self.replicated_search(x, permuted, &beam, ncand)
                });
                model_count += counts.model;
                change_count += counts.change;
            }
            if step_number == 0 {
                change_count = model_count;
            }
            let model_p_value = model_count as f64 / replications as f64;
            let change_p_value = change_count as f64 / replications as f64;

            step_beam[0].model_p_value = Some(model_p_value);
            step_beam[0].change_p_value = Some(change_p_value);

            let mut line = if replications > 1 {
                format!("{new_crit:.4}    {model_p_value:.3}     {change_p_value:.3}  ")
            } else {
                format!("{new_crit:.4} ")
            };
            line.push(' ');
            line.push_str(
                &step_beam[0]
                    .indices
                    .iter()
                    .map(|&idx| x.column_name(idx))
                    .join(" "),
            );
            info!("{line}");

            let elapsed_ms = step_watch.elapsed_ms();
            debug!("Step {} completed in {elapsed_ms:.2} ms", step_number + 1);

            outcome.steps.push(SelectionStep {
                feature_sets: step_beam.clone(),
                performance: step_performance,
                model_p_value,
                change_p_value,
                elapsed_ms,
            });
            beam = step_beam;
            prior_performance = step_performance;
        }

        outcome.final_feature_set = beam.first().cloned();
        outcome.total_elapsed_ms = total_watch.elapsed_ms();

        info!("");
        if outcome.terminated_early {
            info!("STEPWISE terminated early: {}", outcome.termination_reason);
        } else {
            info!("STEPWISE successfully completed");
        }
        info!("Total selection time: {:.2} ms", outcome.total_elapsed_ms);

        Ok(outcome)
    }

    /// Scores a task list. The parallel path is used for the unpermuted
    /// baseline; permutation replications use the serial path because they
    /// already occupy the worker pool. Returns the sorted, truncated beam.
    fn evaluate_tasks(
        &self,
        x: &DataMatrix,
        y: &[f64],
        tasks: &[Vec<usize>],
        parallel: bool,
    ) -> Vec<FeatureSet> {
        let evaluate = |task: &Vec<usize>| -> Option<FeatureSet> {
            if self.config.is_cancelled() {
                return None;
            }
            let mut model = self.template.clone_unfitted();
            let score = self.cv.criterion(model.as_mut(), x, y, task).ok().flatten()?;
            Some(FeatureSet::new(task.clone(), score))
        };

        let mut candidates: Vec<FeatureSet> = if parallel {
            tasks.par_iter().filter_map(evaluate).collect()
        } else {
            tasks.iter().filter_map(evaluate).collect()
        };
        candidates.sort_by(FeatureSet::beam_ordering);
        candidates.truncate(self.config.n_kept);
        candidates
    }

    /// Re-runs one step's search against a permuted target: same beam, same
    /// candidate generation, fresh combination set, serial evaluation.
    fn replicated_search(
        &self,
        x: &DataMatrix,
        permuted_y: &[f64],
        beam: &[FeatureSet],
        ncand: usize,
    ) -> Option<f64> {
        let tested = HashSet::new();
        let tasks = generate_tasks(ncand, beam, &tested);
        let best = self.evaluate_tasks(x, permuted_y, &tasks, false);
        best.first().map(|fs| fs.cv_score)
    }
}

/// Proposes this step's candidate index vectors: singletons when the beam is
/// empty (the first step), otherwise every sorted one-feature extension of a
/// beam member, deduplicated against `tested` and within the step.
fn generate_tasks(
    ncand: usize,
    beam: &[FeatureSet],
    tested: &HashSet<Vec<usize>>,
) -> Vec<Vec<usize>> {
    let mut tasks = Vec::new();
    if beam.is_empty() {
        for candidate in 0..ncand {
            let single = vec![candidate];
            if !tested.contains(&single) {
                tasks.push(single);
            }
        }
        return tasks;
    }

    let mut proposed: HashSet<Vec<usize>> = HashSet::new();
    for base in beam {
        for candidate in 0..ncand {
            if base.indices.contains(&candidate) {
                continue;
            }
            let mut extended = base.indices.clone();
            extended.push(candidate);
            extended.sort_unstable();
            if !tested.contains(&extended) && !proposed.contains(&extended) {
                proposed.insert(extended.clone());
                tasks.push(extended);
            }
        }
    }
    tasks
}
