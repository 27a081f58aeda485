//! Selection run configuration.

use core::fmt;
use std::sync::Arc;

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

/// How the permutation test shuffles the target vector.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum PermutationKind {
    /// Independent reshuffle of all rows.
    #[default]
    Complete,
    /// Random cyclic rotation, preserving serial correlation.
    Cyclic,
}

/// Cancellation predicate, polled at step boundaries and from worker tasks.
/// Must be pure and cheap; it may be called from any thread.
pub type CancelCallback = Arc<dyn Fn() -> bool + Send + Sync>;

/// Parameters of one stepwise selection run. Read-only while a run is in
/// flight.
#[derive(Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Beam width: how many of the best feature sets survive each step.
    pub n_kept: usize,
    /// Cross-validation fold count.
    pub n_folds: usize,
    /// No early stop until at least this many predictors are selected.
    pub min_predictors: usize,
    /// Hard cap on beam depth. `None` leaves the search bounded only by the
    /// number of candidate columns.
    pub max_predictors: Option<usize>,
    /// Total permutation-test replications, including the unpermuted
    /// baseline. `1` disables permutation testing (every p-value is 1).
    pub mcpt_replications: usize,
    /// Permutation flavor for the significance test.
    pub mcpt_type: PermutationKind,
    /// Stop once adding a feature no longer raises the best score.
    pub early_termination: bool,
    /// Optional cancellation predicate.
    #[serde(skip)]
    pub cancel: Option<CancelCallback>,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            n_kept: 5,
            n_folds: 4,
            min_predictors: 1,
            max_predictors: None,
            mcpt_replications: 100,
            mcpt_type: PermutationKind::Complete,
            early_termination: true,
            cancel: None,
        }
    }
}

impl fmt::Debug for SelectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectionConfig")
            .field("n_kept", &self.n_kept)
            .field("n_folds", &self.n_folds)
            .field("min_predictors", &self.min_predictors)
            .field("max_predictors", &self.max_predictors)
            .field("mcpt_replications", &self.mcpt_replications)
            .field("mcpt_type", &self.mcpt_type)
            .field("early_termination", &self.early_termination)
            .field("cancel", &self.cancel.is_some())
            .finish()
    }
}

impl SelectionConfig {
    /// Checks that the configuration is internally consistent.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.n_kept >= 1, "n_kept must be at least 1");
        ensure!(self.n_folds >= 2, "n_folds must be at least 2");
        ensure!(
            self.mcpt_replications >= 1,
            "mcpt_replications must be at least 1 (the unpermuted baseline)"
        );
        ensure!(
            self.max_predictors != Some(0),
            "max_predictors must be positive when set"
        );
        Ok(())
    }

    /// Whether the caller has requested cancellation.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|cb| cb())
    }
}
