//! K-fold cross-validation over contiguous row ranges.

use std::ops::Range;

use anyhow::{ensure, Result};
use stepwise_linalg::matrix::DataMatrix;

use crate::model::RegressionModel;

/// Scores feature sets by K-fold cross-validation.
///
/// Folds are contiguous: fold `i` takes `n_remaining / (k - i)` rows, so any
/// remainder drifts to the later folds. The criterion is `1 - sum(SSE) / n`,
/// which reads as R-squared when the target is standardized to unit
/// population variance.
#[derive(Clone, Copy, Debug)]
pub struct CrossValidator {
    n_folds: usize,
}

impl CrossValidator {
    pub fn new(n_folds: usize) -> Self {
        Self { n_folds }
    }

    pub fn n_folds(&self) -> usize {
        self.n_folds
    }

    /// Fold boundaries over `[0, n_cases)`.
    pub fn folds(&self, n_cases: usize) -> Vec<Range<usize>> {
        let mut folds = Vec::with_capacity(self.n_folds);
        let mut n_remaining = n_cases;
        let mut test_start = 0;
        for ifold in 0..self.n_folds {
            let fold_size = n_remaining / (self.n_folds - ifold);
            folds.push(test_start..test_start + fold_size);
            n_remaining -= fold_size;
            test_start += fold_size;
        }
        folds
    }

    /// Cross-validated criterion for `indices`, or `None` when the candidate
    /// cannot be scored (empty feature set, or a fold where the fit fails).
    ///
    /// The model is caller-owned so its design-matrix cache is reused across
    /// the folds of one candidate.
    pub fn criterion(
        &self,
        model: &mut dyn RegressionModel,
        x: &DataMatrix,
        y: &[f64],
        indices: &[usize],
    ) -> Result<Option<f64>> {
        if indices.is_empty() {
            return Ok(None);
        }
        let n_cases = y.len();
        ensure!(
            n_cases > self.n_folds,
            "number of cases ({n_cases}) must exceed the fold count ({})",
            self.n_folds
        );

        let mut total_error = 0.0;
        for fold in self.folds(n_cases) {
            if model.fit(x, y, indices, fold.clone()).is_err() {
                return Ok(None);
            }
            match model.sse(x, y, indices, fold) {
                Ok(fold_error) => total_error += fold_error,
                Err(_) => return Ok(None),
            }
        }
        Ok(Some(1.0 - total_error / n_cases as f64))
    }
}
