//! The linear-quadratic least-squares model.
//!
//! Fits `y ~ A b` where `A` is the expansion of [`crate::design`]. The model
//! keeps the full-data design matrix cached per predictor set so that
//! cross-validation folds can be assembled as two row blocks of the cache
//! instead of recomputing squares and products for every fold.

use std::ops::Range;

use anyhow::{ensure, Result};
use nalgebra::{DMatrix, DVector};

use crate::design;
use crate::matrix::DataMatrix;
use crate::solver;

#[derive(Clone, Debug)]
struct DesignCache {
    indices: Vec<usize>,
    full: DMatrix<f64>,
}

/// Linear-quadratic model with fold-exclusion fitting.
///
/// The cache is private to one instance; cloned models get their own copy
/// and never share mutable state across threads.
#[derive(Clone, Debug, Default)]
pub struct LinearQuadraticModel {
    coefficients: Option<DVector<f64>>,
    cache: Option<DesignCache>,
}

impl LinearQuadraticModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds and caches the full-data design matrix for `indices` without
    /// fitting. Subsequent fold fits and evaluations against the same index
    /// set slice the cache instead of rebuilding rows.
    pub fn warm_cache(&mut self, x: &DataMatrix, indices: &[usize]) {
        if !self.cache_matches(indices) {
            self.cache = Some(DesignCache {
                indices: indices.to_vec(),
                full: design::build_full(x, indices),
            });
        }
    }

    fn cache_matches(&self, indices: &[usize]) -> bool {
        self.cache
            .as_ref()
            .is_some_and(|cache| cache.indices == indices)
    }

    /// Fits on every row outside the half-open `exclude` range. An empty
    /// range trains on the full data set and refreshes the cache under
    /// `indices`; a fit against a different index set invalidates any
    /// existing cache.
    pub fn fit(
        &mut self,
        x: &DataMatrix,
        y: &[f64],
        indices: &[usize],
        exclude: Range<usize>,
    ) -> Result<()> {
        let n_total = y.len();
        ensure!(
            x.rows() == n_total,
            "target has {} rows but the matrix has {}",
            n_total,
            x.rows()
        );
        let is_fold = exclude.end > exclude.start;
        ensure!(
            !is_fold || exclude.end <= n_total,
            "exclusion range {}..{} exceeds {} rows",
            exclude.start,
            exclude.end,
            n_total
        );
        let n_train = if is_fold {
            n_total - (exclude.end - exclude.start)
        } else {
            n_total
        };
        ensure!(n_train > 0, "no training rows left after exclusion");

        let (a, b) = if is_fold {
            if !self.cache_matches(indices) {
                self.cache = None;
                self.warm_cache(x, indices);
            }
            let cache = self.cache.as_ref().unwrap();
            let n_terms = cache.full.ncols();
            let mut a = DMatrix::zeros(n_train, n_terms);
            let mut b = DVector::zeros(n_train);
            if exclude.start > 0 {
                a.rows_mut(0, exclude.start)
                    .copy_from(&cache.full.rows(0, exclude.start));
                for row in 0..exclude.start {
                    b[row] = y[row];
                }
            }
            if exclude.end < n_total {
                let tail = n_total - exclude.end;
                a.rows_mut(exclude.start, tail)
                    .copy_from(&cache.full.rows(exclude.end, tail));
                for (offset, row) in (exclude.end..n_total).enumerate() {
                    b[exclude.start + offset] = y[row];
                }
            }
            (a, b)
        } else {
            self.warm_cache(x, indices);
            let full = self.cache.as_ref().unwrap().full.clone();
            let b = DVector::from_column_slice(y);
            (full, b)
        };

        ensure!(
            a.nrows() > 0 && a.ncols() > 0,
            "degenerate design matrix ({} x {})",
            a.nrows(),
            a.ncols()
        );
        self.coefficients = Some(solver::least_squares(&a, &b)?);
        Ok(())
    }

    /// Sum of squared residuals over the rows in `test`, using the
    /// coefficients from the last successful fit.
    pub fn evaluate(
        &self,
        x: &DataMatrix,
        y: &[f64],
        indices: &[usize],
        test: Range<usize>,
    ) -> Result<f64> {
        let predictions = self.predict(x, indices, test.clone())?;
        let mut total_error = 0.0;
        for (offset, row) in test.enumerate() {
            let diff = y[row] - predictions[offset];
            total_error += diff * diff;
        }
        Ok(total_error)
    }

    /// Predicted targets for the rows in `range`, using the last fit.
    pub fn predict(&self, x: &DataMatrix, indices: &[usize], range: Range<usize>) -> Result<Vec<f64>> {
        let coefficients = self
            .coefficients
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("model has not been fitted"))?;
        ensure!(range.end <= x.rows(), "prediction range exceeds data rows");
        let n = range.end.saturating_sub(range.start);
        if n == 0 {
            return Ok(Vec::new());
        }
        let y_hat = if self.cache_matches(indices) {
            let cache = self.cache.as_ref().unwrap();
            cache.full.rows(range.start, n) * coefficients
        } else {
            let rows: Vec<usize> = range.collect();
            design::build_rows(x, indices, &rows) * coefficients
        };
        Ok(y_hat.iter().copied().collect())
    }

    /// Fits on all rows and returns the coefficient vector, whose length is
    /// [`design::term_count`] of the predictor count.
    pub fn final_coefficients(
        &mut self,
        x: &DataMatrix,
        y: &[f64],
        indices: &[usize],
    ) -> Result<Vec<f64>> {
        self.fit(x, y, indices, 0..0)?;
        Ok(self.coefficients())
    }

    /// The last fit's coefficients, or empty when nothing has been fitted.
    pub fn coefficients(&self) -> Vec<f64> {
        self.coefficients
            .as_ref()
            .map(|c| c.as_slice().to_vec())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::design::term_count;

    fn quadratic_data(n: usize) -> (DataMatrix, Vec<f64>) {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let u: Vec<f64> = (0..n).map(|_| rng.gen_range(-2.0..2.0)).collect();
        let v: Vec<f64> = (0..n).map(|_| rng.gen_range(-2.0..2.0)).collect();
        let y: Vec<f64> = u
            .iter()
            .zip(&v)
            .map(|(&a, &b)| 1.5 * a - 0.5 * b + 0.25 * a * a + 2.0 * a * b - 3.0)
            .collect();
        let x = DataMatrix::from_columns(vec![("u".to_string(), u), ("v".to_string(), v)]).unwrap();
        (x, y)
    }

    #[test]
    fn recovers_exact_quadratic_surface() {
        let (x, y) = quadratic_data(120);
        let mut model = LinearQuadraticModel::new();
        let coefficients = model.final_coefficients(&x, &y, &[0, 1]).unwrap();
        assert_eq!(coefficients.len(), term_count(2));
        // Order: u, v, u^2, v^2, u*v, intercept.
        let expected = [1.5, -0.5, 0.25, 0.0, 2.0, -3.0];
        for (got, want) in coefficients.iter().zip(expected) {
            assert!((got - want).abs() < 1e-8, "got {got}, want {want}");
        }
    }

    #[test]
    fn fold_exclusion_trains_on_complement() {
        let (x, y) = quadratic_data(60);
        let mut model = LinearQuadraticModel::new();
        model.fit(&x, &y, &[0, 1], 20..40).unwrap();
        // The surface is exact, so held-out error is numerically zero.
        let sse = model.evaluate(&x, &y, &[0, 1], 20..40).unwrap();
        assert!(sse < 1e-16);
    }

    #[test]
    fn cached_and_uncached_fold_errors_are_identical() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let n = 48;
        let u: Vec<f64> = (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let v: Vec<f64> = (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let y: Vec<f64> = (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let x = DataMatrix::from_columns(vec![("u".to_string(), u), ("v".to_string(), v)]).unwrap();

        let folds = [(0usize, 12usize), (12, 24), (24, 36), (36, 48)];

        // Cached path: the model warms its full matrix once and slices blocks.
        let mut cached = LinearQuadraticModel::new();
        cached.warm_cache(&x, &[0, 1]);
        let cached_errors: Vec<f64> = folds
            .iter()
            .map(|&(start, stop)| {
                cached.fit(&x, &y, &[0, 1], start..stop).unwrap();
                cached.evaluate(&x, &y, &[0, 1], start..stop).unwrap()
            })
            .collect();

        // Manual path: every fold matrix is rebuilt from scratch.
        let manual_errors: Vec<f64> = folds
            .iter()
            .map(|&(start, stop)| {
                let train: Vec<usize> = (0..start).chain(stop..n).collect();
                let a = design::build_rows(&x, &[0, 1], &train);
                let b = DVector::from_iterator(train.len(), train.iter().map(|&r| y[r]));
                let beta = solver::least_squares(&a, &b).unwrap();
                let test: Vec<usize> = (start..stop).collect();
                let y_hat = design::build_rows(&x, &[0, 1], &test) * &beta;
                test.iter()
                    .enumerate()
                    .map(|(i, &r)| (y[r] - y_hat[i]) * (y[r] - y_hat[i]))
                    .sum()
            })
            .collect();

        for (a, b) in cached_errors.iter().zip(&manual_errors) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn cache_invalidated_by_different_indices() {
        let (x, y) = quadratic_data(50);
        let mut model = LinearQuadraticModel::new();
        model.fit(&x, &y, &[0, 1], 0..0).unwrap();
        model.fit(&x, &y, &[0], 10..20).unwrap();
        let sse_cached = model.evaluate(&x, &y, &[0], 10..20).unwrap();
        let mut fresh = LinearQuadraticModel::new();
        fresh.fit(&x, &y, &[0], 10..20).unwrap();
        let sse_fresh = fresh.evaluate(&x, &y, &[0], 10..20).unwrap();
        assert_eq!(sse_cached.to_bits(), sse_fresh.to_bits());
    }

    #[test]
    fn fit_fails_when_everything_is_excluded() {
        let (x, y) = quadratic_data(30);
        let mut model = LinearQuadraticModel::new();
        assert!(model.fit(&x, &y, &[0, 1], 0..30).is_err());
    }

    #[test]
    fn evaluate_before_fit_is_an_error() {
        let (x, y) = quadratic_data(20);
        let model = LinearQuadraticModel::new();
        assert!(model.evaluate(&x, &y, &[0], 0..5).is_err());
    }
}
