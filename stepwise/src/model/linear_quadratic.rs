//! [`RegressionModel`] adapter over the substrate linear-quadratic solver.

use std::ops::Range;

use anyhow::Result;
use stepwise_linalg::matrix::DataMatrix;
use stepwise_linalg::model::LinearQuadraticModel;

use super::RegressionModel;

/// The default model: linear + square + pairwise-interaction + intercept
/// terms solved by adaptive least squares, with a cached design matrix for
/// fast fold extraction.
#[derive(Clone, Debug, Default)]
pub struct LinearQuadratic {
    inner: LinearQuadraticModel,
}

impl LinearQuadratic {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RegressionModel for LinearQuadratic {
    fn fit(
        &mut self,
        x: &DataMatrix,
        y: &[f64],
        indices: &[usize],
        exclude: Range<usize>,
    ) -> Result<()> {
        self.inner.fit(x, y, indices, exclude)
    }

    fn predict(&self, x: &DataMatrix, indices: &[usize], range: Range<usize>) -> Result<Vec<f64>> {
        self.inner.predict(x, indices, range)
    }

    fn sse(&self, x: &DataMatrix, y: &[f64], indices: &[usize], range: Range<usize>) -> Result<f64> {
        self.inner.evaluate(x, y, indices, range)
    }

    fn clone_unfitted(&self) -> Box<dyn RegressionModel> {
        Box::new(Self::new())
    }

    fn has_coefficients(&self) -> bool {
        true
    }

    fn coefficients(&mut self, x: &DataMatrix, y: &[f64], indices: &[usize]) -> Result<Vec<f64>> {
        self.inner.final_coefficients(x, y, indices)
    }

    fn kind(&self) -> &'static str {
        "linear-quadratic"
    }
}
