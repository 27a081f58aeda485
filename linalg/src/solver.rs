//! Adaptive dense least-squares solvers.
//!
//! Three strategies are available, ordered by cost: Cholesky on the normal
//! equations, Householder QR, and thin SVD. [`least_squares`] picks among
//! them per system: normal equations only for small, strongly overdetermined,
//! well-conditioned problems; QR when the conditioning check fails in that
//! regime; SVD for everything else.

use anyhow::{anyhow, bail, Result};
use nalgebra::{Cholesky, DMatrix, DVector, SVD};

/// Normal-equation path is only considered up to this many terms.
const MAX_NORMAL_EQUATION_TERMS: usize = 50;
/// Rough conditioning gate: max/min diagonal ratio of `A'A`.
const MAX_DIAGONAL_RATIO: f64 = 1e6;
/// Singular values below this are treated as zero by the SVD solve.
const SVD_EPSILON: f64 = 1e-12;

/// Solves `min ||A b - y||` choosing the cheapest solver the system allows.
pub fn least_squares(a: &DMatrix<f64>, b: &DVector<f64>) -> Result<DVector<f64>> {
    let (n_rows, n_cols) = a.shape();
    if n_rows == 0 || n_cols == 0 {
        bail!("empty design matrix ({n_rows} x {n_cols})");
    }
    if n_cols <= MAX_NORMAL_EQUATION_TERMS && n_rows >= 2 * n_cols {
        let ata = a.tr_mul(a);
        if let Some(solution) = try_normal_equations(&ata, a, b) {
            return Ok(solution);
        }
        return householder_qr(a, b);
    }
    thin_svd(a, b)
}

fn try_normal_equations(
    ata: &DMatrix<f64>,
    a: &DMatrix<f64>,
    b: &DVector<f64>,
) -> Option<DVector<f64>> {
    let cholesky = Cholesky::new(ata.clone())?;
    let diagonal = ata.diagonal();
    let max = diagonal.max();
    let min = diagonal.min();
    if min <= 0.0 || max / min >= MAX_DIAGONAL_RATIO {
        return None;
    }
    Some(cholesky.solve(&a.tr_mul(b)))
}

/// Least squares via Cholesky of `A'A`. Fails when the factorization does.
pub fn normal_equations(a: &DMatrix<f64>, b: &DVector<f64>) -> Result<DVector<f64>> {
    let ata = a.tr_mul(a);
    let cholesky =
        Cholesky::new(ata).ok_or_else(|| anyhow!("Cholesky factorization of A'A failed"))?;
    Ok(cholesky.solve(&a.tr_mul(b)))
}

/// Least squares via Householder QR. Requires `n_rows >= n_cols`.
pub fn householder_qr(a: &DMatrix<f64>, b: &DVector<f64>) -> Result<DVector<f64>> {
    let qr = a.clone().qr();
    let qtb = qr.q().transpose() * b;
    qr.r()
        .solve_upper_triangular(&qtb)
        .ok_or_else(|| anyhow!("QR back-substitution failed (singular R)"))
}

/// Least squares via thin SVD; the most robust path.
pub fn thin_svd(a: &DMatrix<f64>, b: &DVector<f64>) -> Result<DVector<f64>> {
    let svd = SVD::new(a.clone(), true, true);
    svd.solve(b, SVD_EPSILON)
        .map_err(|err| anyhow!("SVD solve failed: {err}"))
}
