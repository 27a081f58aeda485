//! The linear-quadratic design expansion.
//!
//! For a predictor set of size `p` the design matrix holds, in this exact
//! column order: the `p` linear terms (in the order the predictors were
//! given), the `p` elementwise squares (same order), the `p(p-1)/2` pairwise
//! products `(i, j)` with `i < j` (outer loop `i`), and one intercept column
//! of ones. Final-model coefficients are addressed by position, so this
//! order is a contract.

use nalgebra::DMatrix;

use crate::matrix::DataMatrix;

/// Number of columns in the expansion of `p` predictors, including the
/// intercept: `p(p+3)/2 + 1`.
pub const fn term_count(p: usize) -> usize {
    p * (p + 3) / 2 + 1
}

/// Builds the expansion for every row of `x`.
pub fn build_full(x: &DataMatrix, indices: &[usize]) -> DMatrix<f64> {
    let n_rows = x.rows();
    let npred = indices.len();
    let mut a = DMatrix::zeros(n_rows, term_count(npred));

    let mut col = 0;
    for &idx in indices {
        let source = x.column(idx);
        for (row, &value) in source.iter().enumerate() {
            a[(row, col)] = value;
        }
        col += 1;
    }
    for p in 0..npred {
        for row in 0..n_rows {
            let value = a[(row, p)];
            a[(row, col)] = value * value;
        }
        col += 1;
    }
    for p1 in 0..npred {
        for p2 in (p1 + 1)..npred {
            for row in 0..n_rows {
                a[(row, col)] = a[(row, p1)] * a[(row, p2)];
            }
            col += 1;
        }
    }
    for row in 0..n_rows {
        a[(row, col)] = 1.0;
    }
    a
}

/// Builds the expansion for an explicit ordered list of rows.
pub fn build_rows(x: &DataMatrix, indices: &[usize], rows: &[usize]) -> DMatrix<f64> {
    let npred = indices.len();
    let mut a = DMatrix::zeros(rows.len(), term_count(npred));

    for (i, &case) in rows.iter().enumerate() {
        let mut col = 0;
        for &idx in indices {
            a[(i, col)] = x.get(case, idx);
            col += 1;
        }
        for &idx in indices {
            let value = x.get(case, idx);
            a[(i, col)] = value * value;
            col += 1;
        }
        for p1 in 0..npred {
            for p2 in (p1 + 1)..npred {
                a[(i, col)] = x.get(case, indices[p1]) * x.get(case, indices[p2]);
                col += 1;
            }
        }
        a[(i, col)] = 1.0;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn term_counts() {
        assert_eq!(term_count(0), 1);
        assert_eq!(term_count(1), 3);
        assert_eq!(term_count(2), 6);
        assert_eq!(term_count(3), 10);
        assert_eq!(term_count(5), 21);
    }

    #[test]
    fn column_order_is_linear_square_product_intercept() {
        let x = DataMatrix::from_columns(vec![
            ("u".to_string(), vec![2.0, 3.0]),
            ("v".to_string(), vec![5.0, 7.0]),
        ])
        .unwrap();
        let a = build_full(&x, &[0, 1]);
        assert_eq!(a.shape(), (2, 6));
        // Row 0: u, v, u^2, v^2, u*v, 1.
        let expected = [2.0, 5.0, 4.0, 25.0, 10.0, 1.0];
        for (col, want) in expected.iter().enumerate() {
            assert_eq!(a[(0, col)], *want);
        }
        assert_eq!(a[(1, 4)], 21.0);
    }

    #[test]
    fn interaction_order_for_three_predictors() {
        let x = DataMatrix::from_columns(vec![
            ("a".to_string(), vec![2.0]),
            ("b".to_string(), vec![3.0]),
            ("c".to_string(), vec![5.0]),
        ])
        .unwrap();
        let a = build_full(&x, &[0, 1, 2]);
        assert_eq!(a.shape(), (1, 10));
        // Products iterate (0,1), (0,2), (1,2).
        assert_eq!(a[(0, 6)], 6.0);
        assert_eq!(a[(0, 7)], 10.0);
        assert_eq!(a[(0, 8)], 15.0);
        assert_eq!(a[(0, 9)], 1.0);
    }

    #[test]
    fn row_subset_matches_full_build() {
        let x = DataMatrix::from_columns(vec![
            ("a".to_string(), vec![1.0, 2.0, 3.0, 4.0]),
            ("b".to_string(), vec![-1.0, 0.0, 1.0, 2.0]),
        ])
        .unwrap();
        let full = build_full(&x, &[0, 1]);
        let subset = build_rows(&x, &[0, 1], &[1, 3]);
        for col in 0..full.ncols() {
            assert_eq!(subset[(0, col)], full[(1, col)]);
            assert_eq!(subset[(1, col)], full[(3, col)]);
        }
    }
}
