use anyhow::{ensure, Result};

/// Dense `rows x cols` matrix of `f64` values with named columns.
///
/// Storage is column-major, so a whole column is one contiguous slice. That
/// is the access pattern everything downstream cares about: column scans for
/// the design expansion and per-column standardization.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DataMatrix {
    data: Vec<f64>,
    n_rows: usize,
    n_cols: usize,
    column_names: Vec<String>,
}

impl DataMatrix {
    /// A zero-filled matrix with empty column names.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            data: vec![0.0; rows * cols],
            n_rows: rows,
            n_cols: cols,
            column_names: vec![String::new(); cols],
        }
    }

    /// Builds a matrix from named columns, which must all have equal length.
    pub fn from_columns(columns: Vec<(String, Vec<f64>)>) -> Result<Self> {
        let n_rows = columns.first().map_or(0, |(_, values)| values.len());
        let n_cols = columns.len();
        let mut data = Vec::with_capacity(n_rows * n_cols);
        let mut column_names = Vec::with_capacity(n_cols);
        for (name, values) in columns {
            ensure!(
                values.len() == n_rows,
                "column '{}' has {} rows, expected {}",
                name,
                values.len(),
                n_rows
            );
            data.extend_from_slice(&values);
            column_names.push(name);
        }
        Ok(Self {
            data,
            n_rows,
            n_cols,
            column_names,
        })
    }

    pub fn rows(&self) -> usize {
        self.n_rows
    }

    pub fn cols(&self) -> usize {
        self.n_cols
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        debug_assert!(row < self.n_rows && col < self.n_cols);
        self.data[col * self.n_rows + row]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        debug_assert!(row < self.n_rows && col < self.n_cols);
        self.data[col * self.n_rows + row] = value;
    }

    /// Contiguous view of one column.
    pub fn column(&self, col: usize) -> &[f64] {
        assert!(col < self.n_cols, "column index {col} out of range");
        &self.data[col * self.n_rows..(col + 1) * self.n_rows]
    }

    pub fn column_mut(&mut self, col: usize) -> &mut [f64] {
        assert!(col < self.n_cols, "column index {col} out of range");
        &mut self.data[col * self.n_rows..(col + 1) * self.n_rows]
    }

    pub fn copy_column(&self, col: usize) -> Vec<f64> {
        self.column(col).to_vec()
    }

    /// Replaces all column names. The count must match the column count.
    pub fn set_column_names(&mut self, names: Vec<String>) -> Result<()> {
        ensure!(
            names.len() == self.n_cols,
            "got {} column names for {} columns",
            names.len(),
            self.n_cols
        );
        self.column_names = names;
        Ok(())
    }

    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// The name of a column, or a synthesized `Col_{index}` label when the
    /// column was never named.
    pub fn column_name(&self, col: usize) -> String {
        match self.column_names.get(col) {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format!("Col_{col}"),
        }
    }

    pub fn find_column(&self, name: &str) -> Option<usize> {
        self.column_names.iter().position(|n| n == name)
    }

    /// Standardizes one column in place to zero mean and unit population
    /// standard deviation (divisor `n`). A zero standard deviation is treated
    /// as 1 so constant columns stay finite.
    pub fn standardize_column(&mut self, col: usize) {
        let column = self.column_mut(col);
        standardize(column);
    }
}

/// Population mean and standard deviation (divisor `n`, not `n - 1`).
pub fn population_moments(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// In-place population z-scoring; a zero standard deviation acts as 1.
pub fn standardize(values: &mut [f64]) {
    let (mean, std_dev) = population_moments(values);
    let std_dev = if std_dev == 0.0 { 1.0 } else { std_dev };
    for v in values.iter_mut() {
        *v = (*v - mean) / std_dev;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_matrix() -> DataMatrix {
        DataMatrix::from_columns(vec![
            ("a".to_string(), vec![1.0, 2.0, 3.0, 4.0]),
            ("b".to_string(), vec![5.0, 5.0, 5.0, 5.0]),
            ("c".to_string(), vec![-1.0, 0.5, 2.0, 0.0]),
        ])
        .unwrap()
    }

    #[test]
    fn column_major_layout() {
        let m = sample_matrix();
        assert_eq!(m.rows(), 4);
        assert_eq!(m.cols(), 3);
        assert_eq!(m.get(2, 0), 3.0);
        assert_eq!(m.get(1, 2), 0.5);
        assert_eq!(m.column(0), &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn from_columns_rejects_ragged_input() {
        let result = DataMatrix::from_columns(vec![
            ("a".to_string(), vec![1.0, 2.0]),
            ("b".to_string(), vec![1.0]),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn column_name_fallback() {
        let m = DataMatrix::new(2, 2);
        assert_eq!(m.column_name(1), "Col_1");
        let named = sample_matrix();
        assert_eq!(named.column_name(2), "c");
        assert_eq!(named.find_column("b"), Some(1));
        assert_eq!(named.find_column("missing"), None);
    }

    #[test]
    fn standardization_yields_population_z_scores() {
        let mut m = sample_matrix();
        m.standardize_column(0);
        let (mean, std_dev) = population_moments(m.column(0));
        assert!(mean.abs() < 1e-10);
        assert!((std_dev - 1.0).abs() < 1e-10);
    }

    #[test]
    fn standardization_is_idempotent() {
        let mut m = sample_matrix();
        m.standardize_column(2);
        let once = m.column(2).to_vec();
        m.standardize_column(2);
        for (a, b) in once.iter().zip(m.column(2)) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn constant_column_standardizes_to_zero() {
        let mut m = sample_matrix();
        m.standardize_column(1);
        assert!(m.column(1).iter().all(|&v| v == 0.0));
    }
}
