//! Whitespace-separated data file loading.
//!
//! The first line is a header of column names; every following line is one
//! record. Records with a non-numeric or missing value in any requested
//! column are skipped and counted. An optional half-open record range
//! restricts loading (the header line is not counted as a record).

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::ops::Range;
use std::path::Path;

use anyhow::{anyhow, ensure, Context, Result};
use stepwise_linalg::matrix::DataMatrix;

/// A loaded feature matrix and target, with load statistics.
#[derive(Clone, Debug)]
pub struct LoadedTable {
    pub features: DataMatrix,
    pub target: Vec<f64>,
    /// Records that survived filtering.
    pub n_cases_loaded: usize,
    /// In-range records dropped for unparsable or missing fields.
    pub n_cases_skipped: usize,
    /// All records seen in the file, in range or not.
    pub n_records_total: usize,
}

/// Loads the requested feature columns and target column from a
/// whitespace-separated table.
pub fn load_table(
    path: &Path,
    feature_names: &[String],
    target_name: &str,
    rows: Option<Range<usize>>,
) -> Result<LoadedTable> {
    let file = File::open(path)
        .with_context(|| format!("could not open data file {}", path.display()))?;
    let mut lines = BufReader::new(file).lines();

    let header = lines
        .next()
        .ok_or_else(|| anyhow!("data file {} is empty", path.display()))??;
    let header_fields: Vec<&str> = header.split_whitespace().collect();
    let position = |name: &str| -> Result<usize> {
        header_fields
            .iter()
            .position(|field| *field == name)
            .ok_or_else(|| anyhow!("column '{name}' not found in header"))
    };
    let feature_positions: Vec<usize> = feature_names
        .iter()
        .map(|name| position(name))
        .collect::<Result<_>>()?;
    let target_position = position(target_name)?;

    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); feature_names.len()];
    let mut target = Vec::new();
    let mut n_cases_skipped = 0;
    let mut n_records_total = 0;

    for (record, line) in lines.enumerate() {
        let line = line.with_context(|| format!("read error in {}", path.display()))?;
        n_records_total += 1;
        if let Some(range) = &rows {
            if record < range.start {
                continue;
            }
            if record >= range.end {
                break;
            }
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        let parse = |pos: usize| fields.get(pos).and_then(|field| field.parse::<f64>().ok());
        let feature_values: Option<Vec<f64>> =
            feature_positions.iter().map(|&pos| parse(pos)).collect();
        match (feature_values, parse(target_position)) {
            (Some(values), Some(target_value)) => {
                for (column, value) in columns.iter_mut().zip(values) {
                    column.push(value);
                }
                target.push(target_value);
            }
            _ => n_cases_skipped += 1,
        }
    }

    let n_cases_loaded = target.len();
    ensure!(
        n_cases_loaded > 0,
        "no valid data rows in {} for the requested columns",
        path.display()
    );

    let named: Vec<(String, Vec<f64>)> = feature_names
        .iter()
        .cloned()
        .zip(columns)
        .collect();
    Ok(LoadedTable {
        features: DataMatrix::from_columns(named)?,
        target,
        n_cases_loaded,
        n_cases_skipped,
        n_records_total,
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    const TABLE: &str = "\
date open close volume
1 10.0 11.0 100
2 10.5 11.5 200
3 bad 12.0 300
4 11.0 12.5 400
5 11.5 13.0
6 12.0 13.5 600
";

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn loads_requested_columns_and_skips_bad_rows() {
        let file = write_file(TABLE);
        let loaded =
            load_table(file.path(), &names(&["open", "close"]), "volume", None).unwrap();
        // Record 3 has a non-numeric "open"; record 5 is missing "volume".
        assert_eq!(loaded.n_cases_loaded, 4);
        assert_eq!(loaded.n_cases_skipped, 2);
        assert_eq!(loaded.n_records_total, 6);
        assert_eq!(loaded.features.cols(), 2);
        assert_eq!(loaded.features.column(0), &[10.0, 10.5, 11.0, 12.0]);
        assert_eq!(loaded.target, vec![100.0, 200.0, 400.0, 600.0]);
        assert_eq!(loaded.features.column_name(1), "close");
    }

    #[test]
    fn row_range_slices_records_not_lines() {
        let file = write_file(TABLE);
        let loaded =
            load_table(file.path(), &names(&["open"]), "close", Some(1..4)).unwrap();
        // Records 1..4 are the 2nd through 4th data lines; the bad row is
        // inside the range and skipped.
        assert_eq!(loaded.n_cases_loaded, 2);
        assert_eq!(loaded.n_cases_skipped, 1);
        assert_eq!(loaded.features.column(0), &[10.5, 11.0]);
    }

    #[test]
    fn missing_column_is_an_error() {
        let file = write_file(TABLE);
        let err = load_table(file.path(), &names(&["nope"]), "close", None).unwrap_err();
        assert!(err.to_string().contains("'nope'"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = load_table(
            Path::new("/definitely/not/here.txt"),
            &names(&["a"]),
            "b",
            None,
        )
        .unwrap_err();
        assert!(err.to_string().contains("could not open"));
    }

    #[test]
    fn all_rows_invalid_is_an_error() {
        let file = write_file("a b\nx y\np q\n");
        assert!(load_table(file.path(), &names(&["a"]), "b", None).is_err());
    }
}
