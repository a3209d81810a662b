//! In-memory tabular data: ordered, uniquely named, uniformly typed columns.

use crate::error::MlError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Numerical,
    Categorical,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Numerical => write!(f, "numerical"),
            ColumnType::Categorical => write!(f, "categorical"),
        }
    }
}

/// Values of a single column.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Numeric(Vec<f64>),
    Text(Vec<String>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Numeric(v) => v.len(),
            ColumnData::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn column_type(&self) -> ColumnType {
        match self {
            ColumnData::Numeric(_) => ColumnType::Numerical,
            ColumnData::Text(_) => ColumnType::Categorical,
        }
    }

    /// Build a column from raw cells: numeric when every non-blank cell parses
    /// as `f64`. Blank cells are missing values and become `NaN`; a column with
    /// no cells is numeric.
    pub fn infer(cells: Vec<String>) -> Self {
        let parsed: Option<Vec<f64>> = cells.iter().map(|c| parse_cell(c)).collect();
        match parsed {
            Some(values) => ColumnData::Numeric(values),
            None => ColumnData::Text(cells),
        }
    }

    /// Cell at `row` rendered as text.
    pub fn cell(&self, row: usize) -> Option<String> {
        match self {
            ColumnData::Numeric(v) => v.get(row).map(|x| format_number(*x)),
            ColumnData::Text(v) => v.get(row).cloned(),
        }
    }

    /// All cells rendered as text.
    pub fn to_strings(&self) -> Vec<String> {
        match self {
            ColumnData::Numeric(v) => v.iter().map(|x| format_number(*x)).collect(),
            ColumnData::Text(v) => v.clone(),
        }
    }

    fn take(&self, rows: &[usize]) -> Self {
        match self {
            ColumnData::Numeric(v) => ColumnData::Numeric(rows.iter().map(|&i| v[i]).collect()),
            ColumnData::Text(v) => ColumnData::Text(rows.iter().map(|&i| v[i].clone()).collect()),
        }
    }
}

fn parse_cell(cell: &str) -> Option<f64> {
    let cell = cell.trim();
    if cell.is_empty() {
        Some(f64::NAN)
    } else {
        cell.parse().ok()
    }
}

// Integral values print without a trailing `.0` so labels like `3` survive a CSV round trip.
// Missing values print as an empty cell.
fn format_number(x: f64) -> String {
    if x.is_nan() {
        String::new()
    } else if x.fract() == 0.0 && x.abs() < 1e15 {
        format!("{}", x as i64)
    } else {
        x.to_string()
    }
}

/// A named column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn numeric(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self::new(name, ColumnData::Numeric(values))
    }

    pub fn text<S: Into<String>>(name: impl Into<String>, values: impl IntoIterator<Item = S>) -> Self {
        Self::new(
            name,
            ColumnData::Text(values.into_iter().map(Into::into).collect()),
        )
    }
}

/// Ordered collection of equally long, uniquely named columns.
///
/// Column names are case-sensitive and compared exactly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataFrame {
    columns: Vec<Column>,
}

impl DataFrame {
    pub fn new(columns: Vec<Column>) -> Result<Self, MlError> {
        let mut frame = Self::default();
        for column in columns {
            frame.append_column(column)?;
        }
        Ok(frame)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, |c| c.data.len())
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Numeric values of `name`, or an error if it is absent or not numeric.
    pub fn numeric(&self, name: &str) -> Result<&[f64], MlError> {
        match self.column(name).map(|c| &c.data) {
            Some(ColumnData::Numeric(values)) => Ok(values),
            Some(ColumnData::Text(_)) => Err(MlError::dataset(format!(
                "column '{name}' is not numerical"
            ))),
            None => Err(MlError::dataset(format!("column '{name}' is missing"))),
        }
    }

    /// Append a column at the end.
    ///
    /// Fails on a duplicate name or when the length differs from the existing rows.
    pub fn append_column(&mut self, column: Column) -> Result<(), MlError> {
        if self.has_column(&column.name) {
            return Err(MlError::dataset(format!(
                "duplicate column '{}'",
                column.name
            )));
        }
        if !self.columns.is_empty() && column.data.len() != self.row_count() {
            return Err(MlError::dataset(format!(
                "column '{}' has {} rows, frame has {}",
                column.name,
                column.data.len(),
                self.row_count()
            )));
        }
        self.columns.push(column);
        Ok(())
    }

    /// Remove and return the column named `name`, if present.
    pub fn drop_column(&mut self, name: &str) -> Option<Column> {
        let idx = self.columns.iter().position(|c| c.name == name)?;
        Some(self.columns.remove(idx))
    }

    /// A new frame holding the given rows, in the given order.
    pub fn take_rows(&self, rows: &[usize]) -> Result<Self, MlError> {
        let n = self.row_count();
        if let Some(bad) = rows.iter().find(|&&i| i >= n) {
            return Err(MlError::dataset(format!(
                "row index {bad} out of bounds for {n} rows"
            )));
        }
        Ok(Self {
            columns: self
                .columns
                .iter()
                .map(|c| Column::new(c.name.clone(), c.data.take(rows)))
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DataFrame {
        DataFrame::new(vec![
            Column::numeric("Elevation", vec![2596.0, 2590.0, 2804.0]),
            Column::text("Soil", ["a", "b", "c"]),
        ])
        .unwrap()
    }

    #[test]
    fn test_shape() {
        let df = sample();
        assert_eq!(df.column_count(), 2);
        assert_eq!(df.row_count(), 3);
        assert_eq!(df.column_names(), vec!["Elevation", "Soil"]);
    }

    #[test]
    fn test_column_names_are_case_sensitive() {
        let df = sample();
        assert!(df.has_column("Elevation"));
        assert!(!df.has_column("elevation"));
    }

    #[test]
    fn test_append_rejects_length_mismatch() {
        let mut df = sample();
        let err = df
            .append_column(Column::numeric("Slope", vec![1.0]))
            .unwrap_err();
        assert!(err.to_string().contains("has 1 rows"));
    }

    #[test]
    fn test_append_rejects_duplicate() {
        let mut df = sample();
        assert!(
            df.append_column(Column::text("Soil", ["x", "y", "z"]))
                .is_err()
        );
    }

    #[test]
    fn test_take_rows_reorders() {
        let df = sample().take_rows(&[2, 0]).unwrap();
        assert_eq!(df.numeric("Elevation").unwrap(), &[2804.0, 2596.0]);
        assert!(sample().take_rows(&[3]).is_err());
    }

    #[test]
    fn test_infer_column_type() {
        let numeric = ColumnData::infer(vec!["1".into(), " 2.5".into()]);
        assert_eq!(numeric.column_type(), ColumnType::Numerical);
        let text = ColumnData::infer(vec!["1".into(), "two".into()]);
        assert_eq!(text.column_type(), ColumnType::Categorical);
    }

    #[test]
    fn test_blank_cells_are_missing_numbers() {
        let col = ColumnData::infer(vec!["100".into(), "".into(), " ".into(), "900".into()]);
        let ColumnData::Numeric(values) = &col else {
            panic!("expected a numeric column, got {col:?}");
        };
        assert_eq!(values[0], 100.0);
        assert!(values[1].is_nan());
        assert!(values[2].is_nan());
        assert_eq!(values[3], 900.0);
        assert_eq!(col.to_strings(), vec!["100", "", "", "900"]);
    }

    #[test]
    fn test_no_cells_is_numeric() {
        let col = ColumnData::infer(Vec::new());
        assert_eq!(col, ColumnData::Numeric(Vec::new()));
    }

    #[test]
    fn test_integral_numbers_render_without_fraction() {
        let col = ColumnData::Numeric(vec![3.0, 0.25]);
        assert_eq!(col.to_strings(), vec!["3", "0.25"]);
    }

    #[test]
    fn test_numeric_accessor_errors() {
        let df = sample();
        assert!(df.numeric("Soil").is_err());
        assert!(df.numeric("Slope").is_err());
    }
}
