//! In-memory tabular data exchanged between the registry, the store and the models.

use crate::error::MlError;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// A table of named columns whose cells are JSON scalars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataBatch {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub total_rows: usize,
}

impl DataBatch {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let total_rows = rows.len();
        Self {
            columns,
            rows,
            total_rows,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new())
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Values of one column, in row order.
    pub fn column_values(&self, idx: usize) -> Vec<Value> {
        self.rows
            .iter()
            .map(|row| row.get(idx).cloned().unwrap_or(Value::Null))
            .collect()
    }

    /// Drop every row holding a null (or missing) cell.
    pub fn drop_nulls(mut self) -> Self {
        let width = self.columns.len();
        self.rows
            .retain(|row| row.len() == width && row.iter().all(|v| !v.is_null()));
        self.total_rows = self.rows.len();
        self
    }

    /// Keep only the given columns, in the given order.
    pub fn select(&self, indices: &[usize]) -> DataBatch {
        let columns = indices.iter().map(|&i| self.columns[i].clone()).collect();
        let rows = self
            .rows
            .iter()
            .map(|row| {
                indices
                    .iter()
                    .map(|&i| row.get(i).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();
        DataBatch::new(columns, rows)
    }

    /// Rows at the given positions, in the given order.
    pub fn take_rows(&self, indices: &[usize]) -> DataBatch {
        let rows = indices.iter().map(|&i| self.rows[i].clone()).collect();
        DataBatch::new(self.columns.clone(), rows)
    }

    /// Convert every cell to `f64` for model input.
    ///
    /// Fails on null cells and on strings that do not parse as numbers.
    pub fn to_feature_matrix(&self) -> Result<Array2<f64>, MlError> {
        let n_rows = self.rows.len();
        let n_cols = self.columns.len();
        let mut data = Vec::with_capacity(n_rows * n_cols);
        for (r, row) in self.rows.iter().enumerate() {
            if row.len() != n_cols {
                return Err(MlError::invalid_input(format!(
                    "row {r} has {} cells, expected {n_cols}",
                    row.len()
                )));
            }
            for (c, cell) in row.iter().enumerate() {
                let value = numeric_value(cell).ok_or_else(|| {
                    MlError::invalid_input(format!(
                        "non-numeric value {cell} in column '{}' (row {r})",
                        self.columns[c]
                    ))
                })?;
                data.push(value);
            }
        }
        Array2::from_shape_vec((n_rows, n_cols), data)
            .map_err(|e| MlError::invalid_input(format!("feature matrix shape: {e}")))
    }

    /// Class labels of a single-column table, as canonical strings.
    pub fn to_labels(&self) -> Result<Vec<String>, MlError> {
        if self.columns.len() != 1 {
            return Err(MlError::invalid_input(format!(
                "label table must have exactly one column, found {}",
                self.columns.len()
            )));
        }
        self.rows
            .iter()
            .enumerate()
            .map(|(r, row)| match row.first() {
                Some(v) if !v.is_null() => Ok(label_key(v)),
                _ => Err(MlError::invalid_input(format!("missing label in row {r}"))),
            })
            .collect()
    }
}

/// Numeric view of a cell. Booleans map to 0/1, numeric strings are parsed.
pub fn numeric_value(cell: &Value) -> Option<f64> {
    match cell {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Canonical text of a label. Whole floats collapse to integers so `1.0` and `1` agree.
pub fn label_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(f) = n.as_f64() {
                if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
                    (f as i64).to_string()
                } else {
                    f.to_string()
                }
            } else {
                n.to_string()
            }
        }
        other => other.to_string(),
    }
}

/// Label ordering: numerically when both parse as numbers, lexically otherwise.
pub fn compare_labels(a: &str, b: &str) -> Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a.cmp(b),
    }
}
