//! Data source abstraction for loading raw datasets.

use crate::data::schema::parse_cell;
use crate::data::table::DataBatch;
use crate::error::MlError;
use csv::ReaderBuilder;
use std::path::PathBuf;

/// Trait for loading raw tabular data.
pub trait DataSource {
    /// Load the full table.
    fn load(&self) -> Result<DataBatch, MlError>;
}

// ---------------------------------------------------------------------------
// CsvSource
// ---------------------------------------------------------------------------

/// CSV file with a header row.
pub struct CsvSource {
    pub path: PathBuf,
    pub delimiter: char,
    /// Tokens read as missing values.
    pub na_values: Vec<String>,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>, delimiter: char, na_values: Vec<String>) -> Self {
        Self {
            path: path.into(),
            delimiter,
            na_values,
        }
    }

    fn delimiter_byte(&self) -> Result<u8, MlError> {
        u8::try_from(self.delimiter)
            .ok()
            .filter(|b| b.is_ascii())
            .ok_or_else(|| {
                MlError::dataset(format!(
                    "CSV delimiter {:?} is not a single ASCII character",
                    self.delimiter
                ))
            })
    }
}

impl DataSource for CsvSource {
    fn load(&self) -> Result<DataBatch, MlError> {
        let mut reader = ReaderBuilder::new()
            .delimiter(self.delimiter_byte()?)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(&self.path)
            .map_err(|e| {
                MlError::dataset(format!("Failed to open {}: {e}", self.path.display()))
            })?;

        let columns: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
        if columns.is_empty() {
            return Err(MlError::dataset(format!(
                "Empty CSV file: {}",
                self.path.display()
            )));
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            if record.iter().all(|field| field.is_empty()) {
                continue;
            }
            // Short rows are padded with nulls so cleaning drops them.
            let row = (0..columns.len())
                .map(|i| match record.get(i) {
                    Some(field) => parse_cell(field, &self.na_values),
                    None => serde_json::Value::Null,
                })
                .collect();
            rows.push(row);
        }

        Ok(DataBatch::new(columns, rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use tempfile::TempDir;

    fn na() -> Vec<String> {
        vec![String::new(), "NA".to_string(), "?".to_string()]
    }

    #[test]
    fn test_csv_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("iris.csv");
        std::fs::write(
            &path,
            "sepal,petal,species\n5.1,1.4,setosa\n7.0,?,versicolor\n\n6.3,6.0,virginica\n",
        )
        .unwrap();

        let batch = CsvSource::new(&path, ',', na()).load().unwrap();
        assert_eq!(batch.columns, vec!["sepal", "petal", "species"]);
        assert_eq!(batch.row_count(), 3);
        assert_eq!(batch.rows[0][0], json!(5.1));
        assert_eq!(batch.rows[1][1], Value::Null);
        assert_eq!(batch.rows[2][2], json!("virginica"));
    }

    #[test]
    fn test_csv_semicolon_and_short_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wine.csv");
        std::fs::write(&path, "a;b;quality\n1;2;5\n3\n").unwrap();

        let batch = CsvSource::new(&path, ';', na()).load().unwrap();
        assert_eq!(batch.row_count(), 2);
        assert_eq!(batch.rows[1], vec![json!(3), Value::Null, Value::Null]);
    }

    #[test]
    fn test_csv_missing_file() {
        let src = CsvSource::new("/nonexistent/data.csv", ',', na());
        assert!(matches!(src.load(), Err(MlError::Dataset(_))));
    }

    #[test]
    fn test_csv_rejects_wide_delimiter() {
        let src = CsvSource::new("data.csv", '→', na());
        assert!(src.load().is_err());
    }
}
