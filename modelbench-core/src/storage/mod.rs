//! Relational persistence of split tables, dataset metadata and trial results.

pub mod sqlite;

pub use sqlite::SqliteStore;

use crate::data::table::DataBatch;
use crate::error::MlError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Typed access to the benchmark store.
///
/// Writes to different tables are independent; there is no cross-table transaction.
pub trait Storage {
    /// Whether the store answers a trivial query.
    fn test_connection(&self) -> bool;

    /// Replace `table` with the contents of `batch`.
    fn write_table(&self, batch: &DataBatch, table: &str) -> Result<(), MlError>;

    /// Read a whole table in insertion order.
    fn read_table(&self, table: &str) -> Result<DataBatch, MlError>;

    /// Insert or replace the metadata row of one dataset.
    fn append_metadata(&self, record: &DatasetMetadata) -> Result<(), MlError>;

    fn read_metadata(&self) -> Result<Vec<DatasetMetadata>, MlError>;

    /// Append one trial result.
    fn append_result(&self, record: &TestResult) -> Result<(), MlError>;

    fn read_all_results(&self) -> Result<Vec<TestResult>, MlError>;
}

/// Where the split tables of an ingested dataset live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub dataset_name: String,
    #[serde(rename = "beschreibung")]
    pub description: String,
    #[serde(rename = "df_tabelle")]
    pub combined_table: String,
    #[serde(rename = "x_test_tabelle")]
    pub x_test_table: String,
    #[serde(rename = "x_train_tabelle")]
    pub x_train_table: String,
    #[serde(rename = "y_test_tabelle")]
    pub y_test_table: String,
    #[serde(rename = "y_train_tabelle")]
    pub y_train_table: String,
}

impl DatasetMetadata {
    /// Metadata with the deterministic table names derived from `name`.
    pub fn for_dataset(name: &str, description: &str) -> Self {
        Self {
            dataset_name: name.to_string(),
            description: description.to_string(),
            combined_table: format!("{name}_df"),
            x_test_table: format!("{name}_X_test"),
            x_train_table: format!("{name}_X_train"),
            y_test_table: format!("{name}_y_test"),
            y_train_table: format!("{name}_y_train"),
        }
    }
}

/// One evaluated trial. Field names on the wire follow the results table columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    #[serde(rename = "modellname")]
    pub model_name: String,
    #[serde(rename = "datenname")]
    pub dataset_name: String,
    /// 1-based trial index.
    #[serde(rename = "durchgang")]
    pub trial: u32,
    pub score: f64,
    pub f1: f64,
    /// Train plus evaluate wall-clock time in seconds.
    #[serde(rename = "dauer")]
    pub duration_secs: f64,
    #[serde(rename = "laufzeit")]
    pub timestamp: DateTime<Utc>,
    /// Confusion matrix as JSON nested-list text.
    #[serde(rename = "cm")]
    pub confusion_matrix: String,
}

/// Square grid of counts; rows are actual labels, columns predicted labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfusionMatrix {
    counts: Vec<Vec<u64>>,
}

impl ConfusionMatrix {
    pub fn new(counts: Vec<Vec<u64>>) -> Result<Self, MlError> {
        let n = counts.len();
        if let Some((i, row)) = counts.iter().enumerate().find(|(_, row)| row.len() != n) {
            return Err(MlError::invalid_input(format!(
                "confusion matrix row {i} has {} entries, expected {n}",
                row.len()
            )));
        }
        Ok(Self { counts })
    }

    /// Zero matrix of the given dimension.
    pub fn zeros(n: usize) -> Self {
        Self {
            counts: vec![vec![0; n]; n],
        }
    }

    pub fn dimension(&self) -> usize {
        self.counts.len()
    }

    pub fn rows(&self) -> &[Vec<u64>] {
        &self.counts
    }

    pub fn increment(&mut self, actual: usize, predicted: usize) {
        self.counts[actual][predicted] += 1;
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().flatten().sum()
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.counts).unwrap_or_else(|_| "[]".to_string())
    }

    /// Parse the stored text form, validating that the grid is square.
    pub fn parse(text: &str) -> Result<Self, MlError> {
        let counts: Vec<Vec<u64>> = serde_json::from_str(text.trim())?;
        Self::new(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_table_names() {
        let meta = DatasetMetadata::for_dataset("iris", "Fisher's iris");
        assert_eq!(meta.combined_table, "iris_df");
        assert_eq!(meta.x_train_table, "iris_X_train");
        assert_eq!(meta.x_test_table, "iris_X_test");
        assert_eq!(meta.y_train_table, "iris_y_train");
        assert_eq!(meta.y_test_table, "iris_y_test");
    }

    #[test]
    fn test_confusion_matrix_json() {
        let cm = ConfusionMatrix::new(vec![vec![5, 0], vec![1, 4]]).unwrap();
        assert_eq!(cm.to_json(), "[[5,0],[1,4]]");
        assert_eq!(ConfusionMatrix::parse("[[5,0],[1,4]]").unwrap(), cm);
        assert_eq!(cm.total(), 10);
    }

    #[test]
    fn test_confusion_matrix_rejects_ragged() {
        assert!(ConfusionMatrix::parse("[[1,2],[3]]").is_err());
        assert!(ConfusionMatrix::parse("[[1, 2], [3, 4]] extra").is_err());
        assert!(ConfusionMatrix::parse("__import__('os')").is_err());
    }

    #[test]
    fn test_confusion_matrix_increment() {
        let mut cm = ConfusionMatrix::zeros(3);
        cm.increment(0, 2);
        cm.increment(0, 2);
        assert_eq!(cm.rows()[0], vec![0, 0, 2]);
        assert_eq!(cm.dimension(), 3);
    }

    #[test]
    fn test_result_wire_names() {
        let result = TestResult {
            model_name: "KNN".into(),
            dataset_name: "iris".into(),
            trial: 1,
            score: 90.0,
            f1: 89.5,
            duration_secs: 0.25,
            timestamp: Utc::now(),
            confusion_matrix: "[[1]]".into(),
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["modellname"], "KNN");
        assert_eq!(value["durchgang"], 1);
        assert_eq!(value["cm"], "[[1]]");
    }
}
