//! Per-dataset ingestion: clean, preprocess, split, persist.

use crate::data::registry::DatasetDescriptor;
use crate::data::split::{SplitTables, train_test_split};
use crate::data::table::DataBatch;
use crate::data::transform::PreprocessRegistry;
use crate::error::MlError;
use crate::storage::{DatasetMetadata, Storage};
use crate::timing::timed;
use serde::{Deserialize, Serialize};

/// Outcome of ingesting one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    pub dataset: String,
    pub raw_rows: usize,
    pub cleaned_rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub metadata: DatasetMetadata,
}

/// Ingestion steps for one dataset against one store.
pub struct DatasetPipeline<'a> {
    store: &'a dyn Storage,
    preprocess: &'a PreprocessRegistry,
    test_size: f64,
    seed: u64,
}

impl<'a> DatasetPipeline<'a> {
    pub fn new(
        store: &'a dyn Storage,
        preprocess: &'a PreprocessRegistry,
        test_size: f64,
        seed: u64,
    ) -> Self {
        Self {
            store,
            preprocess,
            test_size,
            seed,
        }
    }

    /// Drop every row with a missing cell.
    pub fn clean(&self, raw: &DataBatch) -> DataBatch {
        let cleaned = raw.clone().drop_nulls();
        let dropped = raw.row_count() - cleaned.row_count();
        if dropped > 0 {
            tracing::debug!(
                dropped,
                remaining = cleaned.row_count(),
                "Dropped rows with missing values"
            );
        }
        cleaned
    }

    /// Apply the preprocessing strategy registered for `dataset`.
    pub fn preprocess(&self, dataset: &str, batch: DataBatch) -> Result<DataBatch, MlError> {
        self.preprocess.apply(dataset, batch)
    }

    /// Split on `target` and replace the four split tables of `name`.
    pub fn split_and_save(
        &self,
        name: &str,
        batch: &DataBatch,
        target: &str,
    ) -> Result<SplitTables, MlError> {
        let meta = DatasetMetadata::for_dataset(name, "");
        let split = train_test_split(batch, target, self.test_size, self.seed)?;
        self.store.write_table(&split.x_train, &meta.x_train_table)?;
        self.store.write_table(&split.x_test, &meta.x_test_table)?;
        self.store.write_table(&split.y_train, &meta.y_train_table)?;
        self.store.write_table(&split.y_test, &meta.y_test_table)?;
        Ok(split)
    }

    pub fn write_metadata(
        &self,
        name: &str,
        description: &str,
    ) -> Result<DatasetMetadata, MlError> {
        let meta = DatasetMetadata::for_dataset(name, description);
        self.store.append_metadata(&meta)?;
        Ok(meta)
    }

    /// Run every step for one dataset. Any failure aborts this dataset only.
    pub fn ingest(&self, dataset: &DatasetDescriptor) -> Result<IngestReport, MlError> {
        let name = dataset.name.as_str();
        timed(&format!("ingest {name}"), || {
            let cleaned = self.clean(&dataset.raw_data);
            let cleaned_rows = cleaned.row_count();
            let prepared = self.preprocess(name, cleaned)?;
            let split = timed(&format!("split and save {name}"), || {
                self.split_and_save(name, &prepared, &dataset.target_column)
            })?;
            let metadata = self.write_metadata(name, &dataset.description)?;

            tracing::info!(
                dataset = %name,
                train = split.train_len(),
                test = split.test_len(),
                "Dataset ingested"
            );
            Ok(IngestReport {
                dataset: name.to_string(),
                raw_rows: dataset.raw_data.row_count(),
                cleaned_rows,
                train_rows: split.train_len(),
                test_rows: split.test_len(),
                metadata,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStore;
    use serde_json::{Value, json};

    fn descriptor(name: &str, label: Value) -> DatasetDescriptor {
        let rows = (0..10)
            .map(|i| vec![json!(i), json!(i * 2), label.clone()])
            .chain(std::iter::once(vec![json!(99), Value::Null, json!(1)]))
            .collect();
        DatasetDescriptor::new(
            name,
            DataBatch::new(vec!["a".into(), "b".into(), "Label".into()], rows),
            "Label",
            "toy data",
        )
    }

    #[test]
    fn test_ingest_writes_tables_and_metadata() {
        let store = SqliteStore::in_memory().unwrap();
        let preprocess = PreprocessRegistry::with_builtins();
        let pipeline = DatasetPipeline::new(&store, &preprocess, 0.2, 42);

        let report = pipeline.ingest(&descriptor("toy", json!("yes"))).unwrap();
        assert_eq!(report.raw_rows, 11);
        assert_eq!(report.cleaned_rows, 10);
        assert_eq!(report.train_rows + report.test_rows, 10);
        assert_eq!(report.test_rows, 2);

        let x_train = store.read_table("toy_X_train").unwrap();
        let y_train = store.read_table("toy_y_train").unwrap();
        assert_eq!(x_train.row_count(), y_train.row_count());
        assert_eq!(x_train.columns, vec!["a", "b"]);
        assert_eq!(y_train.columns, vec!["Label"]);

        let meta = store.read_metadata().unwrap();
        assert_eq!(meta, vec![DatasetMetadata::for_dataset("toy", "toy data")]);
    }

    #[test]
    fn test_ingest_preprocess_failure_writes_nothing() {
        let store = SqliteStore::in_memory().unwrap();
        let preprocess = PreprocessRegistry::with_builtins();
        let pipeline = DatasetPipeline::new(&store, &preprocess, 0.2, 42);

        let err = pipeline
            .ingest(&descriptor("malware_detect", json!("benign")))
            .unwrap_err();
        assert!(matches!(err, MlError::Preprocessing(_)));
        assert!(store.read_metadata().unwrap().is_empty());
        assert!(!store.table_exists("malware_detect_X_train").unwrap());
    }

    #[test]
    fn test_ingest_unknown_target() {
        let store = SqliteStore::in_memory().unwrap();
        let preprocess = PreprocessRegistry::new();
        let pipeline = DatasetPipeline::new(&store, &preprocess, 0.2, 42);

        let mut dataset = descriptor("toy", json!(1));
        dataset.target_column = "class".into();
        assert!(pipeline.ingest(&dataset).is_err());
        assert!(store.read_metadata().unwrap().is_empty());
    }

    #[test]
    fn test_reingest_is_idempotent() {
        let store = SqliteStore::in_memory().unwrap();
        let preprocess = PreprocessRegistry::new();
        let pipeline = DatasetPipeline::new(&store, &preprocess, 0.2, 42);

        let dataset = descriptor("toy", json!(1));
        pipeline.ingest(&dataset).unwrap();
        let first = store.read_table("toy_X_test").unwrap();
        pipeline.ingest(&dataset).unwrap();

        assert_eq!(store.read_metadata().unwrap().len(), 1);
        assert_eq!(store.read_table("toy_X_test").unwrap(), first);
        assert_eq!(store.read_table("toy_X_train").unwrap().row_count(), 8);
    }
}
