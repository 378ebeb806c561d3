//! Registry of datasets available for ingestion.

use crate::config::BenchConfig;
use crate::data::source::{CsvSource, DataSource};
use crate::data::table::DataBatch;
use crate::data::transform::PreprocessRegistry;
use crate::error::MlError;

/// A named raw dataset with its target column.
#[derive(Debug, Clone)]
pub struct DatasetDescriptor {
    pub name: String,
    pub raw_data: DataBatch,
    pub target_column: String,
    pub description: String,
}

impl DatasetDescriptor {
    pub fn new(
        name: impl Into<String>,
        raw_data: DataBatch,
        target_column: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            raw_data,
            target_column: target_column.into(),
            description: description.into(),
        }
    }
}

/// Datasets keyed by unique name, kept in registration order.
#[derive(Debug, Clone, Default)]
pub struct DatasetRegistry {
    datasets: Vec<DatasetDescriptor>,
}

impl DatasetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry and preprocessing strategies from configured CSV sources.
    ///
    /// A source that fails to load is logged and left out; the remaining datasets
    /// are still registered.
    pub fn from_config(config: &BenchConfig) -> Result<(Self, PreprocessRegistry), MlError> {
        let mut registry = Self::new();
        let mut preprocess = PreprocessRegistry::with_builtins();

        for dataset in &config.datasets {
            let source = CsvSource::new(&dataset.path, dataset.delimiter, config.na_values.clone());
            let raw = match source.load() {
                Ok(batch) => batch,
                Err(e) => {
                    tracing::error!(
                        dataset = %dataset.name,
                        path = %dataset.path.display(),
                        error = %e,
                        "Failed to load dataset source"
                    );
                    continue;
                }
            };
            tracing::debug!(
                dataset = %dataset.name,
                rows = raw.row_count(),
                columns = raw.column_count(),
                "Loaded dataset source"
            );
            registry.register(DatasetDescriptor::new(
                &dataset.name,
                raw,
                &dataset.target,
                &dataset.description,
            ))?;
            if !dataset.transforms.is_empty() {
                preprocess.extend(&dataset.name, dataset.transforms.iter().cloned());
            }
        }

        Ok((registry, preprocess))
    }

    /// Add a dataset. Names must be unique.
    pub fn register(&mut self, descriptor: DatasetDescriptor) -> Result<(), MlError> {
        if self.find(&descriptor.name).is_some() {
            return Err(MlError::invalid_input(format!(
                "dataset '{}' is already registered",
                descriptor.name
            )));
        }
        self.datasets.push(descriptor);
        Ok(())
    }

    pub fn find(&self, name: &str) -> Option<&DatasetDescriptor> {
        self.datasets.iter().find(|d| d.name == name)
    }

    pub fn list(&self) -> &[DatasetDescriptor] {
        &self.datasets
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }
}
