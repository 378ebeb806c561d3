//! # modelbench-core: classifier benchmarking across datasets
//!
//! Ingests tabular datasets into a relational store, sweeps classifiers over every
//! dataset for a number of trials, persists one result row per trial and renders
//! grouped CSV, PNG and HTML reports from the stored results.
//!
//! ## Pipeline
//!
//! 1. **Registry**: datasets by name, loaded from CSV or registered in code
//! 2. **Ingestion**: clean, preprocess, split 80/20 and write the split tables
//! 3. **Sweep**: datasets × models × trials, each unit isolated from the others
//! 4. **Reporting**: results grouped by model or dataset

// Foundation
pub mod config;
pub mod context;
pub mod error;
pub mod persistence;
pub mod timing;

// Storage
pub mod storage;

// Data
pub mod data;

// Models & training
pub mod models;
pub mod training;

// Reporting
pub mod report;

// Re-exports
pub use config::{BenchConfig, load_config};
pub use context::RunContext;
pub use data::{DatasetDescriptor, DatasetRegistry, PreprocessRegistry};
pub use error::MlError;
pub use models::{ModelDescriptor, ModelSpec, descriptors_from_config};
pub use report::{Evaluation, GroupKey, Metric, ReportSummary};
pub use storage::{DatasetMetadata, SqliteStore, Storage, TestResult};
pub use training::{ExperimentOrchestrator, F1Average, UnitOutcome};
