//! Run context shared by ingestion, the sweep and reporting.

use crate::config::BenchConfig;
use crate::error::MlError;
use crate::storage::{SqliteStore, Storage};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Everything a run needs, built once at start-up.
pub struct RunContext {
    pub config: BenchConfig,
    pub store: Box<dyn Storage>,
    pub output_root: PathBuf,
    pub run_id: Uuid,
}

impl RunContext {
    pub fn new(config: BenchConfig, store: Box<dyn Storage>) -> Self {
        let output_root = config.report.output_dir.clone();
        let run_id = Uuid::new_v4();
        tracing::debug!(%run_id, output = %output_root.display(), "Run context created");
        Self {
            config,
            store,
            output_root,
            run_id,
        }
    }

    /// Open the configured SQLite store and fail if it does not answer.
    pub fn connect(config: BenchConfig) -> Result<Self, MlError> {
        let store = SqliteStore::connect(&config.storage)?;
        if !store.test_connection() {
            return Err(MlError::connection(format!(
                "store at {} is not reachable",
                config.storage.path.display()
            )));
        }
        Ok(Self::new(config, Box::new(store)))
    }

    pub fn store(&self) -> &dyn Storage {
        self.store.as_ref()
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }
}
