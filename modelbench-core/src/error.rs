//! Error types for the modelbench-core crate.

use thiserror::Error;

/// Top-level error type for benchmark operations.
#[derive(Debug, Error)]
pub enum MlError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Preprocessing error: {0}")]
    Preprocessing(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("Model not trained: {0}")]
    NotTrained(String),

    #[error("Evaluation error: {0}")]
    Evaluation(String),

    #[error("Report error: {0}")]
    Report(String),

    #[error("Chart error: {0}")]
    Chart(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl MlError {
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    pub fn dataset(msg: impl Into<String>) -> Self {
        Self::Dataset(msg.into())
    }

    pub fn preprocessing(msg: impl Into<String>) -> Self {
        Self::Preprocessing(msg.into())
    }

    pub fn training(msg: impl Into<String>) -> Self {
        Self::Training(msg.into())
    }

    pub fn not_trained(msg: impl Into<String>) -> Self {
        Self::NotTrained(msg.into())
    }

    pub fn evaluation(msg: impl Into<String>) -> Self {
        Self::Evaluation(msg.into())
    }

    pub fn report(msg: impl Into<String>) -> Self {
        Self::Report(msg.into())
    }

    pub fn chart(msg: impl Into<String>) -> Self {
        Self::Chart(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}
