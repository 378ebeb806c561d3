//! Model training, evaluation metrics and the experiment sweep.

pub mod metrics;
pub mod orchestrator;
pub mod runner;

pub use metrics::{ClassificationMetrics, F1Average};
pub use orchestrator::{
    ExperimentOrchestrator, IngestSummary, RunSummary, SweepSummary, UnitOutcome,
};
pub use runner::{ModelRunner, RunnerState};
