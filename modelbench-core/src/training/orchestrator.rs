//! Fan-out over datasets, models and trials with per-unit failure isolation.

use crate::context::RunContext;
use crate::data::ingest::{DatasetPipeline, IngestReport};
use crate::data::registry::DatasetRegistry;
use crate::data::split::SplitTables;
use crate::data::transform::PreprocessRegistry;
use crate::error::MlError;
use crate::models::ModelDescriptor;
use crate::storage::{DatasetMetadata, TestResult};
use crate::timing::format_duration;
use crate::training::runner::ModelRunner;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Result of one unit of work: a dataset ingestion or a single trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UnitOutcome {
    Completed,
    Failed { context: String, error: String },
}

impl UnitOutcome {
    fn failed(context: impl Into<String>, error: &MlError) -> Self {
        UnitOutcome::Failed {
            context: context.into(),
            error: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestSummary {
    pub ingested: Vec<IngestReport>,
    pub failures: Vec<UnitOutcome>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepSummary {
    /// Trials persisted to the results table.
    pub completed: usize,
    pub failures: Vec<UnitOutcome>,
}

impl SweepSummary {
    fn record(&mut self, outcome: UnitOutcome) {
        match outcome {
            UnitOutcome::Completed => self.completed += 1,
            failed => self.failures.push(failed),
        }
    }

    fn merge(&mut self, other: SweepSummary) {
        self.completed += other.completed;
        self.failures.extend(other.failures);
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub ingest: IngestSummary,
    pub sweep: SweepSummary,
}

/// Drives ingestion and the model sweep against one run context.
pub struct ExperimentOrchestrator<'a> {
    ctx: &'a RunContext,
}

impl<'a> ExperimentOrchestrator<'a> {
    pub fn new(ctx: &'a RunContext) -> Self {
        Self { ctx }
    }

    fn pipeline<'p>(&'p self, preprocess: &'p PreprocessRegistry) -> DatasetPipeline<'p> {
        let experiment = &self.ctx.config.experiment;
        DatasetPipeline::new(
            self.ctx.store(),
            preprocess,
            experiment.test_size,
            experiment.seed,
        )
    }

    /// Ingest every registered dataset, continuing past failures.
    pub fn ingest_all(
        &self,
        registry: &DatasetRegistry,
        preprocess: &PreprocessRegistry,
    ) -> IngestSummary {
        let pipeline = self.pipeline(preprocess);
        let mut summary = IngestSummary::default();
        for dataset in registry.list() {
            match pipeline.ingest(dataset) {
                Ok(report) => summary.ingested.push(report),
                Err(e) => {
                    tracing::error!(
                        dataset = %dataset.name,
                        error = %e,
                        "Dataset ingestion failed"
                    );
                    summary.failures.push(UnitOutcome::failed(&dataset.name, &e));
                }
            }
        }
        summary
    }

    /// Run every model on every dataset recorded in the metadata table.
    pub fn sweep(&self, models: &[ModelDescriptor]) -> Result<SweepSummary, MlError> {
        let metadata = self.ctx.store().read_metadata()?;
        if metadata.is_empty() {
            tracing::warn!("No ingested datasets found; nothing to sweep");
        }
        let mut summary = SweepSummary::default();
        for meta in &metadata {
            summary.merge(self.sweep_dataset(meta, models));
        }
        Ok(summary)
    }

    /// Ingest then sweep each dataset in turn.
    pub fn run(
        &self,
        registry: &DatasetRegistry,
        preprocess: &PreprocessRegistry,
        models: &[ModelDescriptor],
    ) -> RunSummary {
        let pipeline = self.pipeline(preprocess);
        let mut summary = RunSummary::default();
        for dataset in registry.list() {
            match pipeline.ingest(dataset) {
                Ok(report) => {
                    summary
                        .sweep
                        .merge(self.sweep_dataset(&report.metadata, models));
                    summary.ingest.ingested.push(report);
                }
                Err(e) => {
                    tracing::error!(
                        dataset = %dataset.name,
                        error = %e,
                        "Dataset ingestion failed"
                    );
                    summary
                        .ingest
                        .failures
                        .push(UnitOutcome::failed(&dataset.name, &e));
                }
            }
        }
        summary
    }

    fn load_split(&self, meta: &DatasetMetadata) -> Result<SplitTables, MlError> {
        let store = self.ctx.store();
        Ok(SplitTables {
            x_train: store.read_table(&meta.x_train_table)?,
            x_test: store.read_table(&meta.x_test_table)?,
            y_train: store.read_table(&meta.y_train_table)?,
            y_test: store.read_table(&meta.y_test_table)?,
        })
    }

    fn sweep_dataset(&self, meta: &DatasetMetadata, models: &[ModelDescriptor]) -> SweepSummary {
        let mut summary = SweepSummary::default();
        let name = meta.dataset_name.as_str();
        let split = match self.load_split(meta) {
            Ok(split) => split,
            Err(e) => {
                tracing::error!(
                    dataset = %name,
                    error = %e,
                    "Failed to load split tables; skipping dataset"
                );
                summary.failures.push(UnitOutcome::failed(name, &e));
                return summary;
            }
        };

        let trials = self.ctx.config.experiment.trials;
        let start = Instant::now();
        for model in models {
            tracing::info!(dataset = %name, model = %model.name, trials, "Testing model");
            for trial in 1..=trials {
                summary.record(self.run_trial(name, &split, model, trial));
            }
        }
        tracing::info!(
            dataset = %name,
            completed = summary.completed,
            failed = summary.failures.len(),
            "sweep {name} took {}",
            format_duration(start.elapsed())
        );
        summary
    }

    /// Train, evaluate and persist one trial.
    fn run_trial(
        &self,
        dataset: &str,
        split: &SplitTables,
        model: &ModelDescriptor,
        trial: u32,
    ) -> UnitOutcome {
        let context = format!("{} / {} / trial {trial}", dataset, model.name);
        let mut runner = ModelRunner::new(model, dataset, self.ctx.config.experiment.f1_average);

        let start = Instant::now();
        let metrics = match runner
            .train(trial, &split.x_train, &split.y_train)
            .and_then(|()| runner.evaluate(&split.x_test, &split.y_test))
        {
            Ok(metrics) => metrics,
            Err(e) => {
                tracing::error!(dataset, model = %model.name, trial, error = %e, "Trial failed");
                return UnitOutcome::failed(context, &e);
            }
        };
        let duration = start.elapsed();

        let result = TestResult {
            model_name: model.name.clone(),
            dataset_name: dataset.to_string(),
            trial,
            score: metrics.score,
            f1: metrics.f1,
            duration_secs: duration.as_secs_f64(),
            timestamp: chrono::Utc::now(),
            confusion_matrix: metrics.confusion_matrix.to_json(),
        };
        if let Err(e) = self.ctx.store().append_result(&result) {
            tracing::error!(
                dataset,
                model = %model.name,
                trial,
                error = %e,
                "Failed to persist result"
            );
            return UnitOutcome::failed(context, &e);
        }

        tracing::info!(
            dataset,
            model = %model.name,
            trial,
            score = result.score,
            f1 = result.f1,
            secs = result.duration_secs,
            "Trial completed"
        );
        UnitOutcome::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BenchConfig, StorageConfig};
    use crate::data::registry::DatasetDescriptor;
    use crate::data::table::DataBatch;
    use crate::models::{Classifier, ModelSpec};
    use crate::storage::SqliteStore;
    use ndarray::Array2;
    use serde_json::json;

    fn context(trials: u32) -> RunContext {
        let mut config = BenchConfig {
            storage: StorageConfig::in_memory(),
            ..BenchConfig::default()
        };
        config.experiment.trials = trials;
        let store = SqliteStore::connect(&config.storage).unwrap();
        RunContext::new(config, Box::new(store))
    }

    fn dataset(name: &str) -> DatasetDescriptor {
        let rows = (0..10)
            .map(|i| vec![json!(i), json!(if i < 5 { "low" } else { "high" })])
            .collect();
        DatasetDescriptor::new(
            name,
            DataBatch::new(vec!["x".into(), "class".into()], rows),
            "class",
            "",
        )
    }

    struct Failing;

    impl Classifier for Failing {
        fn fit(&mut self, _x: &Array2<f64>, _y: &[usize]) -> Result<(), MlError> {
            Err(MlError::training("always fails"))
        }

        fn predict(&self, _x: &Array2<f64>) -> Result<Vec<usize>, MlError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_run_persists_every_trial() {
        let ctx = context(3);
        let preprocess = PreprocessRegistry::new();
        let mut registry = DatasetRegistry::new();
        registry.register(dataset("a")).unwrap();
        registry.register(dataset("b")).unwrap();
        let models = vec![
            ModelDescriptor::from_spec("Majority", ModelSpec::Majority),
            ModelDescriptor::from_spec("KNN", ModelSpec::Knn { n_neighbors: 1 }),
        ];

        let summary = ExperimentOrchestrator::new(&ctx).run(&registry, &preprocess, &models);
        assert_eq!(summary.ingest.ingested.len(), 2);
        assert_eq!(summary.sweep.completed, 12);
        assert!(summary.sweep.failures.is_empty());

        let results = ctx.store().read_all_results().unwrap();
        assert_eq!(results.len(), 12);
        let trials: Vec<u32> = results.iter().take(3).map(|r| r.trial).collect();
        assert_eq!(trials, vec![1, 2, 3]);
        assert!(results.iter().all(|r| (0.0..=100.0).contains(&r.score)));
        assert!(results.iter().all(|r| r.duration_secs >= 0.0));
    }

    #[test]
    fn test_failing_model_is_isolated() {
        let ctx = context(2);
        let preprocess = PreprocessRegistry::new();
        let orchestrator = ExperimentOrchestrator::new(&ctx);
        let mut registry = DatasetRegistry::new();
        registry.register(dataset("a")).unwrap();

        let ingest = orchestrator.ingest_all(&registry, &preprocess);
        assert_eq!(ingest.ingested.len(), 1);

        let models = vec![
            ModelDescriptor::new("Broken", |_| Box::new(Failing) as Box<dyn Classifier>),
            ModelDescriptor::from_spec("Majority", ModelSpec::Majority),
        ];
        let summary = orchestrator.sweep(&models).unwrap();
        assert_eq!(summary.completed, 2);
        assert_eq!(summary.failures.len(), 2);
        assert!(matches!(
            &summary.failures[0],
            UnitOutcome::Failed { context, .. } if context == "a / Broken / trial 1"
        ));

        let results = ctx.store().read_all_results().unwrap();
        assert!(results.iter().all(|r| r.model_name == "Majority"));
    }

    #[test]
    fn test_missing_split_tables_skip_dataset() {
        let ctx = context(1);
        ctx.store()
            .append_metadata(&DatasetMetadata::for_dataset("ghost", ""))
            .unwrap();

        let models = vec![ModelDescriptor::from_spec("Majority", ModelSpec::Majority)];
        let summary = ExperimentOrchestrator::new(&ctx).sweep(&models).unwrap();
        assert_eq!(summary.completed, 0);
        assert_eq!(summary.failures.len(), 1);
        assert!(ctx.store().read_all_results().unwrap().is_empty());
    }

    #[test]
    fn test_ingest_failure_does_not_stop_others() {
        let ctx = context(1);
        let preprocess = PreprocessRegistry::with_builtins();
        let mut registry = DatasetRegistry::new();
        // Label "low"/"high" cannot be cast to integer.
        let mut broken = dataset("malware_detect");
        broken.raw_data.columns[1] = "Label".into();
        broken.target_column = "Label".into();
        registry.register(broken).unwrap();
        registry.register(dataset("ok")).unwrap();

        let summary = ExperimentOrchestrator::new(&ctx).ingest_all(&registry, &preprocess);
        assert_eq!(summary.ingested.len(), 1);
        assert_eq!(summary.failures.len(), 1);
        let meta = ctx.store().read_metadata().unwrap();
        assert_eq!(meta.len(), 1);
        assert_eq!(meta[0].dataset_name, "ok");
    }
}
