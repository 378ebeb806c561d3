//! End-to-end tests: ingestion, sweep and reporting against a real SQLite file.

use modelbench_core::config::{BenchConfig, DatasetConfig, StorageConfig};
use modelbench_core::data::{DataBatch, DatasetDescriptor, DatasetRegistry, PreprocessRegistry};
use modelbench_core::models::{ModelDescriptor, ModelSpec};
use modelbench_core::storage::{ConfusionMatrix, DatasetMetadata};
use modelbench_core::{Evaluation, ExperimentOrchestrator, GroupKey, Metric, RunContext};
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;

fn config(dir: &TempDir, trials: u32) -> BenchConfig {
    let mut config = BenchConfig {
        storage: StorageConfig {
            path: dir.path().join("bench.db"),
            ..StorageConfig::default()
        },
        ..BenchConfig::default()
    };
    config.experiment.trials = trials;
    config.report.output_dir = dir.path().join("Auswertung");
    config.report.chart_width = 400;
    config.report.chart_height = 300;
    config
}

fn four_rows() -> DatasetDescriptor {
    DatasetDescriptor::new(
        "tiny",
        DataBatch::new(
            vec!["x".into(), "y".into()],
            vec![
                vec![json!(1.0), json!("a")],
                vec![json!(2.0), json!("a")],
                vec![json!(3.0), json!("a")],
                vec![json!(4.0), json!("b")],
            ],
        ),
        "y",
        "four rows",
    )
}

#[test]
fn single_dataset_majority_end_to_end() {
    let dir = TempDir::new().unwrap();
    let ctx = RunContext::connect(config(&dir, 1)).unwrap();
    let preprocess = PreprocessRegistry::with_builtins();
    let mut registry = DatasetRegistry::new();
    registry.register(four_rows()).unwrap();
    let models = vec![ModelDescriptor::from_spec("Majority", ModelSpec::Majority)];

    let summary = ExperimentOrchestrator::new(&ctx).run(&registry, &preprocess, &models);
    assert_eq!(summary.ingest.ingested.len(), 1);
    assert_eq!(summary.sweep.completed, 1);

    let x_train = ctx.store().read_table("tiny_X_train").unwrap();
    let x_test = ctx.store().read_table("tiny_X_test").unwrap();
    assert_eq!(x_train.row_count() + x_test.row_count(), 4);
    assert_eq!(x_test.row_count(), 1);

    let results = ctx.store().read_all_results().unwrap();
    assert_eq!(results.len(), 1);
    let result = &results[0];
    assert_eq!(result.trial, 1);
    assert_eq!(result.model_name, "Majority");
    assert_eq!(result.dataset_name, "tiny");
    assert!((0.0..=100.0).contains(&result.score));
    assert!((0.0..=100.0).contains(&result.f1));
    let cm = ConfusionMatrix::parse(&result.confusion_matrix).unwrap();
    assert!(cm.dimension() >= 1);

    let evaluation = Evaluation::load(ctx.store(), &ctx.config.report).unwrap();
    let report = evaluation
        .generate_all(GroupKey::Model, Metric::Score)
        .unwrap();
    let out = ctx.output_root().join("modellname");
    assert!(out.join("Majority.csv").exists());
    assert!(out.join("best_scores_modellname_score.png").exists());
    assert!(out.join("Majority.html").exists());
    assert!(report.failures.is_empty(), "{:?}", report.failures);
}

#[test]
fn failing_preprocessing_does_not_block_other_datasets() {
    let dir = TempDir::new().unwrap();
    let malware = dir.path().join("malware.csv");
    std::fs::write(
        &malware,
        "size,entropy,Label\n10,0.1,clean\n20,0.9,evil\n30,0.5,clean\n",
    )
    .unwrap();
    let iris = dir.path().join("iris.csv");
    std::fs::write(
        &iris,
        "sepal,petal,species\n5.1,1.4,setosa\n4.9,1.3,setosa\n7.0,4.7,versicolor\n6.4,4.5,versicolor\n6.3,6.0,virginica\n",
    )
    .unwrap();

    let mut config = config(&dir, 1);
    config.datasets = vec![
        DatasetConfig {
            name: "malware_detect".into(),
            path: malware,
            target: "Label".into(),
            description: "PE headers".into(),
            delimiter: ',',
            transforms: Vec::new(),
        },
        DatasetConfig {
            name: "iris".into(),
            path: iris,
            target: "species".into(),
            description: "Fisher's iris".into(),
            delimiter: ',',
            transforms: Vec::new(),
        },
    ];

    let (registry, preprocess) = DatasetRegistry::from_config(&config).unwrap();
    let ctx = RunContext::connect(config).unwrap();
    let summary = ExperimentOrchestrator::new(&ctx).ingest_all(&registry, &preprocess);

    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.ingested.len(), 1);
    assert_eq!(
        ctx.store().read_metadata().unwrap(),
        vec![DatasetMetadata::for_dataset("iris", "Fisher's iris")]
    );
}

#[test]
fn reingesting_keeps_one_metadata_row() {
    let dir = TempDir::new().unwrap();
    let ctx = RunContext::connect(config(&dir, 1)).unwrap();
    let preprocess = PreprocessRegistry::new();
    let mut registry = DatasetRegistry::new();
    registry.register(four_rows()).unwrap();
    let orchestrator = ExperimentOrchestrator::new(&ctx);

    orchestrator.ingest_all(&registry, &preprocess);
    let first = ctx.store().read_table("tiny_y_test").unwrap();
    orchestrator.ingest_all(&registry, &preprocess);

    assert_eq!(ctx.store().read_metadata().unwrap().len(), 1);
    assert_eq!(ctx.store().read_table("tiny_y_test").unwrap(), first);
}

#[test]
fn sweep_reads_datasets_from_a_reopened_store() {
    let dir = TempDir::new().unwrap();
    {
        let ctx = RunContext::connect(config(&dir, 1)).unwrap();
        let preprocess = PreprocessRegistry::new();
        let mut registry = DatasetRegistry::new();
        registry.register(four_rows()).unwrap();
        ExperimentOrchestrator::new(&ctx).ingest_all(&registry, &preprocess);
    }

    let ctx = RunContext::connect(config(&dir, 2)).unwrap();
    let models = vec![
        ModelDescriptor::from_spec("Majority", ModelSpec::Majority),
        ModelDescriptor::from_spec("Stratified", ModelSpec::Stratified),
    ];
    let summary = ExperimentOrchestrator::new(&ctx).sweep(&models).unwrap();
    assert_eq!(summary.completed, 4);

    let trials: Vec<(String, u32)> = ctx
        .store()
        .read_all_results()
        .unwrap()
        .into_iter()
        .map(|r| (r.model_name, r.trial))
        .collect();
    assert_eq!(
        trials,
        vec![
            ("Majority".to_string(), 1),
            ("Majority".to_string(), 2),
            ("Stratified".to_string(), 1),
            ("Stratified".to_string(), 2),
        ]
    );
}
