//! CLI subcommand handlers.

use crate::Commands;
use crate::ConfigAction;
use modelbench_core::config::{BenchConfig, WORKSPACE_CONFIG_FILE, load_config};
use modelbench_core::training::{IngestSummary, SweepSummary};
use modelbench_core::{
    DatasetRegistry, Evaluation, ExperimentOrchestrator, GroupKey, Metric, ReportSummary,
    RunContext, UnitOutcome, descriptors_from_config,
};
use std::path::{Path, PathBuf};

/// Handle a CLI subcommand.
pub fn handle_command(
    command: Commands,
    workspace: &Path,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    match command {
        Commands::Config { action } => handle_config(action, workspace, config_path),
        Commands::Datasets => handle_datasets(&load(workspace, config_path)?),
        Commands::Ingest => handle_ingest(load(workspace, config_path)?),
        Commands::Sweep { trials } => {
            let mut config = load(workspace, config_path)?;
            if let Some(trials) = trials {
                config.experiment.trials = trials;
            }
            handle_sweep(config)
        }
        Commands::Report {
            group_by,
            metric,
            output,
        } => {
            let mut config = load(workspace, config_path)?;
            apply_report_overrides(&mut config, workspace, group_by, metric, output);
            handle_report(&config)
        }
        Commands::Run { trials } => {
            let mut config = load(workspace, config_path)?;
            if let Some(trials) = trials {
                config.experiment.trials = trials;
            }
            handle_run(config)
        }
    }
}

fn load(workspace: &Path, config_path: Option<&Path>) -> anyhow::Result<BenchConfig> {
    let mut config = load_config(Some(workspace), config_path)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
    config.resolve_paths(workspace);
    Ok(config)
}

fn connect(config: BenchConfig) -> anyhow::Result<RunContext> {
    RunContext::connect(config).map_err(|e| anyhow::anyhow!("Cannot open result store: {}", e))
}

/// Relative `output` paths resolve against the workspace, like `output_dir` from config.
fn apply_report_overrides(
    config: &mut BenchConfig,
    workspace: &Path,
    group_by: Option<GroupKey>,
    metric: Option<Metric>,
    output: Option<PathBuf>,
) {
    if let Some(group_by) = group_by {
        config.report.group_by = group_by;
    }
    if let Some(metric) = metric {
        config.report.metric = metric;
    }
    if let Some(output) = output {
        config.report.output_dir = workspace.join(output);
    }
}

fn handle_config(
    action: ConfigAction,
    workspace: &Path,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let path = workspace.join(WORKSPACE_CONFIG_FILE);
            if path.exists() {
                println!("Configuration file already exists at: {}", path.display());
                return Ok(());
            }
            let toml_str = toml::to_string_pretty(&BenchConfig::default())?;
            std::fs::write(&path, &toml_str)?;
            println!("Created default configuration at: {}", path.display());
            Ok(())
        }
        ConfigAction::Show => {
            let config = load_config(Some(workspace), config_path)
                .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn handle_datasets(config: &BenchConfig) -> anyhow::Result<()> {
    let ctx = connect(config.clone())?;
    let metadata = ctx.store().read_metadata()?;
    if metadata.is_empty() {
        println!("No datasets ingested yet.");
        return Ok(());
    }
    println!("{} dataset(s):", metadata.len());
    for meta in &metadata {
        if meta.description.is_empty() {
            println!("  {}", meta.dataset_name);
        } else {
            println!("  {} - {}", meta.dataset_name, meta.description);
        }
    }
    Ok(())
}

fn handle_ingest(config: BenchConfig) -> anyhow::Result<()> {
    let (registry, preprocess) = DatasetRegistry::from_config(&config)?;
    let ctx = connect(config)?;
    let summary = ExperimentOrchestrator::new(&ctx).ingest_all(&registry, &preprocess);
    print_ingest(&summary);
    Ok(())
}

fn handle_sweep(config: BenchConfig) -> anyhow::Result<()> {
    let models = descriptors_from_config(&config.models);
    let ctx = connect(config)?;
    let summary = ExperimentOrchestrator::new(&ctx).sweep(&models)?;
    print_sweep(&summary);
    Ok(())
}

fn handle_report(config: &BenchConfig) -> anyhow::Result<()> {
    let ctx = connect(config.clone())?;
    let summary = report(&ctx)?;
    print_report(&summary);
    Ok(())
}

fn handle_run(config: BenchConfig) -> anyhow::Result<()> {
    let (registry, preprocess) = DatasetRegistry::from_config(&config)?;
    let models = descriptors_from_config(&config.models);
    let ctx = connect(config)?;
    tracing::info!(
        run_id = %ctx.run_id,
        datasets = registry.len(),
        models = models.len(),
        "Starting run"
    );

    let summary = ExperimentOrchestrator::new(&ctx).run(&registry, &preprocess, &models);
    print_ingest(&summary.ingest);
    print_sweep(&summary.sweep);

    let report_summary = report(&ctx)?;
    print_report(&report_summary);
    Ok(())
}

fn report(ctx: &RunContext) -> anyhow::Result<ReportSummary> {
    let report = &ctx.config.report;
    let evaluation = Evaluation::load(ctx.store(), report)?;
    Ok(evaluation.generate_all(report.group_by, report.metric)?)
}

fn print_failures(failures: &[UnitOutcome]) {
    for failure in failures {
        if let UnitOutcome::Failed { context, error } = failure {
            println!("  FAILED {context}: {error}");
        }
    }
}

fn print_ingest(summary: &IngestSummary) {
    println!(
        "Ingested {} dataset(s), {} failed",
        summary.ingested.len(),
        summary.failures.len()
    );
    for report in &summary.ingested {
        println!(
            "  {}: {} rows ({} cleaned), {} train / {} test",
            report.dataset,
            report.raw_rows,
            report.cleaned_rows,
            report.train_rows,
            report.test_rows
        );
    }
    print_failures(&summary.failures);
}

fn print_sweep(summary: &SweepSummary) {
    println!(
        "Completed {} trial(s), {} failed",
        summary.completed,
        summary.failures.len()
    );
    print_failures(&summary.failures);
}

fn print_report(summary: &ReportSummary) {
    println!(
        "Wrote {} CSV file(s), {} chart(s), {} HTML page(s)",
        summary.csv_files.len(),
        summary.charts.len(),
        summary.html_files.len()
    );
    for failure in &summary.failures {
        println!("  FAILED {failure}");
    }
}
