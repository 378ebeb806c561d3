//! modelbench CLI: ingest datasets, sweep classifiers, render reports.

mod commands;

use clap::Parser;
use modelbench_core::{GroupKey, Metric};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// modelbench: benchmark classifiers across datasets
#[derive(Parser, Debug)]
#[command(name = "modelbench", version, about, long_about = None)]
struct Cli {
    /// Workspace directory (holds modelbench.toml; relative paths resolve against it)
    #[arg(short, long, global = true, default_value = ".")]
    workspace: PathBuf,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Load, preprocess, split and store every configured dataset
    Ingest,
    /// Run every configured model on every ingested dataset
    Sweep {
        /// Trials per dataset and model
        #[arg(short, long)]
        trials: Option<u32>,
    },
    /// Render CSV, chart and HTML reports from stored results
    Report {
        /// Group rows by model (modellname) or dataset (datenname)
        #[arg(short, long)]
        group_by: Option<GroupKey>,
        /// Metric used for best-run selection and ranking (score, f1)
        #[arg(short, long)]
        metric: Option<Metric>,
        /// Output root folder
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Ingest, sweep and report in one go
    Run {
        /// Trials per dataset and model
        #[arg(short, long)]
        trials: Option<u32>,
    },
    /// List ingested datasets
    Datasets,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Write a default modelbench.toml into the workspace
    Init,
    /// Show the effective configuration
    Show,
}

fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "modelbench", "modelbench")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "modelbench.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    commands::handle_command(cli.command, &workspace, cli.config.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_report_flags() {
        let cli = Cli::try_parse_from([
            "modelbench",
            "report",
            "--group-by",
            "datenname",
            "--metric",
            "f1",
            "-o",
            "out",
        ])
        .unwrap();
        match cli.command {
            Commands::Report {
                group_by,
                metric,
                output,
            } => {
                assert_eq!(group_by, Some(GroupKey::Dataset));
                assert_eq!(metric, Some(Metric::F1));
                assert_eq!(output, Some(PathBuf::from("out")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["modelbench", "sweep", "-t", "3", "-vv", "-c", "bench.toml"])
            .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("bench.toml")));
        assert!(matches!(cli.command, Commands::Sweep { trials: Some(3) }));
    }

    #[test]
    fn test_unknown_group_key_rejected() {
        assert!(Cli::try_parse_from(["modelbench", "report", "--group-by", "trial"]).is_err());
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["modelbench"]).is_err());
    }
}
