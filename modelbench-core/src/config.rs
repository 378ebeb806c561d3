//! Configuration system for modelbench.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment.
//! Configuration is loaded from `~/.config/modelbench/config.toml` and/or `modelbench.toml`
//! in the workspace directory. CLI flags are applied on top by the binary.

use crate::data::transform::TransformStep;
use crate::models::ModelSpec;
use crate::report::{GroupKey, Metric};
use crate::training::metrics::F1Average;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the workspace-level config file.
pub const WORKSPACE_CONFIG_FILE: &str = "modelbench.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchConfig {
    /// Relational store settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Sweep settings (trials, split, metrics).
    #[serde(default)]
    pub experiment: ExperimentConfig,
    /// Report output settings.
    #[serde(default)]
    pub report: ReportConfig,
    /// Cell values treated as missing when reading CSV sources.
    #[serde(default = "default_na_values")]
    pub na_values: Vec<String>,
    /// Datasets to ingest.
    #[serde(default)]
    pub datasets: Vec<DatasetConfig>,
    /// Models to sweep.
    #[serde(default = "default_models")]
    pub models: Vec<ModelConfig>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            experiment: ExperimentConfig::default(),
            report: ReportConfig::default(),
            na_values: default_na_values(),
            datasets: Vec::new(),
            models: default_models(),
        }
    }
}

impl BenchConfig {
    /// Resolve relative dataset, store and output paths against `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        if self.storage.path.is_relative() && !self.storage.is_in_memory() {
            self.storage.path = base.join(&self.storage.path);
        }
        if self.report.output_dir.is_relative() {
            self.report.output_dir = base.join(&self.report.output_dir);
        }
        for dataset in &mut self.datasets {
            if dataset.path.is_relative() {
                dataset.path = base.join(&dataset.path);
            }
        }
    }
}

/// Relational store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database file (`:memory:` for a throwaway store).
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    /// Table holding one metadata row per ingested dataset.
    #[serde(default = "default_metadata_table")]
    pub metadata_table: String,
    /// Append-only table of trial results.
    #[serde(default = "default_results_table")]
    pub results_table: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            metadata_table: default_metadata_table(),
            results_table: default_results_table(),
        }
    }
}

impl StorageConfig {
    pub fn in_memory() -> Self {
        Self {
            path: PathBuf::from(":memory:"),
            ..Self::default()
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.path.as_os_str() == ":memory:"
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("modelbench.db")
}

fn default_metadata_table() -> String {
    "dataframe".to_string()
}

fn default_results_table() -> String {
    "modelltestergebnisse".to_string()
}

/// Experiment sweep configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Number of trials per (dataset, model) pair.
    #[serde(default = "default_trials")]
    pub trials: u32,
    /// Fraction of rows held out for evaluation.
    #[serde(default = "default_test_size")]
    pub test_size: f64,
    /// Seed for the train/test shuffle.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Averaging used for the F1 column.
    #[serde(default)]
    pub f1_average: F1Average,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            trials: default_trials(),
            test_size: default_test_size(),
            seed: default_seed(),
            f1_average: F1Average::default(),
        }
    }
}

fn default_trials() -> u32 {
    5
}

fn default_test_size() -> f64 {
    0.2
}

fn default_seed() -> u64 {
    42
}

/// Report generation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Root folder for CSV, PNG and HTML output.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub group_by: GroupKey,
    #[serde(default)]
    pub metric: Metric,
    #[serde(default = "default_chart_width")]
    pub chart_width: u32,
    #[serde(default = "default_chart_height")]
    pub chart_height: u32,
    /// TrueType font used for chart text. Well-known system fonts are tried when unset.
    #[serde(default)]
    pub font_path: Option<PathBuf>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            group_by: GroupKey::default(),
            metric: Metric::default(),
            chart_width: default_chart_width(),
            chart_height: default_chart_height(),
            font_path: None,
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("Auswertung")
}

fn default_chart_width() -> u32 {
    1000
}

fn default_chart_height() -> u32 {
    600
}

fn default_na_values() -> Vec<String> {
    ["", "NA", "N/A", "NaN", "nan", "null", "NULL", "None", "?"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// A dataset source declared in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Unique dataset name, also the prefix of its split tables.
    pub name: String,
    /// CSV file with a header row.
    pub path: PathBuf,
    /// Column holding the class label.
    pub target: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    /// Extra preprocessing steps applied after cleaning.
    #[serde(default)]
    pub transforms: Vec<TransformStep>,
}

fn default_delimiter() -> char {
    ','
}

/// A model declared in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    pub spec: ModelSpec,
}

fn default_models() -> Vec<ModelConfig> {
    vec![
        ModelConfig {
            name: "Majority".to_string(),
            spec: ModelSpec::Majority,
        },
        ModelConfig {
            name: "KNN".to_string(),
            spec: ModelSpec::Knn { n_neighbors: 5 },
        },
        ModelConfig {
            name: "GaussianNB".to_string(),
            spec: ModelSpec::GaussianNb,
        },
        ModelConfig {
            name: "LogisticRegression".to_string(),
            spec: ModelSpec::LogisticRegression {
                learning_rate: 0.1,
                epochs: 300,
            },
        },
    ]
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with `MODELBENCH_`)
/// 2. Explicit config file (`--config`)
/// 3. Workspace-local config (`modelbench.toml`)
/// 4. User config (`~/.config/modelbench/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    explicit: Option<&Path>,
) -> Result<BenchConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(BenchConfig::default()));

    if let Some(user_config) = user_config_path() {
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = ws.join(WORKSPACE_CONFIG_FILE);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    if let Some(path) = explicit {
        figment = figment.merge(Toml::file(path));
    }

    // MODELBENCH_STORAGE__PATH, MODELBENCH_EXPERIMENT__TRIALS, ...
    figment = figment.merge(Env::prefixed("MODELBENCH_").split("__"));

    figment.extract().map_err(Box::new)
}

/// Location of the user-level config file, if a home directory can be determined.
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "modelbench", "modelbench")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BenchConfig::default();
        assert_eq!(config.storage.metadata_table, "dataframe");
        assert_eq!(config.storage.results_table, "modelltestergebnisse");
        assert_eq!(config.experiment.seed, 42);
        assert!((config.experiment.test_size - 0.2).abs() < f64::EPSILON);
        assert!(config.na_values.contains(&"NA".to_string()));
        assert!(!config.models.is_empty());
    }

    #[test]
    fn test_load_workspace_config() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(WORKSPACE_CONFIG_FILE),
            r#"
[storage]
path = "bench.db"

[experiment]
trials = 2
f1_average = "macro"

[report]
group_by = "datenname"
metric = "f1"

[[datasets]]
name = "iris"
path = "data/iris.csv"
target = "species"
description = "Fisher's iris"

[[models]]
name = "KNN-3"
spec = { kind = "knn", n_neighbors = 3 }
"#,
        )
        .unwrap();

        let config = load_config(Some(dir.path()), None).unwrap();
        assert_eq!(config.storage.path, PathBuf::from("bench.db"));
        assert_eq!(config.experiment.trials, 2);
        assert_eq!(config.experiment.f1_average, F1Average::Macro);
        assert_eq!(config.report.group_by, GroupKey::Dataset);
        assert_eq!(config.report.metric, Metric::F1);
        assert_eq!(config.datasets.len(), 1);
        assert_eq!(config.datasets[0].delimiter, ',');
        assert_eq!(config.models.len(), 1);
        assert_eq!(config.models[0].name, "KNN-3");
    }

    #[test]
    fn test_resolve_paths() {
        let mut config = BenchConfig::default();
        config.datasets.push(DatasetConfig {
            name: "iris".into(),
            path: PathBuf::from("iris.csv"),
            target: "species".into(),
            description: String::new(),
            delimiter: ',',
            transforms: Vec::new(),
        });
        config.resolve_paths(Path::new("/srv/bench"));
        assert_eq!(config.storage.path, PathBuf::from("/srv/bench/modelbench.db"));
        assert_eq!(config.datasets[0].path, PathBuf::from("/srv/bench/iris.csv"));

        let mut memory = BenchConfig {
            storage: StorageConfig::in_memory(),
            ..BenchConfig::default()
        };
        memory.resolve_paths(Path::new("/srv/bench"));
        assert!(memory.storage.is_in_memory());
    }
}
