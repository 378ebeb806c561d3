//! Aggregation of persisted results into CSV, PNG and HTML reports.
//!
//! Output layout, for `group_by` in `{modellname, datenname}`:
//!
//! ```text
//! {output}/{group_by}/{group}.csv
//! {output}/{group_by}/best_scores_{group_by}_{metric}.png
//! {output}/{group_by}/fastest_runs_{group_by}.png
//! {output}/{group_by}/ranking_{group_by}_{metric}.png
//! {output}/{group_by}/{group}.html
//! ```

pub mod charts;
pub mod csv_export;
pub mod html;

pub use charts::ChartSettings;

use crate::config::ReportConfig;
use crate::error::MlError;
use crate::persistence::{atomic_write, ensure_dir};
use crate::storage::{Storage, TestResult};
use charts::ScatterGroup;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Column the results are grouped by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupKey {
    #[default]
    #[serde(rename = "modellname")]
    Model,
    #[serde(rename = "datenname")]
    Dataset,
}

impl GroupKey {
    pub fn as_str(self) -> &'static str {
        match self {
            GroupKey::Model => "modellname",
            GroupKey::Dataset => "datenname",
        }
    }

    pub fn value(self, row: &TestResult) -> &str {
        match self {
            GroupKey::Model => &row.model_name,
            GroupKey::Dataset => &row.dataset_name,
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GroupKey {
    type Err = MlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "modellname" => Ok(GroupKey::Model),
            "datenname" => Ok(GroupKey::Dataset),
            other => Err(MlError::invalid_input(format!(
                "unknown group key '{other}', expected 'modellname' or 'datenname'"
            ))),
        }
    }
}

/// Quality column a report ranks by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    #[default]
    Score,
    F1,
}

impl Metric {
    pub fn as_str(self) -> &'static str {
        match self {
            Metric::Score => "score",
            Metric::F1 => "f1",
        }
    }

    pub fn value(self, row: &TestResult) -> f64 {
        match self {
            Metric::Score => row.score,
            Metric::F1 => row.f1,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = MlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "score" => Ok(Metric::Score),
            "f1" => Ok(Metric::F1),
            other => Err(MlError::invalid_input(format!(
                "unknown metric '{other}', expected 'score' or 'f1'"
            ))),
        }
    }
}

/// Rows sharing one group value, in first-appearance order.
#[derive(Debug)]
pub struct Group<'a> {
    pub name: String,
    pub rows: Vec<&'a TestResult>,
}

/// Group `results` by `key`, keeping groups and rows in first-appearance order.
pub fn group_results(results: &[TestResult], key: GroupKey) -> Vec<Group<'_>> {
    let mut groups: Vec<Group<'_>> = Vec::new();
    for row in results {
        let name = key.value(row);
        match groups.iter_mut().find(|g| g.name == name) {
            Some(group) => group.rows.push(row),
            None => groups.push(Group {
                name: name.to_string(),
                rows: vec![row],
            }),
        }
    }
    groups
}

/// First row with the largest value. NaN values never win.
pub fn first_max_by<'a>(
    rows: &[&'a TestResult],
    f: impl Fn(&TestResult) -> f64,
) -> Option<&'a TestResult> {
    let mut best: Option<(&'a TestResult, f64)> = None;
    for &row in rows {
        let v = f(row);
        if v.is_nan() {
            continue;
        }
        if best.is_none_or(|(_, b)| v > b) {
            best = Some((row, v));
        }
    }
    best.map(|(row, _)| row)
}

/// First row with the smallest value. NaN values never win.
pub fn first_min_by<'a>(
    rows: &[&'a TestResult],
    f: impl Fn(&TestResult) -> f64,
) -> Option<&'a TestResult> {
    first_max_by(rows, |row| -f(row))
}

/// Group name as a file name.
pub(crate) fn file_stem(group: &str) -> String {
    group
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect()
}

/// One file stem per group name, in order.
///
/// Stems are unique ignoring case: a name whose stem is already taken gets a
/// `-2`, `-3`, ... suffix.
pub(crate) fn unique_file_stems<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut taken = HashSet::new();
    let mut stems = Vec::new();
    for name in names {
        let base = file_stem(name);
        let mut stem = base.clone();
        let mut n = 2;
        while !taken.insert(stem.to_lowercase()) {
            stem = format!("{base}-{n}");
            n += 1;
        }
        if stem != base {
            tracing::warn!(group = name, file = %stem, "Group file name already taken");
        }
        stems.push(stem);
    }
    stems
}

/// Files written by one report run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportSummary {
    pub csv_files: Vec<PathBuf>,
    pub charts: Vec<PathBuf>,
    pub html_files: Vec<PathBuf>,
    /// Groups or charts that could not be written, with the reason.
    pub failures: Vec<String>,
}

/// Persisted results loaded once for reporting.
pub struct Evaluation {
    results: Vec<TestResult>,
    output_root: PathBuf,
    charts: ChartSettings,
}

impl Evaluation {
    /// Read every result from the store. A failing read aborts reporting.
    pub fn load(store: &dyn Storage, config: &ReportConfig) -> Result<Self, MlError> {
        let results = store
            .read_all_results()
            .map_err(|e| MlError::report(format!("failed to load results: {e}")))?;
        tracing::info!(rows = results.len(), "Loaded results for reporting");
        Ok(Self::from_results(results, config))
    }

    pub fn from_results(results: Vec<TestResult>, config: &ReportConfig) -> Self {
        Self {
            results,
            output_root: config.output_dir.clone(),
            charts: ChartSettings::from_config(config),
        }
    }

    pub fn results(&self) -> &[TestResult] {
        &self.results
    }

    pub fn groups(&self, group_by: GroupKey) -> Vec<Group<'_>> {
        group_results(&self.results, group_by)
    }

    /// Groups paired with the file stem their CSV and HTML files share.
    fn groups_with_stems(&self, group_by: GroupKey) -> Vec<(Group<'_>, String)> {
        let groups = self.groups(group_by);
        let stems = unique_file_stems(groups.iter().map(|g| g.name.as_str()));
        groups.into_iter().zip(stems).collect()
    }

    /// Folder holding every file of one grouping.
    pub fn group_dir(&self, group_by: GroupKey) -> PathBuf {
        self.output_root.join(group_by.as_str())
    }

    fn prepare_dir(&self, group_by: GroupKey) -> Result<PathBuf, MlError> {
        let dir = self.group_dir(group_by);
        ensure_dir(&dir)?;
        Ok(dir)
    }

    /// First best row per group under `metric`.
    pub fn best_per_group(
        &self,
        metric: Metric,
        group_by: GroupKey,
    ) -> Vec<(String, &TestResult)> {
        self.groups(group_by)
            .into_iter()
            .filter_map(|g| first_max_by(&g.rows, |r| metric.value(r)).map(|r| (g.name, r)))
            .collect()
    }

    /// First fastest row per group.
    pub fn fastest_per_group(&self, group_by: GroupKey) -> Vec<(String, &TestResult)> {
        self.groups(group_by)
            .into_iter()
            .filter_map(|g| first_min_by(&g.rows, |r| r.duration_secs).map(|r| (g.name, r)))
            .collect()
    }

    /// One CSV of raw rows per group. Failing groups are logged and skipped.
    pub fn export_group_csv(
        &self,
        group_by: GroupKey,
        summary: &mut ReportSummary,
    ) -> Result<(), MlError> {
        let dir = self.prepare_dir(group_by)?;
        for (group, stem) in self.groups_with_stems(group_by) {
            let path = dir.join(format!("{stem}.csv"));
            match csv_export::write_results_csv(&path, &group.rows) {
                Ok(()) => summary.csv_files.push(path),
                Err(e) => {
                    tracing::error!(group = %group.name, error = %e, "CSV export failed");
                    summary.failures.push(format!("{}.csv: {e}", group.name));
                }
            }
        }
        Ok(())
    }

    pub fn plot_best_scores(&self, metric: Metric, group_by: GroupKey) -> Result<PathBuf, MlError> {
        let dir = self.prepare_dir(group_by)?;
        let path = dir.join(format!("best_scores_{group_by}_{metric}.png"));
        let bars: Vec<(String, f64)> = self
            .best_per_group(metric, group_by)
            .into_iter()
            .map(|(name, row)| (name, metric.value(row)))
            .collect();
        charts::bar_chart(
            &path,
            &format!("Best {metric} per {group_by}"),
            metric.as_str(),
            &bars,
            &self.charts,
        )?;
        Ok(path)
    }

    pub fn plot_fastest_runs(&self, group_by: GroupKey) -> Result<PathBuf, MlError> {
        let dir = self.prepare_dir(group_by)?;
        let path = dir.join(format!("fastest_runs_{group_by}.png"));
        let bars: Vec<(String, f64)> = self
            .fastest_per_group(group_by)
            .into_iter()
            .map(|(name, row)| (name, row.duration_secs))
            .collect();
        charts::bar_chart(
            &path,
            &format!("Fastest run per {group_by}"),
            "dauer (s)",
            &bars,
            &self.charts,
        )?;
        Ok(path)
    }

    /// Scatter of duration against `metric` for every row, coloured by group.
    pub fn ranking_plot(&self, metric: Metric, group_by: GroupKey) -> Result<PathBuf, MlError> {
        let dir = self.prepare_dir(group_by)?;
        let path = dir.join(format!("ranking_{group_by}_{metric}.png"));
        let groups: Vec<ScatterGroup> = self
            .groups(group_by)
            .into_iter()
            .map(|g| ScatterGroup {
                points: g
                    .rows
                    .iter()
                    .map(|r| (r.duration_secs, metric.value(r)))
                    .collect(),
                label: g.name,
            })
            .collect();
        charts::scatter_chart(
            &path,
            &format!("Ranking by {metric} and duration"),
            "dauer (s)",
            metric.as_str(),
            &groups,
            &self.charts,
        )?;
        Ok(path)
    }

    /// One HTML page per group embedding every PNG currently in the folder.
    pub fn generate_html_report(
        &self,
        group_by: GroupKey,
        summary: &mut ReportSummary,
    ) -> Result<(), MlError> {
        let dir = self.prepare_dir(group_by)?;
        let images = list_images(&dir)?;
        let groups = self.groups_with_stems(group_by);
        let links: Vec<html::PageLink> = groups
            .iter()
            .map(|(g, stem)| html::PageLink {
                name: g.name.clone(),
                stem: stem.clone(),
            })
            .collect();

        for (group, stem) in &groups {
            let page = html::GroupPage {
                group: &group.name,
                group_by: group_by.as_str(),
                groups: &links,
                rows: &group.rows,
                images: &images,
            };
            let path = dir.join(format!("{stem}.html"));
            match atomic_write(&path, html::render_group_page(&page).as_bytes()) {
                Ok(()) => summary.html_files.push(path),
                Err(e) => {
                    tracing::error!(group = %group.name, error = %e, "HTML report failed");
                    summary.failures.push(format!("{}.html: {e}", group.name));
                }
            }
        }
        Ok(())
    }

    /// CSV files, charts, then HTML pages. Chart failures are logged and do not stop the report.
    pub fn generate_all(
        &self,
        group_by: GroupKey,
        metric: Metric,
    ) -> Result<ReportSummary, MlError> {
        let mut summary = ReportSummary::default();
        if self.results.is_empty() {
            tracing::warn!("No results stored; nothing to report");
            return Ok(summary);
        }

        self.export_group_csv(group_by, &mut summary)?;

        let charts = [
            ("best scores", self.plot_best_scores(metric, group_by)),
            ("fastest runs", self.plot_fastest_runs(group_by)),
            ("ranking", self.ranking_plot(metric, group_by)),
        ];
        for (name, outcome) in charts {
            match outcome {
                Ok(path) => summary.charts.push(path),
                Err(e) => {
                    tracing::error!(chart = name, group_by = %group_by, error = %e, "Chart failed");
                    summary.failures.push(format!("{name} chart: {e}"));
                }
            }
        }

        self.generate_html_report(group_by, &mut summary)?;
        tracing::info!(
            group_by = %group_by,
            csv = summary.csv_files.len(),
            charts = summary.charts.len(),
            html = summary.html_files.len(),
            "Report generated"
        );
        Ok(summary)
    }
}

/// PNG file names in `dir`, sorted.
fn list_images(dir: &Path) -> Result<Vec<String>, MlError> {
    let mut images = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("png")) {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                images.push(name.to_string());
            }
        }
    }
    images.sort();
    Ok(images)
}
