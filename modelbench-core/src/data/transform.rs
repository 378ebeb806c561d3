//! Dataset preprocessing: transform steps, pipelines and the per-dataset registry.

use crate::data::table::{DataBatch, compare_labels, label_key};
use crate::error::MlError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap, HashSet};

/// A transformation step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransformStep {
    DropColumn { column: String },
    RenameColumn { from: String, to: String },
    /// Integer cast; floats are truncated, text must parse.
    CastInteger { column: String },
    CastFloat { column: String },
    /// Replace each distinct value by its rank in sorted order.
    LabelEncode { column: String },
    Deduplicate,
}

/// A pipeline of transformation steps. The empty pipeline is the identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformPipeline {
    pub steps: Vec<TransformStep>,
}

impl TransformPipeline {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn add_step(mut self, step: TransformStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Apply the pipeline to a data batch.
    pub fn apply(&self, mut batch: DataBatch) -> Result<DataBatch, MlError> {
        for step in &self.steps {
            batch = apply_step(batch, step)?;
        }
        Ok(batch)
    }
}

fn require_column(batch: &DataBatch, column: &str) -> Result<usize, MlError> {
    batch
        .column_index(column)
        .ok_or_else(|| MlError::preprocessing(format!("column '{column}' not found")))
}

fn apply_step(mut batch: DataBatch, step: &TransformStep) -> Result<DataBatch, MlError> {
    match step {
        TransformStep::DropColumn { column } => {
            let idx = require_column(&batch, column)?;
            batch.columns.remove(idx);
            for row in &mut batch.rows {
                if idx < row.len() {
                    row.remove(idx);
                }
            }
            Ok(batch)
        }
        TransformStep::RenameColumn { from, to } => {
            let idx = require_column(&batch, from)?;
            batch.columns[idx] = to.clone();
            Ok(batch)
        }
        TransformStep::CastInteger { column } => {
            let idx = require_column(&batch, column)?;
            for (r, row) in batch.rows.iter_mut().enumerate() {
                if let Some(cell) = row.get_mut(idx) {
                    let cast = cast_integer(cell).ok_or_else(|| {
                        MlError::preprocessing(format!(
                            "cannot cast {cell} in column '{column}' (row {r}) to integer"
                        ))
                    })?;
                    *cell = Value::Number(cast.into());
                }
            }
            Ok(batch)
        }
        TransformStep::CastFloat { column } => {
            let idx = require_column(&batch, column)?;
            for (r, row) in batch.rows.iter_mut().enumerate() {
                if let Some(cell) = row.get_mut(idx) {
                    let cast = crate::data::table::numeric_value(cell)
                        .and_then(serde_json::Number::from_f64)
                        .ok_or_else(|| {
                            MlError::preprocessing(format!(
                                "cannot cast {cell} in column '{column}' (row {r}) to float"
                            ))
                        })?;
                    *cell = Value::Number(cast);
                }
            }
            Ok(batch)
        }
        TransformStep::LabelEncode { column } => {
            let idx = require_column(&batch, column)?;
            let distinct: BTreeSet<String> = batch
                .rows
                .iter()
                .filter_map(|row| row.get(idx).map(label_key))
                .collect();
            let mut ordered: Vec<String> = distinct.into_iter().collect();
            ordered.sort_by(|a, b| compare_labels(a, b));
            let codes: HashMap<String, i64> = ordered
                .into_iter()
                .enumerate()
                .map(|(code, key)| (key, code as i64))
                .collect();
            for row in &mut batch.rows {
                if let Some(cell) = row.get_mut(idx) {
                    let code = codes[&label_key(cell)];
                    *cell = Value::Number(code.into());
                }
            }
            Ok(batch)
        }
        TransformStep::Deduplicate => {
            let mut seen = HashSet::new();
            batch.rows.retain(|row| {
                let key = serde_json::to_string(row).unwrap_or_default();
                seen.insert(key)
            });
            batch.total_rows = batch.rows.len();
            Ok(batch)
        }
    }
}

fn cast_integer(cell: &Value) -> Option<i64> {
    match cell {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::Bool(b) => Some(i64::from(*b)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.trunc() as i64)
            })
        }
        _ => None,
    }
}

/// Preprocessing strategies keyed by dataset name. Unregistered names get the identity.
#[derive(Debug, Clone, Default)]
pub struct PreprocessRegistry {
    strategies: HashMap<String, TransformPipeline>,
}

impl PreprocessRegistry {
    /// Empty registry: every dataset passes through unchanged.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in dataset strategies.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(
            "malware_detect",
            TransformPipeline::new().add_step(TransformStep::CastInteger {
                column: "Label".to_string(),
            }),
        );
        registry
    }

    /// Register (or replace) the strategy for `dataset`.
    pub fn register(&mut self, dataset: &str, pipeline: TransformPipeline) {
        self.strategies.insert(dataset.to_string(), pipeline);
    }

    /// Append steps to whatever is already registered for `dataset`.
    pub fn extend(&mut self, dataset: &str, steps: impl IntoIterator<Item = TransformStep>) {
        self.strategies
            .entry(dataset.to_string())
            .or_default()
            .steps
            .extend(steps);
    }

    pub fn strategy(&self, dataset: &str) -> Option<&TransformPipeline> {
        self.strategies.get(dataset)
    }

    /// Apply the strategy registered for `dataset`, or return the batch unchanged.
    pub fn apply(&self, dataset: &str, batch: DataBatch) -> Result<DataBatch, MlError> {
        match self.strategies.get(dataset) {
            Some(pipeline) => pipeline.apply(batch),
            None => Ok(batch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn batch() -> DataBatch {
        DataBatch::new(
            vec!["a".into(), "b".into(), "Label".into()],
            vec![
                vec![json!(1), json!("red"), json!("1")],
                vec![json!(2), json!("blue"), json!(0.0)],
                vec![json!(1), json!("red"), json!("1")],
            ],
        )
    }

    #[test]
    fn test_drop_column() {
        let pipeline =
            TransformPipeline::new().add_step(TransformStep::DropColumn { column: "b".into() });
        let result = pipeline.apply(batch()).unwrap();
        assert_eq!(result.columns, vec!["a", "Label"]);
        assert_eq!(result.rows[0].len(), 2);
    }

    #[test]
    fn test_drop_unknown_column_fails() {
        let pipeline =
            TransformPipeline::new().add_step(TransformStep::DropColumn { column: "zz".into() });
        assert!(matches!(
            pipeline.apply(batch()),
            Err(MlError::Preprocessing(_))
        ));
    }

    #[test]
    fn test_cast_integer() {
        let pipeline = TransformPipeline::new().add_step(TransformStep::CastInteger {
            column: "Label".into(),
        });
        let result = pipeline.apply(batch()).unwrap();
        assert_eq!(result.rows[0][2], json!(1));
        assert_eq!(result.rows[1][2], json!(0));
    }

    #[test]
    fn test_cast_integer_rejects_text() {
        let pipeline = TransformPipeline::new().add_step(TransformStep::CastInteger {
            column: "b".into(),
        });
        assert!(pipeline.apply(batch()).is_err());
    }

    #[test]
    fn test_label_encode_and_deduplicate() {
        let pipeline = TransformPipeline::new()
            .add_step(TransformStep::LabelEncode { column: "b".into() })
            .add_step(TransformStep::Deduplicate);
        let result = pipeline.apply(batch()).unwrap();
        assert_eq!(result.row_count(), 2);
        assert_eq!(result.rows[0][1], json!(1));
        assert_eq!(result.rows[1][1], json!(0));
    }

    #[test]
    fn test_registry_defaults_to_identity() {
        let registry = PreprocessRegistry::with_builtins();
        let untouched = registry.apply("iris", batch()).unwrap();
        assert_eq!(untouched, batch());

        let cast = registry.apply("malware_detect", batch()).unwrap();
        assert_eq!(cast.rows[0][2], json!(1));
    }

    #[test]
    fn test_registry_extend() {
        let mut registry = PreprocessRegistry::with_builtins();
        registry.extend(
            "malware_detect",
            [TransformStep::DropColumn { column: "b".into() }],
        );
        assert_eq!(registry.strategy("malware_detect").unwrap().steps.len(), 2);
        let result = registry.apply("malware_detect", batch()).unwrap();
        assert_eq!(result.columns, vec!["a", "Label"]);
    }

    #[test]
    fn test_transform_step_serde() {
        let step: TransformStep =
            serde_json::from_str(r#"{"type":"cast_integer","column":"Label"}"#).unwrap();
        assert_eq!(
            step,
            TransformStep::CastInteger {
                column: "Label".into()
            }
        );
    }
}
