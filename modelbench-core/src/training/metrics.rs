//! Classification metrics.

use crate::data::table::compare_labels;
use crate::error::MlError;
use crate::storage::ConfusionMatrix;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// How per-class F1 scores are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum F1Average {
    /// Weighted by the number of true instances of each class.
    #[default]
    Weighted,
    /// Unweighted mean over every observed class.
    Macro,
}

/// Metrics of one evaluation, scaled to percent and rounded to two decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub score: f64,
    pub f1: f64,
    /// Sorted labels indexing the confusion matrix.
    pub labels: Vec<String>,
    pub confusion_matrix: ConfusionMatrix,
}

/// Round to two decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Labels seen in either slice, in label order.
pub fn observed_labels(actual: &[String], predicted: &[String]) -> Vec<String> {
    let distinct: BTreeSet<&String> = actual.iter().chain(predicted).collect();
    let mut labels: Vec<String> = distinct.into_iter().cloned().collect();
    labels.sort_by(|a, b| compare_labels(a, b));
    labels
}

/// Confusion matrix over `labels`; rows are actual labels, columns predicted labels.
pub fn confusion_matrix(
    actual: &[String],
    predicted: &[String],
    labels: &[String],
) -> Result<ConfusionMatrix, MlError> {
    let index: HashMap<&str, usize> = labels
        .iter()
        .enumerate()
        .map(|(i, l)| (l.as_str(), i))
        .collect();
    let mut cm = ConfusionMatrix::zeros(labels.len());
    for (a, p) in actual.iter().zip(predicted) {
        let (Some(&i), Some(&j)) = (index.get(a.as_str()), index.get(p.as_str())) else {
            return Err(MlError::evaluation(format!(
                "label pair ({a}, {p}) missing from label set"
            )));
        };
        cm.increment(i, j);
    }
    Ok(cm)
}

/// Fraction of matching predictions.
pub fn accuracy(cm: &ConfusionMatrix) -> f64 {
    let total = cm.total();
    if total == 0 {
        return 0.0;
    }
    let correct: u64 = (0..cm.dimension()).map(|i| cm.rows()[i][i]).sum();
    correct as f64 / total as f64
}

/// F1 score from a confusion matrix. Classes with undefined precision or recall score 0.
pub fn f1_score(cm: &ConfusionMatrix, average: F1Average) -> f64 {
    let n = cm.dimension();
    if n == 0 {
        return 0.0;
    }
    let rows = cm.rows();
    let mut per_class = Vec::with_capacity(n);
    let mut support = Vec::with_capacity(n);
    for k in 0..n {
        let tp = rows[k][k] as f64;
        let actual: u64 = rows[k].iter().sum();
        let predicted: u64 = rows.iter().map(|r| r[k]).sum();
        let precision = if predicted > 0 { tp / predicted as f64 } else { 0.0 };
        let recall = if actual > 0 { tp / actual as f64 } else { 0.0 };
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        per_class.push(f1);
        support.push(actual as f64);
    }
    match average {
        F1Average::Macro => per_class.iter().sum::<f64>() / n as f64,
        F1Average::Weighted => {
            let total: f64 = support.iter().sum();
            if total == 0.0 {
                return 0.0;
            }
            per_class
                .iter()
                .zip(&support)
                .map(|(f, s)| f * s)
                .sum::<f64>()
                / total
        }
    }
}

/// Score, F1 and confusion matrix for one set of predictions.
pub fn classification_metrics(
    actual: &[String],
    predicted: &[String],
    average: F1Average,
) -> Result<ClassificationMetrics, MlError> {
    if actual.len() != predicted.len() {
        return Err(MlError::evaluation(format!(
            "{} labels but {} predictions",
            actual.len(),
            predicted.len()
        )));
    }
    if actual.is_empty() {
        return Err(MlError::evaluation("no rows to evaluate"));
    }
    let labels = observed_labels(actual, predicted);
    let cm = confusion_matrix(actual, predicted, &labels)?;
    Ok(ClassificationMetrics {
        score: round2(accuracy(&cm) * 100.0),
        f1: round2(f1_score(&cm, average) * 100.0),
        labels,
        confusion_matrix: cm,
    })
}
