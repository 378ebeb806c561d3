//! Classifiers benchmarked by the sweep.
//!
//! Every model works on a dense `f64` feature matrix and class indices `0..k`
//! produced by [`LabelEncoder`]. Models are built fresh for every trial through a
//! [`ModelDescriptor`] factory, so no state leaks between trials.

pub mod baseline;
pub mod knn;
pub mod linear;
pub mod naive_bayes;

pub use baseline::{MajorityClassifier, StratifiedClassifier};
pub use knn::{KnnClassifier, NearestCentroid};
pub use linear::LogisticRegression;
pub use naive_bayes::GaussianNb;

use crate::config::ModelConfig;
use crate::data::table::compare_labels;
use crate::error::MlError;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// A trainable classifier.
pub trait Classifier {
    /// Fit on features `x` and encoded labels `y`.
    fn fit(&mut self, x: &Array2<f64>, y: &[usize]) -> Result<(), MlError>;

    /// Predict encoded labels for every row of `x`.
    fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>, MlError>;
}

/// Declarative model choice, as written in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSpec {
    /// Always predicts the most frequent training class.
    Majority,
    /// Random predictions following the training class distribution, seeded by trial.
    Stratified,
    Knn {
        #[serde(default = "default_neighbors")]
        n_neighbors: usize,
    },
    GaussianNb,
    NearestCentroid,
    LogisticRegression {
        #[serde(default = "default_learning_rate")]
        learning_rate: f64,
        #[serde(default = "default_epochs")]
        epochs: usize,
    },
}

fn default_neighbors() -> usize {
    5
}

fn default_learning_rate() -> f64 {
    0.1
}

fn default_epochs() -> usize {
    300
}

impl ModelSpec {
    /// Build an untrained model for the given 1-based trial.
    pub fn build(&self, trial: u32) -> Box<dyn Classifier> {
        match self {
            ModelSpec::Majority => Box::new(MajorityClassifier::new()),
            ModelSpec::Stratified => Box::new(StratifiedClassifier::new(u64::from(trial))),
            ModelSpec::Knn { n_neighbors } => Box::new(KnnClassifier::new(*n_neighbors)),
            ModelSpec::GaussianNb => Box::new(GaussianNb::new()),
            ModelSpec::NearestCentroid => Box::new(NearestCentroid::new()),
            ModelSpec::LogisticRegression {
                learning_rate,
                epochs,
            } => Box::new(LogisticRegression::new(*learning_rate, *epochs)),
        }
    }
}

type ModelFactory = Box<dyn Fn(u32) -> Box<dyn Classifier>>;

/// A named model and the factory that builds a fresh instance per trial.
pub struct ModelDescriptor {
    pub name: String,
    factory: ModelFactory,
}

impl ModelDescriptor {
    pub fn new(
        name: impl Into<String>,
        factory: impl Fn(u32) -> Box<dyn Classifier> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            factory: Box::new(factory),
        }
    }

    pub fn from_spec(name: impl Into<String>, spec: ModelSpec) -> Self {
        Self::new(name, move |trial| spec.build(trial))
    }

    pub fn build(&self, trial: u32) -> Box<dyn Classifier> {
        (self.factory)(trial)
    }
}

impl fmt::Debug for ModelDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelDescriptor")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Descriptors for every configured model, in configuration order.
pub fn descriptors_from_config(models: &[ModelConfig]) -> Vec<ModelDescriptor> {
    models
        .iter()
        .map(|m| ModelDescriptor::from_spec(&m.name, m.spec.clone()))
        .collect()
}

/// Maps label strings to dense class indices in sorted label order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelEncoder {
    classes: Vec<String>,
    index: HashMap<String, usize>,
}

impl LabelEncoder {
    pub fn fit(labels: &[String]) -> Self {
        let distinct: BTreeSet<&String> = labels.iter().collect();
        let mut classes: Vec<String> = distinct.into_iter().cloned().collect();
        classes.sort_by(|a, b| compare_labels(a, b));
        let index = classes
            .iter()
            .enumerate()
            .map(|(i, c)| (c.clone(), i))
            .collect();
        Self { classes, index }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    /// Encode labels seen during fitting. Unknown labels are an error.
    pub fn encode(&self, labels: &[String]) -> Result<Vec<usize>, MlError> {
        labels
            .iter()
            .map(|label| {
                self.index
                    .get(label)
                    .copied()
                    .ok_or_else(|| MlError::invalid_input(format!("unknown label '{label}'")))
            })
            .collect()
    }

    pub fn decode(&self, code: usize) -> Option<&str> {
        self.classes.get(code).map(String::as_str)
    }
}

/// Validate fit input and return the number of classes.
pub(crate) fn check_fit_input(x: &Array2<f64>, y: &[usize]) -> Result<usize, MlError> {
    if x.nrows() == 0 {
        return Err(MlError::training("no training rows"));
    }
    if x.nrows() != y.len() {
        return Err(MlError::training(format!(
            "{} feature rows but {} labels",
            x.nrows(),
            y.len()
        )));
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(MlError::training("features contain non-finite values"));
    }
    Ok(y.iter().max().map_or(0, |m| m + 1))
}

/// Validate prediction input against the fitted feature count.
pub(crate) fn check_predict_input(x: &Array2<f64>, n_features: usize) -> Result<(), MlError> {
    if x.ncols() != n_features {
        return Err(MlError::evaluation(format!(
            "model was fitted on {n_features} features, got {}",
            x.ncols()
        )));
    }
    Ok(())
}

/// Index of the first maximal value.
pub(crate) fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

/// Class frequencies of `y` over `n_classes` classes.
pub(crate) fn class_counts(y: &[usize], n_classes: usize) -> Vec<usize> {
    let mut counts = vec![0; n_classes];
    for &label in y {
        counts[label] += 1;
    }
    counts
}
