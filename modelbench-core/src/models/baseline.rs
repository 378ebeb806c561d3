//! Baseline classifiers that ignore the features.

use super::{Classifier, check_fit_input, check_predict_input, class_counts};
use crate::error::MlError;
use ndarray::Array2;
use rand::SeedableRng;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;

/// Predicts the most frequent training class. Ties go to the lowest class index.
#[derive(Debug, Clone, Default)]
pub struct MajorityClassifier {
    fitted: Option<(usize, usize)>,
}

impl MajorityClassifier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Classifier for MajorityClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize]) -> Result<(), MlError> {
        let n_classes = check_fit_input(x, y)?;
        let counts = class_counts(y, n_classes);
        let mut best = 0;
        for (class, &count) in counts.iter().enumerate() {
            if count > counts[best] {
                best = class;
            }
        }
        self.fitted = Some((best, x.ncols()));
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>, MlError> {
        let (class, n_features) = self
            .fitted
            .ok_or_else(|| MlError::not_trained("majority classifier"))?;
        check_predict_input(x, n_features)?;
        Ok(vec![class; x.nrows()])
    }
}

/// Draws predictions from the training class distribution.
///
/// The seed fixes the draws, so repeated predictions on the same input agree.
#[derive(Debug, Clone)]
pub struct StratifiedClassifier {
    seed: u64,
    fitted: Option<(Vec<usize>, usize)>,
}

impl StratifiedClassifier {
    pub fn new(seed: u64) -> Self {
        Self { seed, fitted: None }
    }
}

impl Classifier for StratifiedClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize]) -> Result<(), MlError> {
        let n_classes = check_fit_input(x, y)?;
        self.fitted = Some((class_counts(y, n_classes), x.ncols()));
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>, MlError> {
        let (counts, n_features) = self
            .fitted
            .as_ref()
            .ok_or_else(|| MlError::not_trained("stratified classifier"))?;
        check_predict_input(x, *n_features)?;
        let dist = WeightedIndex::new(counts.iter().copied())
            .map_err(|e| MlError::evaluation(format!("class distribution: {e}")))?;
        let mut rng = StdRng::seed_from_u64(self.seed);
        Ok((0..x.nrows()).map(|_| dist.sample(&mut rng)).collect())
    }
}
