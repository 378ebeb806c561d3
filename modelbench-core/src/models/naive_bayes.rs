//! Gaussian naive Bayes.

use super::{Classifier, argmax, check_fit_input, check_predict_input, class_counts};
use crate::error::MlError;
use ndarray::{Array2, Axis};
use std::f64::consts::PI;

#[derive(Debug, Clone)]
struct Fitted {
    means: Array2<f64>,
    variances: Array2<f64>,
    log_priors: Vec<f64>,
}

/// Gaussian naive Bayes with variance smoothing relative to the widest feature.
#[derive(Debug, Clone)]
pub struct GaussianNb {
    var_smoothing: f64,
    fitted: Option<Fitted>,
}

impl Default for GaussianNb {
    fn default() -> Self {
        Self::new()
    }
}

impl GaussianNb {
    pub fn new() -> Self {
        Self {
            var_smoothing: 1e-9,
            fitted: None,
        }
    }
}

impl Classifier for GaussianNb {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize]) -> Result<(), MlError> {
        let n_classes = check_fit_input(x, y)?;
        let n_features = x.ncols();
        let counts = class_counts(y, n_classes);

        let widest = x
            .var_axis(Axis(0), 0.0)
            .iter()
            .copied()
            .fold(0.0_f64, f64::max);
        // Keeps constant features from producing zero variances.
        let epsilon = (self.var_smoothing * widest).max(1e-12);

        let mut means = Array2::<f64>::zeros((n_classes, n_features));
        let mut variances = Array2::<f64>::zeros((n_classes, n_features));
        for (row, &label) in x.rows().into_iter().zip(y) {
            let mut target = means.row_mut(label);
            target += &row;
        }
        for (class, &count) in counts.iter().enumerate() {
            if count > 0 {
                means.row_mut(class).mapv_inplace(|v| v / count as f64);
            }
        }
        for (row, &label) in x.rows().into_iter().zip(y) {
            let mean = means.row(label);
            let mut target = variances.row_mut(label);
            for ((acc, v), m) in target.iter_mut().zip(row.iter()).zip(mean.iter()) {
                *acc += (v - m).powi(2);
            }
        }
        for (class, &count) in counts.iter().enumerate() {
            let denom = count.max(1) as f64;
            variances
                .row_mut(class)
                .mapv_inplace(|v| v / denom + epsilon);
        }

        let n = y.len() as f64;
        let log_priors = counts
            .iter()
            .map(|&c| {
                if c == 0 {
                    f64::NEG_INFINITY
                } else {
                    (c as f64 / n).ln()
                }
            })
            .collect();

        self.fitted = Some(Fitted {
            means,
            variances,
            log_priors,
        });
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>, MlError> {
        let fitted = self
            .fitted
            .as_ref()
            .ok_or_else(|| MlError::not_trained("gaussian naive bayes"))?;
        check_predict_input(x, fitted.means.ncols())?;

        Ok(x.rows()
            .into_iter()
            .map(|row| {
                let joint: Vec<f64> = fitted
                    .log_priors
                    .iter()
                    .enumerate()
                    .map(|(class, prior)| {
                        let likelihood: f64 = row
                            .iter()
                            .zip(fitted.means.row(class))
                            .zip(fitted.variances.row(class))
                            .map(|((v, m), var)| {
                                -0.5 * (2.0 * PI * var).ln() - (v - m).powi(2) / (2.0 * var)
                            })
                            .sum();
                        prior + likelihood
                    })
                    .collect();
                argmax(&joint)
            })
            .collect())
    }
}
