//! Multinomial logistic regression trained by full-batch gradient descent.

use super::{Classifier, argmax, check_fit_input, check_predict_input};
use crate::error::MlError;
use ndarray::{Array1, Array2, Axis};

#[derive(Debug, Clone)]
struct Fitted {
    mean: Array1<f64>,
    scale: Array1<f64>,
    /// (n_features, n_classes)
    weights: Array2<f64>,
    bias: Array1<f64>,
}

impl Fitted {
    fn standardize(&self, x: &Array2<f64>) -> Array2<f64> {
        (x - &self.mean) / &self.scale
    }

    fn logits(&self, x: &Array2<f64>) -> Array2<f64> {
        self.standardize(x).dot(&self.weights) + &self.bias
    }
}

/// Softmax regression on standardized features, zero-initialised so runs are reproducible.
#[derive(Debug, Clone)]
pub struct LogisticRegression {
    learning_rate: f64,
    epochs: usize,
    fitted: Option<Fitted>,
}

impl LogisticRegression {
    pub fn new(learning_rate: f64, epochs: usize) -> Self {
        Self {
            learning_rate,
            epochs,
            fitted: None,
        }
    }
}

fn softmax_rows(logits: &mut Array2<f64>) {
    for mut row in logits.rows_mut() {
        let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|v| v / sum);
    }
}

impl Classifier for LogisticRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize]) -> Result<(), MlError> {
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(MlError::training(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        let n_classes = check_fit_input(x, y)?;
        let (n_samples, n_features) = x.dim();

        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| MlError::training("cannot compute feature means"))?;
        let scale = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > 1e-12 { s } else { 1.0 });

        let mut fitted = Fitted {
            mean,
            scale,
            weights: Array2::zeros((n_features, n_classes)),
            bias: Array1::zeros(n_classes),
        };
        let xs = fitted.standardize(x);

        let mut one_hot = Array2::<f64>::zeros((n_samples, n_classes));
        for (i, &label) in y.iter().enumerate() {
            one_hot[[i, label]] = 1.0;
        }

        let step = self.learning_rate / n_samples as f64;
        for _ in 0..self.epochs {
            let mut probs = xs.dot(&fitted.weights) + &fitted.bias;
            softmax_rows(&mut probs);
            let error = probs - &one_hot;
            let grad_w = xs.t().dot(&error);
            let grad_b = error.sum_axis(Axis(0));
            fitted.weights.scaled_add(-step, &grad_w);
            fitted.bias.scaled_add(-step, &grad_b);
        }

        if fitted.weights.iter().any(|w| !w.is_finite()) {
            return Err(MlError::training("gradient descent diverged"));
        }
        self.fitted = Some(fitted);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>, MlError> {
        let fitted = self
            .fitted
            .as_ref()
            .ok_or_else(|| MlError::not_trained("logistic regression"))?;
        check_predict_input(x, fitted.weights.nrows())?;
        let logits = fitted.logits(x);
        Ok(logits
            .rows()
            .into_iter()
            .map(|row| argmax(&row.to_vec()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::two_blobs;
    use ndarray::array;

    #[test]
    fn test_logistic_regression_three_classes() {
        let x = array![
            [0.0, 0.0],
            [0.2, 0.1],
            [5.0, 0.0],
            [5.1, 0.2],
            [0.0, 5.0],
            [0.1, 5.2]
        ];
        let y = vec![0, 0, 1, 1, 2, 2];
        let mut model = LogisticRegression::new(0.5, 500);
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_logistic_regression_rejects_bad_rate() {
        let (x, y) = two_blobs();
        assert!(LogisticRegression::new(0.0, 10).fit(&x, &y).is_err());
    }

    #[test]
    fn test_logistic_regression_untrained() {
        let (x, _) = two_blobs();
        assert!(matches!(
            LogisticRegression::new(0.1, 10).predict(&x),
            Err(MlError::NotTrained(_))
        ));
    }
}
