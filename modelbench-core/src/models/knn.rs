//! Distance-based classifiers.

use super::{Classifier, argmax, check_fit_input, check_predict_input, class_counts};
use crate::error::MlError;
use ndarray::{Array2, ArrayView1};

fn squared_distance(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

/// k-nearest neighbours with Euclidean distance and uniform votes.
#[derive(Debug, Clone)]
pub struct KnnClassifier {
    n_neighbors: usize,
    train: Option<(Array2<f64>, Vec<usize>, usize)>,
}

impl KnnClassifier {
    pub fn new(n_neighbors: usize) -> Self {
        Self {
            n_neighbors,
            train: None,
        }
    }
}

impl Classifier for KnnClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize]) -> Result<(), MlError> {
        if self.n_neighbors == 0 {
            return Err(MlError::training("n_neighbors must be at least 1"));
        }
        let n_classes = check_fit_input(x, y)?;
        self.train = Some((x.clone(), y.to_vec(), n_classes));
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>, MlError> {
        let (train_x, train_y, n_classes) = self
            .train
            .as_ref()
            .ok_or_else(|| MlError::not_trained("knn classifier"))?;
        check_predict_input(x, train_x.ncols())?;
        let k = self.n_neighbors.min(train_x.nrows());

        let predictions = x
            .rows()
            .into_iter()
            .map(|row| {
                let mut distances: Vec<(f64, usize)> = train_x
                    .rows()
                    .into_iter()
                    .zip(train_y)
                    .map(|(t, &label)| (squared_distance(row, t), label))
                    .collect();
                // Stable sort keeps training order among equal distances.
                distances.sort_by(|a, b| a.0.total_cmp(&b.0));
                let neighbours: Vec<usize> = distances[..k].iter().map(|&(_, l)| l).collect();
                let votes: Vec<f64> = class_counts(&neighbours, *n_classes)
                    .into_iter()
                    .map(|c| c as f64)
                    .collect();
                argmax(&votes)
            })
            .collect();
        Ok(predictions)
    }
}

/// Assigns each row to the class with the closest feature mean.
#[derive(Debug, Clone, Default)]
pub struct NearestCentroid {
    centroids: Option<Array2<f64>>,
}

impl NearestCentroid {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Classifier for NearestCentroid {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize]) -> Result<(), MlError> {
        let n_classes = check_fit_input(x, y)?;
        let counts = class_counts(y, n_classes);
        let mut centroids = Array2::<f64>::zeros((n_classes, x.ncols()));
        for (row, &label) in x.rows().into_iter().zip(y) {
            let mut target = centroids.row_mut(label);
            target += &row;
        }
        for (class, &count) in counts.iter().enumerate() {
            if count > 0 {
                centroids.row_mut(class).mapv_inplace(|v| v / count as f64);
            } else {
                centroids.row_mut(class).fill(f64::INFINITY);
            }
        }
        self.centroids = Some(centroids);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>, MlError> {
        let centroids = self
            .centroids
            .as_ref()
            .ok_or_else(|| MlError::not_trained("nearest centroid"))?;
        check_predict_input(x, centroids.ncols())?;
        Ok(x.rows()
            .into_iter()
            .map(|row| {
                let closeness: Vec<f64> = centroids
                    .rows()
                    .into_iter()
                    .map(|c| -squared_distance(row, c))
                    .collect();
                argmax(&closeness)
            })
            .collect())
    }
}
