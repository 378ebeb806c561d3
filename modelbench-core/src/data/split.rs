//! Shuffled train/test split into the four persisted tables.

use crate::data::table::DataBatch;
use crate::error::MlError;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// Feature and label tables for both partitions of one dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitTables {
    pub x_train: DataBatch,
    pub x_test: DataBatch,
    pub y_train: DataBatch,
    pub y_test: DataBatch,
}

impl SplitTables {
    pub fn train_len(&self) -> usize {
        self.x_train.row_count()
    }

    pub fn test_len(&self) -> usize {
        self.x_test.row_count()
    }
}

/// Row permutation for the given seed. The same seed always yields the same order.
pub fn shuffled_indices(n: usize, seed: u64) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);
    indices
}

/// Number of held-out rows: `ceil(test_size * n)`.
pub fn test_rows(n: usize, test_size: f64) -> usize {
    ((test_size * n as f64).ceil() as usize).min(n)
}

/// Split `batch` on `target` into shuffled train/test feature and label tables.
///
/// Features are every column except `target`, in their original order.
pub fn train_test_split(
    batch: &DataBatch,
    target: &str,
    test_size: f64,
    seed: u64,
) -> Result<SplitTables, MlError> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(MlError::invalid_input(format!(
            "test_size must lie strictly between 0 and 1, got {test_size}"
        )));
    }
    let target_idx = batch.column_index(target).ok_or_else(|| {
        MlError::dataset(format!("target column '{target}' not found"))
    })?;

    let n = batch.row_count();
    let n_test = test_rows(n, test_size);
    if n_test == 0 || n_test >= n {
        return Err(MlError::dataset(format!(
            "{n} rows cannot be split with test_size {test_size}"
        )));
    }

    let feature_idx: Vec<usize> = (0..batch.column_count())
        .filter(|&i| i != target_idx)
        .collect();
    let x = batch.select(&feature_idx);
    let y = batch.select(&[target_idx]);

    let permutation = shuffled_indices(n, seed);
    let (test_idx, train_idx) = permutation.split_at(n_test);

    Ok(SplitTables {
        x_train: x.take_rows(train_idx),
        x_test: x.take_rows(test_idx),
        y_train: y.take_rows(train_idx),
        y_test: y.take_rows(test_idx),
    })
}
