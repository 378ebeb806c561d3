//! Property-based tests for splitting and metrics using proptest.

use proptest::prelude::*;

use modelbench_core::data::DataBatch;
use modelbench_core::data::split::{test_rows, train_test_split};
use modelbench_core::training::F1Average;
use modelbench_core::training::metrics::classification_metrics;
use serde_json::json;

fn batch(n: usize) -> DataBatch {
    DataBatch::new(
        vec!["id".into(), "label".into()],
        (0..n).map(|i| vec![json!(i), json!(i % 3)]).collect(),
    )
}

// --- Split properties ---

proptest! {
    #[test]
    fn split_partitions_every_row(
        n in 2usize..200,
        test_size in 0.05f64..0.5,
        seed in any::<u64>(),
    ) {
        let split = train_test_split(&batch(n), "label", test_size, seed).unwrap();
        prop_assert_eq!(split.x_train.row_count() + split.x_test.row_count(), n);
        prop_assert_eq!(split.y_train.row_count(), split.x_train.row_count());
        prop_assert_eq!(split.y_test.row_count(), split.x_test.row_count());
        prop_assert_eq!(split.x_test.row_count(), test_rows(n, test_size));

        let mut ids: Vec<u64> = split
            .x_train
            .rows
            .iter()
            .chain(&split.x_test.rows)
            .map(|row| row[0].as_u64().unwrap())
            .collect();
        ids.sort_unstable();
        prop_assert_eq!(ids, (0..n as u64).collect::<Vec<_>>());
    }

    #[test]
    fn split_is_reproducible(n in 2usize..100, seed in any::<u64>()) {
        let a = train_test_split(&batch(n), "label", 0.2, seed).unwrap();
        let b = train_test_split(&batch(n), "label", 0.2, seed).unwrap();
        prop_assert_eq!(a, b);
    }
}

// --- Metric properties ---

proptest! {
    #[test]
    fn metrics_stay_in_range(
        pairs in prop::collection::vec((0u8..4, 0u8..4), 1..60),
        macro_avg in any::<bool>(),
    ) {
        let actual: Vec<String> = pairs.iter().map(|(a, _)| a.to_string()).collect();
        let predicted: Vec<String> = pairs.iter().map(|(_, p)| p.to_string()).collect();
        let average = if macro_avg { F1Average::Macro } else { F1Average::Weighted };
        let m = classification_metrics(&actual, &predicted, average).unwrap();

        prop_assert!((0.0..=100.0).contains(&m.score));
        prop_assert!((0.0..=100.0).contains(&m.f1));
        prop_assert_eq!(m.confusion_matrix.dimension(), m.labels.len());
        prop_assert_eq!(m.confusion_matrix.total(), pairs.len() as u64);
    }
}
