//! Raw result rows as CSV.

use crate::error::MlError;
use crate::storage::TestResult;
use std::path::Path;

/// Write `rows` to `path` with the results table header.
pub fn write_results_csv(path: &Path, rows: &[&TestResult]) -> Result<(), MlError> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    #[test]
    fn test_write_results_csv() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("KNN.csv");
        let row = TestResult {
            model_name: "KNN".into(),
            dataset_name: "iris".into(),
            trial: 2,
            score: 96.67,
            f1: 96.66,
            duration_secs: 0.5,
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            confusion_matrix: "[[1,0],[0,1]]".into(),
        };
        write_results_csv(&path, &[&row]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "modellname,datenname,durchgang,score,f1,dauer,laufzeit,cm"
        );
        assert_eq!(
            lines.next().unwrap(),
            "KNN,iris,2,96.67,96.66,0.5,2024-03-01T12:00:00Z,\"[[1,0],[0,1]]\""
        );
    }
}
