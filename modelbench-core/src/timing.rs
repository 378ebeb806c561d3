//! Wall-clock timing of labelled operations.

use std::time::{Duration, Instant};

/// Run `f`, logging how long it took under `label`.
///
/// Errors are logged with the same label and returned unchanged.
pub fn timed<T, E, F>(label: &str, f: F) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnOnce() -> Result<T, E>,
{
    let start = Instant::now();
    let result = f();
    let elapsed = start.elapsed();
    match &result {
        Ok(_) => tracing::info!(operation = label, "{label} took {}", format_duration(elapsed)),
        Err(e) => tracing::error!(
            operation = label,
            error = %e,
            "{label} failed after {}",
            format_duration(elapsed)
        ),
    }
    result
}

/// Split a duration into whole minutes and remaining seconds.
pub fn split_minutes(duration: Duration) -> (u64, f64) {
    let secs = duration.as_secs_f64();
    let minutes = (secs / 60.0).floor();
    (minutes as u64, secs - minutes * 60.0)
}

/// Human-readable duration: seconds below a minute, minutes and seconds above.
pub fn format_duration(duration: Duration) -> String {
    if duration.as_secs_f64() > 60.0 {
        let (minutes, seconds) = split_minutes(duration);
        format!("{minutes} min {seconds:.3} s")
    } else {
        format!("{:.3} s", duration.as_secs_f64())
    }
}
