use std::time::{Duration, Instant};

/// Render a duration with two decimals and an auto-scaled unit, e.g. `1.94ms`.
pub fn fmt_duration(d: Duration) -> String {
    format!("{d:.2?}")
}

/// Emit a warning when an operation started at `start` ran past `threshold`.
pub fn warn_if_slow(start: Instant, threshold: Duration, operation: &str) {
    let elapsed = start.elapsed();
    if elapsed > threshold {
        tracing::warn!(
            duration = fmt_duration(elapsed),
            threshold = fmt_duration(threshold),
            operation,
            "Operation ran slow"
        );
    }
}
