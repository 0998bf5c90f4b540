use chrono::{DateTime, Local};

/// Fixed stamp used in artifact names: `YYYYMMDD_HHMMSS`.
pub const ARTIFACT_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

// Get current local timestamp as a formatted string
pub fn current_local_timestamp_str(format_str: &str) -> String {
    let now: DateTime<Local> = Local::now();
    now.format(format_str).to_string()
}

/// ISO-8601 local time, as the tracking API expects for `end_time`.
pub fn current_local_iso8601() -> String {
    Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}
