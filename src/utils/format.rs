// Display helpers shared by the CLI surfaces
// Author: kelexine (https://github.com/kelexine)

use chrono::{DateTime, Utc};

/// Placeholder shown for missing values.
pub const MISSING: &str = "—";

/// Format a timestamp as `YYYY-MM-DD HH:MM` (UTC).
pub fn fmt_ts(ts: Option<&DateTime<Utc>>) -> String {
    match ts {
        Some(ts) => ts.format("%Y-%m-%d %H:%M").to_string(),
        None => MISSING.to_string(),
    }
}

/// Human-readable byte size.
pub fn fmt_bytes(bytes: Option<u64>) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let Some(bytes) = bytes else {
        return MISSING.to_string();
    };

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// Truncate to at most `max` characters, appending `...` when shortened.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let head: String = text.chars().take(max).collect();
        format!("{}...", head)
    }
}
