//! Formatting helpers for byte sizes, durations and metadata fields.

use std::time::Duration;

use chrono::NaiveDate;

/// Formats a byte count as a human-readable string (B, KB, MB, GB).
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

/// Formats a duration as a human-readable string (e.g. "5.0s", "1m 05s", "1h 01m 05s").
#[must_use]
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 3600 {
        format!(
            "{}h {:02}m {:02}s",
            secs / 3600,
            (secs % 3600) / 60,
            secs % 60
        )
    } else if secs >= 60 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{}.{:01}s", secs, d.subsec_millis() / 100)
    }
}

/// Formats a media length in seconds as `m:ss`, or `Unknown`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
#[must_use]
pub fn format_clock(seconds: Option<f64>) -> String {
    match seconds {
        Some(s) if s.is_finite() && s > 0.0 => {
            let total = s as u64;
            format!("{}:{:02}", total / 60, total % 60)
        }
        _ => "Unknown".to_string(),
    }
}

/// Formats a view count as `1.2M`, `3.4K` or the raw number.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn format_views(views: Option<u64>) -> String {
    match views {
        None | Some(0) => "No data".to_string(),
        Some(v) if v > 1_000_000 => format!("{:.1}M", v as f64 / 1_000_000.0),
        Some(v) if v > 1_000 => format!("{:.1}K", v as f64 / 1_000.0),
        Some(v) => v.to_string(),
    }
}

/// Formats a `YYYYMMDD` upload date as `YYYY-MM-DD`, or `Unknown date`.
#[must_use]
pub fn format_upload_date(raw: Option<&str>) -> String {
    raw.and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y%m%d").ok())
        .map_or_else(
            || "Unknown date".to_string(),
            |date| date.format("%Y-%m-%d").to_string(),
        )
}
