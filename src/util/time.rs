//! Time parsing and formatting utilities.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};

/// Parse an ISO-8601 UTC timestamp (`YYYY-MM-DDTHH:MM:SS`, optional
/// fractional seconds and trailing `Z`) to a UTC datetime.
///
/// Anything shorter than the 19-character date+time core fails.
#[must_use]
pub fn parse_iso8601_utc(iso: &str) -> Option<DateTime<Utc>> {
    if iso.len() < 19 {
        return None;
    }
    let naive = NaiveDateTime::parse_from_str(&iso[..19], "%Y-%m-%dT%H:%M:%S").ok()?;
    Some(Utc.from_utc_datetime(&naive))
}

/// Parse an ISO-8601 UTC timestamp to epoch seconds.
#[must_use]
pub fn parse_iso8601_utc_to_epoch(iso: &str) -> Option<i64> {
    parse_iso8601_utc(iso).map(|dt| dt.timestamp())
}

/// Format a duration in compact form: `Xh Ym`, `Ym Zs`, or `Zs`.
///
/// Negative durations clamp to zero.
#[must_use]
pub fn format_duration_compact(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {secs}s")
    } else {
        format!("{secs}s")
    }
}

/// Format a duration in tight form: `XhYm`, `YmZs`, or `Zs`, capped at `99h+`.
#[must_use]
pub fn format_duration_tight(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 99 {
        "99h+".to_string()
    } else if hours > 0 {
        format!("{hours}h{minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m{secs}s")
    } else {
        format!("{secs}s")
    }
}

/// Format an ISO-8601 UTC timestamp as a local-readable string
/// (`YYYY-MM-DD HH:MM:SS %Z`). Returns the input unchanged when it
/// cannot be parsed.
#[must_use]
pub fn format_timestamp_local(iso: &str) -> String {
    parse_iso8601_utc(iso).map_or_else(
        || iso.to_string(),
        |utc| {
            utc.with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S %Z")
                .to_string()
        },
    )
}

/// Current local time as `YYYY-MM-DD HH:MM:SS` (the CSV log row format).
#[must_use]
pub fn local_timestamp_string() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Parse a CSV-row local timestamp (`YYYY-MM-DD HH:MM:SS`) to epoch seconds.
#[must_use]
pub fn parse_local_timestamp(s: &str) -> Option<i64> {
    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").ok()?;
    Local
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.timestamp())
}
