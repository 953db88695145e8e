//! CSV quota log: one row per successful fetch.
//!
//! Columns: `Timestamp,Used,Percentage,Reset,Event`. Timestamps are local
//! `YYYY-MM-DD HH:MM:SS`; `Used` has 4 decimals, `Percentage` has 2. The
//! header is written once when the file is new or empty.
//!
//! Event classification compares against the last *persisted* row. It is
//! independent of, and coarser than, the engine's in-memory window-reset
//! heuristic; both exist on purpose.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::core::snapshot::QuotaSnapshot;
use crate::error::Result;
use crate::util::time::{local_timestamp_string, parse_local_timestamp};

/// CSV header row.
pub const CSV_HEADER: &str = "Timestamp,Used,Percentage,Reset,Event";

/// Elapsed time after which low usage suggests a missed reset.
const POSSIBLE_RESET_ELAPSED_SECS: i64 = 5 * 60 * 60;

/// Coarse event classification for log rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaEvent {
    /// No previous row to compare against.
    FirstRun,
    /// Ordinary refresh.
    Update,
    /// Usage dropped by more than 20 percentage points.
    QuotaReset,
    /// At least 5 hours elapsed and usage is below 10%.
    PossibleReset,
    /// Usage climbed by more than 10 percentage points.
    HighUsage,
}

impl QuotaEvent {
    /// Label written to the CSV `Event` column.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::FirstRun => "FIRST_RUN",
            Self::Update => "UPDATE",
            Self::QuotaReset => "QUOTA_RESET",
            Self::PossibleReset => "POSSIBLE_RESET",
            Self::HighUsage => "HIGH_USAGE",
        }
    }

    /// Whether this event merits calling out to the user.
    #[must_use]
    pub const fn is_notable(self) -> bool {
        matches!(self, Self::QuotaReset | Self::PossibleReset)
    }
}

impl std::fmt::Display for QuotaEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A row read back from the log.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    /// Row capture time, epoch seconds (parsed from local time).
    pub timestamp: i64,
    pub used: f64,
    pub percentage: f64,
    pub reset: String,
}

/// Classify the event for a new snapshot against the last persisted entry.
#[must_use]
pub fn classify_event(current: &QuotaSnapshot, previous: Option<&LogEntry>) -> QuotaEvent {
    let Some(previous) = previous else {
        return QuotaEvent::FirstRun;
    };

    if current.percentage < previous.percentage - 20.0 {
        return QuotaEvent::QuotaReset;
    }

    let elapsed = current.timestamp - previous.timestamp;
    if elapsed >= POSSIBLE_RESET_ELAPSED_SECS && current.percentage < 10.0 {
        return QuotaEvent::PossibleReset;
    }

    if current.percentage > previous.percentage + 10.0 {
        return QuotaEvent::HighUsage;
    }

    QuotaEvent::Update
}

/// Append-only CSV log of successful fetches.
#[derive(Debug, Clone)]
pub struct QuotaLog {
    path: PathBuf,
}

impl QuotaLog {
    /// Create a log handle for the given path. Nothing is touched until
    /// the first append.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The log file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the last data row, skipping the header. Missing or corrupt
    /// files read as "no previous entry".
    #[must_use]
    pub fn read_last_entry(&self) -> Option<LogEntry> {
        let content = fs::read_to_string(&self.path).ok()?;

        let last_line = content
            .lines()
            .filter(|line| !line.is_empty() && !line.contains("Timestamp"))
            .next_back()?;

        let mut fields = last_line.split(',');
        let timestamp = parse_local_timestamp(fields.next()?)?;
        let used = fields.next()?.parse().ok()?;
        let percentage = fields.next()?.parse().ok()?;
        let reset = fields.next()?.to_string();

        Some(LogEntry {
            timestamp,
            used,
            percentage,
            reset,
        })
    }

    /// Append one row, writing the header first when the file is new or
    /// empty.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the file cannot be created or written.
    pub fn append(&self, snapshot: &QuotaSnapshot, event: QuotaEvent) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let needs_header = fs::metadata(&self.path).map_or(true, |m| m.len() == 0);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        if needs_header {
            writeln!(file, "{CSV_HEADER}")?;
        }

        writeln!(
            file,
            "{},{:.4},{:.2},{},{}",
            local_timestamp_string(),
            snapshot.used,
            snapshot.percentage,
            snapshot.reset_time,
            event.label()
        )?;
        Ok(())
    }

    /// Classify against the last persisted row and append in one step.
    /// Returns the classified event so callers can surface notable ones.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the append fails.
    pub fn record(&self, snapshot: &QuotaSnapshot) -> Result<QuotaEvent> {
        let previous = self.read_last_entry();
        let event = classify_event(snapshot, previous.as_ref());
        self.append(snapshot, event)?;
        tracing::debug!(event = event.label(), path = %self.path.display(), "quota row logged");
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::snapshot::RESET_TIME_NONE;

    fn snap(pct: f64, timestamp: i64) -> QuotaSnapshot {
        QuotaSnapshot {
            used: pct / 100.0,
            percentage: pct,
            reset_time: RESET_TIME_NONE.to_string(),
            timestamp,
        }
    }

    fn entry(pct: f64, timestamp: i64) -> LogEntry {
        LogEntry {
            timestamp,
            used: pct / 100.0,
            percentage: pct,
            reset: RESET_TIME_NONE.to_string(),
        }
    }

    #[test]
    fn no_previous_is_first_run() {
        assert_eq!(classify_event(&snap(5.0, 100), None), QuotaEvent::FirstRun);
    }

    #[test]
    fn big_drop_is_quota_reset() {
        let prev = entry(60.0, 1000);
        assert_eq!(
            classify_event(&snap(30.0, 2000), Some(&prev)),
            QuotaEvent::QuotaReset
        );
        // Exactly -20 is not enough; strictly more than 20 points.
        assert_eq!(
            classify_event(&snap(40.0, 2000), Some(&prev)),
            QuotaEvent::Update
        );
    }

    #[test]
    fn old_row_and_low_usage_is_possible_reset() {
        let prev = entry(15.0, 0);
        let current = snap(5.0, POSSIBLE_RESET_ELAPSED_SECS);
        assert_eq!(
            classify_event(&current, Some(&prev)),
            QuotaEvent::PossibleReset
        );

        // Same gap but usage too high.
        let busy = snap(12.0, POSSIBLE_RESET_ELAPSED_SECS);
        assert_eq!(classify_event(&busy, Some(&prev)), QuotaEvent::Update);
    }

    #[test]
    fn big_climb_is_high_usage() {
        let prev = entry(20.0, 1000);
        assert_eq!(
            classify_event(&snap(35.0, 2000), Some(&prev)),
            QuotaEvent::HighUsage
        );
        assert_eq!(
            classify_event(&snap(29.0, 2000), Some(&prev)),
            QuotaEvent::Update
        );
    }

    #[test]
    fn header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let log = QuotaLog::new(dir.path().join("quota.csv"));

        log.append(&snap(10.0, 1000), QuotaEvent::FirstRun).unwrap();
        log.append(&snap(12.0, 2000), QuotaEvent::Update).unwrap();

        let content = fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER);
        assert!(lines[1].ends_with(",FIRST_RUN"));
        assert!(lines[2].ends_with(",UPDATE"));
    }

    #[test]
    fn row_formatting() {
        let dir = tempfile::tempdir().unwrap();
        let log = QuotaLog::new(dir.path().join("quota.csv"));
        let snapshot = QuotaSnapshot {
            used: 0.123_456,
            percentage: 12.345_6,
            reset_time: "2025-01-01T10:00:00Z".to_string(),
            timestamp: 0,
        };

        log.append(&snapshot, QuotaEvent::Update).unwrap();

        let content = fs::read_to_string(log.path()).unwrap();
        let row = content.lines().nth(1).unwrap();
        assert!(row.contains(",0.1235,12.35,2025-01-01T10:00:00Z,UPDATE"));
    }

    #[test]
    fn read_last_entry_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let log = QuotaLog::new(dir.path().join("quota.csv"));

        assert!(log.read_last_entry().is_none());

        log.append(&snap(10.0, 0), QuotaEvent::FirstRun).unwrap();
        log.append(&snap(42.0, 0), QuotaEvent::Update).unwrap();

        let entry = log.read_last_entry().expect("last entry");
        assert!((entry.percentage - 42.0).abs() < 1e-9);
        assert!((entry.used - 0.42).abs() < 1e-9);
        assert_eq!(entry.reset, RESET_TIME_NONE);
    }

    #[test]
    fn corrupt_file_reads_as_no_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quota.csv");
        fs::write(&path, "garbage line without commas\n").unwrap();

        assert!(QuotaLog::new(&path).read_last_entry().is_none());
    }

    #[test]
    fn record_classifies_against_persisted_row() {
        let dir = tempfile::tempdir().unwrap();
        let log = QuotaLog::new(dir.path().join("quota.csv"));
        let now = chrono::Utc::now().timestamp();

        assert_eq!(log.record(&snap(50.0, now)).unwrap(), QuotaEvent::FirstRun);
        assert_eq!(log.record(&snap(52.0, now)).unwrap(), QuotaEvent::Update);
        assert_eq!(
            log.record(&snap(20.0, now)).unwrap(),
            QuotaEvent::QuotaReset
        );
    }
}
