//! Quota payload parsing.
//!
//! The wire contract is a single JSON object: `{"used": <number>,
//! "reset": "<ISO-8601 UTC>"|null}`. `used` is required and numeric;
//! `reset` is optional and normalizes to the `"N/A"` sentinel.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{FwqError, Result};

/// Sentinel reset-time value when the API reports no active window.
pub const RESET_TIME_NONE: &str = "N/A";

/// Raw wire payload. `used` is an `Option` so a `null` in the body is
/// distinguishable from a missing field only by message, not by kind.
#[derive(Debug, Deserialize)]
struct QuotaPayload {
    used: Option<f64>,
    #[serde(default)]
    reset: Option<String>,
}

/// Normalized quota state produced by one successful fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaSnapshot {
    /// Raw "used" value from the API, conceptually in [0, 1] but not
    /// enforced at storage time.
    pub used: f64,
    /// `used * 100`; clamped to [0, 100] only at render time.
    pub percentage: f64,
    /// ISO-8601 UTC reset timestamp, or [`RESET_TIME_NONE`].
    pub reset_time: String,
    /// Local capture time (epoch seconds), not server time.
    pub timestamp: i64,
}

impl QuotaSnapshot {
    /// Whether this snapshot carries a real reset time.
    #[must_use]
    pub fn has_reset_time(&self) -> bool {
        self.reset_time != RESET_TIME_NONE
    }
}

/// Parse a response body into a snapshot, stamping the local capture time.
///
/// # Errors
///
/// Returns [`FwqError::Parse`] for malformed JSON or a missing, null, or
/// non-numeric `used` field.
pub fn parse_quota_body(body: &str) -> Result<QuotaSnapshot> {
    parse_quota_body_at(body, Utc::now().timestamp())
}

/// Parse with an explicit capture timestamp (tests pin the clock).
///
/// # Errors
///
/// Returns [`FwqError::Parse`] for malformed JSON or a missing, null, or
/// non-numeric `used` field.
pub fn parse_quota_body_at(body: &str, captured_at: i64) -> Result<QuotaSnapshot> {
    let payload: QuotaPayload = serde_json::from_str(body).map_err(|e| FwqError::Parse {
        message: e.to_string(),
    })?;

    let used = payload.used.ok_or_else(|| FwqError::Parse {
        message: "missing 'used'".to_string(),
    })?;

    let reset_time = match payload.reset {
        Some(reset) if !reset.is_empty() => reset,
        _ => RESET_TIME_NONE.to_string(),
    };

    Ok(QuotaSnapshot {
        used,
        percentage: used * 100.0,
        reset_time,
        timestamp: captured_at,
    })
}
