//! One-shot quota fetch.
//!
//! Unlike watch mode this path keeps typed errors all the way to the exit
//! code, so a 401 exits differently from a DNS failure.

use chrono::Utc;

use crate::cli::args::QuotaArgs;
use crate::core::engine::QuotaView;
use crate::core::http::{DEFAULT_TIMEOUT, QuotaClient};
use crate::core::snapshot::{self, QuotaSnapshot};
use crate::core::{auth::AuthMethod, credentials};
use crate::error::{FwqError, Result};
use crate::render::{RenderOptions, render_view};
use crate::storage::paths::AppPaths;
use crate::storage::quota_log::QuotaLog;

/// Fetch the quota once and print it.
///
/// # Errors
///
/// Returns the typed fetch error (credential, transport, HTTP, auth,
/// parse) so `main` can map it to an exit code.
pub async fn run(args: &QuotaArgs, no_color: bool) -> Result<()> {
    let credentials =
        credentials::resolve(args.api_key.as_deref()).ok_or(FwqError::CredentialMissing)?;

    let client = QuotaClient::with_endpoint(&args.endpoint, DEFAULT_TIMEOUT)?;
    let (snap, used_method) = fetch_once(&client, &credentials).await?;

    if let Some(method) = used_method {
        tracing::debug!(method = method.label(), "authenticated");
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&snap).map_err(|e| {
            FwqError::Parse {
                message: format!("failed to serialize snapshot: {e}"),
            }
        })?);
    } else {
        let opts = RenderOptions::detect(no_color, args.text);
        print!(
            "{}",
            render_view(&one_shot_view(&snap), &opts, Utc::now().timestamp())
        );
    }

    if let Some(log_path) = &args.log {
        let log = if log_path.as_os_str().is_empty() {
            QuotaLog::new(AppPaths::new().quota_log_file())
        } else {
            QuotaLog::new(log_path.clone())
        };
        let event = log.record(&snap)?;
        if event.is_notable() {
            println!("Note: {event} detected (see {})", log.path().display());
        }
    }

    Ok(())
}

/// Run the fetch pipeline once, returning the snapshot and the auth
/// method that worked.
pub async fn fetch_once(
    client: &QuotaClient,
    credentials: &credentials::Credentials,
) -> Result<(QuotaSnapshot, Option<AuthMethod>)> {
    let resolution = client
        .fetch_with_auth(&credentials.api_key, &credentials.token, None)
        .await;

    if resolution.outcome.is_success() {
        let snap = snapshot::parse_quota_body(&resolution.outcome.body)?;
        Ok((snap, resolution.used_method))
    } else {
        Err(resolution.outcome.into_error())
    }
}

/// Build a display view for a single fresh snapshot: no history, no
/// staleness, no pending attempt.
fn one_shot_view(snap: &QuotaSnapshot) -> QuotaView {
    QuotaView {
        used: Some(snap.used),
        percentage: Some(snap.percentage),
        reset_time: Some(snap.reset_time.clone()),
        captured_at: Some(snap.timestamp),
        is_stale: false,
        delta_pp: None,
        recent_deltas: Vec::new(),
        consecutive_failures: 0,
        last_error: None,
        last_success_age_secs: None,
        seconds_until_next_attempt: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::snapshot::RESET_TIME_NONE;

    #[test]
    fn one_shot_view_has_no_history() {
        let snap = QuotaSnapshot {
            used: 0.25,
            percentage: 25.0,
            reset_time: RESET_TIME_NONE.to_string(),
            timestamp: 0,
        };
        let view = one_shot_view(&snap);
        assert_eq!(view.percentage, Some(25.0));
        assert!(view.delta_pp.is_none());
        assert!(!view.is_stale);
    }
}
