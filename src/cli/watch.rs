//! Continuous watch mode.
//!
//! Two tickers drive the loop: a fetch ticker at the configured interval
//! and a 1s UI ticker that only re-renders the countdown. Fetches run in
//! spawned tasks; the engine drops refresh requests that arrive while one
//! is still in flight. Ctrl-c tears the engine down so a late fetch
//! completion cannot touch state after the loop exits.

use std::io::Write;
use std::time::Duration;

use chrono::Utc;
use tokio::time::MissedTickBehavior;

use crate::cli::args::WatchArgs;
use crate::core::credentials;
use crate::core::engine::RefreshEngine;
use crate::core::http::{DEFAULT_TIMEOUT, QuotaClient};
use crate::error::Result;
use crate::render::{RenderOptions, render_view};
use crate::storage::paths::AppPaths;
use crate::storage::quota_log::QuotaLog;

/// Run the watch loop until ctrl-c.
///
/// # Errors
///
/// Returns an error only for setup failures (client construction); fetch
/// failures are displayed, not fatal.
pub async fn run(args: &WatchArgs, no_color: bool) -> Result<()> {
    let credentials = credentials::resolve(args.quota.api_key.as_deref());
    if credentials.is_none() {
        // Surface immediately instead of printing the same failure every
        // tick with no way to recover.
        tracing::warn!("no API key configured, every fetch will fail");
    }

    let client = QuotaClient::with_endpoint(&args.quota.endpoint, DEFAULT_TIMEOUT)?;
    let endpoint = client.endpoint().to_string();
    let engine = RefreshEngine::new(client, credentials);

    let log = args.quota.log.as_ref().map(|path| {
        if path.as_os_str().is_empty() {
            QuotaLog::new(AppPaths::new().quota_log_file())
        } else {
            QuotaLog::new(path.clone())
        }
    });

    let interval_secs = args.interval_secs();
    let opts = RenderOptions::detect(no_color, args.quota.text);
    let clear_frames = atty::is(atty::Stream::Stdout) && !args.quota.text;

    tracing::info!(interval_secs, endpoint = %endpoint, "watch started");

    let mut fetch_tick = tokio::time::interval(Duration::from_secs(interval_secs));
    fetch_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut ui_tick = tokio::time::interval(Duration::from_secs(1));
    ui_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    #[allow(clippy::cast_possible_wrap)]
    let interval_i64 = interval_secs as i64;
    let mut next_attempt_at = Utc::now().timestamp();

    loop {
        tokio::select! {
            _ = fetch_tick.tick() => {
                next_attempt_at = Utc::now().timestamp() + interval_i64;
                spawn_refresh(&engine, log.clone());
            }
            _ = ui_tick.tick() => {
                render_frame(&engine, &opts, next_attempt_at, clear_frames);
            }
            _ = &mut ctrl_c => {
                tracing::info!("shutdown requested");
                engine.teardown();
                break;
            }
        }
    }

    if clear_frames {
        println!();
    }
    Ok(())
}

/// Kick off a refresh without blocking the UI ticker. On success, append
/// the new snapshot to the CSV log.
fn spawn_refresh(engine: &RefreshEngine, log: Option<QuotaLog>) {
    let engine = engine.clone();
    tokio::spawn(async move {
        let before = engine.last_good().map(|s| s.timestamp);
        if !engine.refresh().await {
            return;
        }
        if engine.is_torn_down() {
            return;
        }

        let Some(log) = log else { return };
        let Some(snap) = engine.last_good() else { return };
        // Only log when this refresh actually produced a new snapshot.
        if before == Some(snap.timestamp) {
            return;
        }
        if let Err(e) = log.record(&snap) {
            tracing::warn!(error = %e, "failed to append quota log row");
        }
    });
}

/// Draw one frame. In TTY mode the screen is cleared so the frame
/// repaints in place; otherwise frames append like a log.
fn render_frame(engine: &RefreshEngine, opts: &RenderOptions, next_attempt_at: i64, clear: bool) {
    let now = Utc::now().timestamp();
    let view = engine.view(Some(next_attempt_at));

    let mut frame = render_view(&view, opts, now);
    frame.push_str(&format!(
        "Next fetch in {}\n",
        crate::util::time::format_duration_tight(view.seconds_until_next_attempt)
    ));

    let mut stdout = std::io::stdout();
    if clear {
        use crossterm::{cursor::MoveTo, execute, terminal::{Clear, ClearType}};
        let _ = execute!(stdout, Clear(ClearType::All), MoveTo(0, 0));
    }
    let _ = stdout.write_all(frame.as_bytes());
    let _ = stdout.flush();
}
