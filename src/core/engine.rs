//! The quota refresh engine.
//!
//! A small state machine: `Idle -> Fetching -> {Success, Failure} -> Idle`.
//! At most one fetch is in flight; refresh requests arriving mid-fetch are
//! dropped, not queued. Failures never discard the last-known-good
//! snapshot, so presentation layers can keep showing stale data with the
//! error alongside.
//!
//! The engine owns all shared mutable state and exposes it to readers
//! only as a [`QuotaView`] copied out under the lock.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;

use crate::core::auth::AuthMethod;
use crate::core::credentials::Credentials;
use crate::core::http::QuotaClient;
use crate::core::snapshot::{self, QuotaSnapshot};
use crate::error::FwqError;

/// Length of one quota window: 5 hours.
pub const QUOTA_WINDOW_SECONDS: i64 = 5 * 60 * 60;

/// Tolerance when comparing inferred window starts. Jumps beyond this are
/// treated as a new quota window.
pub const WINDOW_JUMP_TOLERANCE_SECONDS: i64 = 60;

/// Delta at or below which a success with no reset time is treated as an
/// unannounced window reset.
pub const HEURISTIC_RESET_DELTA_PP: f64 = -10.0;

/// Capacity of the recent-delta ring.
pub const DELTA_HISTORY_CAPACITY: usize = 5;

/// One entry in the delta history ring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeltaSample {
    /// Percentage-point change versus the previous successful fetch.
    pub delta_pp: f64,
    /// Epoch seconds when the sample was captured.
    pub captured_at: i64,
}

/// Mutable engine state. Single logical owner (the engine); read by
/// presentation code via [`RefreshEngine::view`].
#[derive(Debug, Default)]
struct EngineState {
    fetching: bool,
    current: Option<QuotaSnapshot>,
    /// Retained across failures; never cleared by a failed fetch.
    last_good: Option<QuotaSnapshot>,
    last_error: Option<String>,
    prev_good_pct: f64,
    /// Delta of current success vs previous success, not vs previous
    /// poll attempt.
    last_delta_pp: f64,
    /// Inferred window start (`reset_time - 5h`); 0 until first known.
    last_window_start_utc: i64,
    last_window_reset_at: i64,
    delta_history: VecDeque<DeltaSample>,
    consecutive_failures: u32,
    last_success_at: i64,
    last_failure_at: i64,
    preferred_auth: Option<AuthMethod>,
}

impl EngineState {
    fn push_delta(&mut self, sample: DeltaSample) {
        if self.delta_history.len() == DELTA_HISTORY_CAPACITY {
            self.delta_history.pop_front();
        }
        self.delta_history.push_back(sample);
    }

    fn clear_delta_history(&mut self, now: i64) {
        self.delta_history.clear();
        self.last_window_reset_at = now;
    }
}

/// Read-only snapshot of engine state for presentation layers.
#[derive(Debug, Clone)]
pub struct QuotaView {
    /// Raw used fraction of the displayed snapshot.
    pub used: Option<f64>,
    /// Usage percentage of the displayed snapshot (last good when stale).
    pub percentage: Option<f64>,
    /// Reset time of the displayed snapshot (`"N/A"` sentinel preserved).
    pub reset_time: Option<String>,
    /// Capture time of the displayed snapshot.
    pub captured_at: Option<i64>,
    /// True when the most recent fetch failed but older data is shown.
    pub is_stale: bool,
    pub delta_pp: Option<f64>,
    /// Recent deltas, oldest first, at most [`DELTA_HISTORY_CAPACITY`].
    pub recent_deltas: Vec<DeltaSample>,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    pub last_success_age_secs: Option<i64>,
    /// Seconds until the driving loop's next fetch; 0 in one-shot mode.
    pub seconds_until_next_attempt: i64,
}

impl QuotaView {
    /// Whether there is anything to display at all.
    #[must_use]
    pub const fn has_data(&self) -> bool {
        self.percentage.is_some()
    }
}

/// Compute the inferred window start for a reset time: `reset - 5h`.
///
/// Returns `None` for the `"N/A"` sentinel, unparseable input, or a
/// nonsensical (non-positive) result.
#[must_use]
pub fn compute_window_start_utc(reset_time: &str) -> Option<i64> {
    let reset_utc = crate::util::time::parse_iso8601_utc_to_epoch(reset_time)?;
    let window_start = reset_utc - QUOTA_WINDOW_SECONDS;
    (window_start > 0).then_some(window_start)
}

/// The refresh engine. Cheap to clone; clones share state.
#[derive(Debug, Clone)]
pub struct RefreshEngine {
    state: Arc<Mutex<EngineState>>,
    client: QuotaClient,
    credentials: Arc<Mutex<Option<Credentials>>>,
    torn_down: Arc<AtomicBool>,
}

impl RefreshEngine {
    /// Create an engine in the idle start state.
    #[must_use]
    pub fn new(client: QuotaClient, credentials: Option<Credentials>) -> Self {
        Self {
            state: Arc::new(Mutex::new(EngineState::default())),
            client,
            credentials: Arc::new(Mutex::new(credentials)),
            torn_down: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Replace the credentials and drop the cached preferred auth method.
    pub fn reload_credentials(&self, credentials: Option<Credentials>) {
        *self.credentials.lock().expect("credentials lock") = credentials;
        self.state.lock().expect("engine lock").preferred_auth = None;
    }

    /// Mark the engine torn down. In-flight fetch completions arriving
    /// afterwards are discarded without touching state.
    pub fn teardown(&self) {
        self.torn_down.store(true, Ordering::SeqCst);
    }

    /// Whether teardown has begun.
    #[must_use]
    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }

    /// Run one refresh: resolve credentials, fetch with auth fallback,
    /// parse, and apply the result.
    ///
    /// Returns `false` when the request was dropped because a fetch was
    /// already in flight.
    pub async fn refresh(&self) -> bool {
        {
            let mut state = self.state.lock().expect("engine lock");
            if state.fetching {
                tracing::debug!("refresh request dropped: fetch already in flight");
                return false;
            }
            state.fetching = true;
            // Entering Fetching: a refresh attempt is in progress.
            state.last_error = None;
        }

        let credentials = self.credentials.lock().expect("credentials lock").clone();
        let Some(credentials) = credentials else {
            self.apply_failure(&FwqError::CredentialMissing);
            return true;
        };

        let preferred = self.state.lock().expect("engine lock").preferred_auth;
        let resolution = self
            .client
            .fetch_with_auth(&credentials.api_key, &credentials.token, preferred)
            .await;

        if self.is_torn_down() {
            tracing::debug!("fetch completed after teardown, discarding");
            return true;
        }

        if resolution.outcome.is_success() {
            match snapshot::parse_quota_body(&resolution.outcome.body) {
                Ok(snap) => self.apply_success(snap, resolution.used_method),
                Err(e) => self.apply_failure(&e),
            }
        } else {
            self.apply_failure(&resolution.outcome.into_error());
        }
        true
    }

    /// Apply a successful fetch. See the success-transition ordering in
    /// the module tests: window-reset detection runs before the delta is
    /// pushed, so a delta that itself signals a reset is retained as the
    /// first post-reset history entry.
    fn apply_success(&self, snap: QuotaSnapshot, used_method: Option<AuthMethod>) {
        let now = Utc::now().timestamp();
        let mut state = self.state.lock().expect("engine lock");
        state.fetching = false;

        // Detect a 5h window boundary and clear delta history on a jump.
        let window_start = compute_window_start_utc(&snap.reset_time);
        if let Some(ws) = window_start {
            if state.last_window_start_utc != 0
                && (ws - state.last_window_start_utc).abs() > WINDOW_JUMP_TOLERANCE_SECONDS
            {
                tracing::info!(
                    old_start = state.last_window_start_utc,
                    new_start = ws,
                    "quota window changed, clearing delta history"
                );
                state.clear_delta_history(now);
            }
            state.last_window_start_utc = ws;
        }

        let prev_pct = state
            .last_good
            .as_ref()
            .map_or(snap.percentage, |g| g.percentage);
        state.prev_good_pct = prev_pct;
        state.last_delta_pp = snap.percentage - prev_pct;

        // No reset time available: a large negative jump is treated as an
        // unannounced window reset.
        if window_start.is_none()
            && state.last_good.is_some()
            && state.last_delta_pp <= HEURISTIC_RESET_DELTA_PP
        {
            tracing::info!(
                delta_pp = state.last_delta_pp,
                "large usage drop without reset time, assuming window reset"
            );
            state.clear_delta_history(now);
        }

        // Push only after the reset handling above.
        let delta = state.last_delta_pp;
        state.push_delta(DeltaSample {
            delta_pp: delta,
            captured_at: now,
        });

        state.current = Some(snap.clone());
        state.last_good = Some(snap);
        state.last_success_at = now;
        state.consecutive_failures = 0;
        state.last_error = None;
        if used_method.is_some() {
            state.preferred_auth = used_method;
        }
    }

    /// Apply a failed fetch: record the error, leave last-good data alone.
    fn apply_failure(&self, error: &FwqError) {
        let now = Utc::now().timestamp();
        let message = error.to_string();
        tracing::warn!(error = %message, "quota fetch failed");

        let mut state = self.state.lock().expect("engine lock");
        state.fetching = false;
        state.last_error = Some(message);
        state.last_failure_at = now;
        state.consecutive_failures += 1;
    }

    /// Copy out the current view. `next_attempt_at` is the epoch second
    /// of the driving loop's next scheduled fetch, if any.
    #[must_use]
    pub fn view(&self, next_attempt_at: Option<i64>) -> QuotaView {
        let now = Utc::now().timestamp();
        let state = self.state.lock().expect("engine lock");

        let shown = state.last_good.as_ref().or(state.current.as_ref());
        let have_good = state.last_good.is_some();

        QuotaView {
            used: shown.map(|s| s.used),
            percentage: shown.map(|s| s.percentage),
            reset_time: shown.map(|s| s.reset_time.clone()),
            captured_at: shown.map(|s| s.timestamp),
            is_stale: state.last_error.is_some() && have_good,
            delta_pp: have_good.then_some(state.last_delta_pp),
            recent_deltas: state.delta_history.iter().copied().collect(),
            consecutive_failures: state.consecutive_failures,
            last_error: state.last_error.clone(),
            last_success_age_secs: (state.last_success_at > 0)
                .then(|| (now - state.last_success_at).max(0)),
            seconds_until_next_attempt: next_attempt_at.map_or(0, |at| (at - now).max(0)),
        }
    }

    /// The cached preferred auth method, if any.
    #[must_use]
    pub fn preferred_auth(&self) -> Option<AuthMethod> {
        self.state.lock().expect("engine lock").preferred_auth
    }

    /// The last snapshot applied by a successful fetch.
    #[must_use]
    pub fn last_good(&self) -> Option<QuotaSnapshot> {
        self.state.lock().expect("engine lock").last_good.clone()
    }
}
