//! Terminal presentation of the quota view.
//!
//! Pure consumers of [`QuotaView`]: nothing here touches network or
//! engine state. Bars scale to the terminal width (clamped 20..=50
//! columns) and fall back to ASCII when the locale is not UTF-8.

use colored::Colorize;

use crate::core::engine::{QUOTA_WINDOW_SECONDS, QuotaView};
use crate::core::snapshot::RESET_TIME_NONE;
use crate::util::format::{clamp_percent, format_percent};
use crate::util::time::{format_duration_compact, format_timestamp_local, parse_iso8601_utc_to_epoch};

/// Render options derived from terminal environment and CLI flags.
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    pub use_colors: bool,
    pub text_mode: bool,
    pub terminal_width: usize,
}

impl RenderOptions {
    /// Detect terminal properties, honoring `--no-color` and `--text`.
    #[must_use]
    pub fn detect(no_color: bool, text_mode: bool) -> Self {
        let use_colors = !no_color && atty::is(atty::Stream::Stdout);
        let terminal_width = crossterm::terminal::size()
            .map_or(80, |(cols, _)| usize::from(cols).max(20));
        Self {
            use_colors,
            text_mode,
            terminal_width,
        }
    }
}

/// Whether the locale advertises UTF-8 support.
fn is_utf8_locale() -> bool {
    ["LC_ALL", "LC_CTYPE", "LANG"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .any(|v| {
            let lower = v.to_lowercase();
            lower.contains("utf-8") || lower.contains("utf8")
        })
}

/// Color a string by usage severity: green below 50, yellow below 80,
/// red above.
fn colorize_by_usage(s: &str, percentage: f64, use_colors: bool) -> String {
    if !use_colors {
        return s.to_string();
    }
    if percentage < 50.0 {
        s.green().to_string()
    } else if percentage < 80.0 {
        s.yellow().to_string()
    } else {
        s.red().to_string()
    }
}

fn bar_width(terminal_width: usize, fixed_width: usize) -> usize {
    terminal_width.saturating_sub(fixed_width).clamp(20, 50)
}

fn bar_cells(fraction: f64, width: usize) -> (usize, usize) {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let filled = ((fraction.clamp(0.0, 1.0)) * width as f64) as usize;
    let filled = filled.min(width);
    (filled, width - filled)
}

/// Render the usage progress bar line.
#[must_use]
pub fn render_usage_bar(percentage: f64, opts: &RenderOptions) -> String {
    let shown = clamp_percent(percentage);
    let width = bar_width(opts.terminal_width, 17);
    let (filled, empty) = bar_cells(shown / 100.0, width);

    let (fill_char, empty_char) = if is_utf8_locale() {
        ("█", "░")
    } else {
        ("#", "-")
    };

    let bar = format!("{}{}", fill_char.repeat(filled), empty_char.repeat(empty));
    format!(
        "Usage: [{}] {}",
        colorize_by_usage(&bar, shown, opts.use_colors),
        format_percent(percentage)
    )
}

/// Render the reset-countdown bar line: full when the whole 5h window
/// remains, empty at the boundary. Colors run the other way (low time
/// left reads as red).
#[must_use]
pub fn render_reset_bar(remaining_secs: i64, opts: &RenderOptions) -> String {
    let remaining = remaining_secs.max(0);
    let for_bar = remaining.min(QUOTA_WINDOW_SECONDS);
    #[allow(clippy::cast_precision_loss)]
    let remaining_fraction = for_bar as f64 / QUOTA_WINDOW_SECONDS as f64;

    let width = bar_width(opts.terminal_width, 34);
    let (filled, empty) = bar_cells(remaining_fraction, width);

    let (fill_char, empty_char) = if is_utf8_locale() {
        ("█", "░")
    } else {
        ("#", "-")
    };

    let bar = format!("{}{}", fill_char.repeat(filled), empty_char.repeat(empty));
    let approaching_pct = 100.0 - remaining_fraction * 100.0;
    format!(
        "Reset: [{}] {} left (of 5h)",
        colorize_by_usage(&bar, approaching_pct, opts.use_colors),
        format_duration_compact(remaining)
    )
}

/// Render a full frame from the engine view.
#[must_use]
pub fn render_view(view: &QuotaView, opts: &RenderOptions, now_epoch: i64) -> String {
    let mut out = String::new();
    out.push_str("Firmware API Quota\n");
    out.push_str("==================\n");

    let Some(percentage) = view.percentage else {
        // No data ever fetched: show the error, never a fabricated zero.
        let detail = view
            .last_error
            .as_deref()
            .unwrap_or("no data yet (first fetch pending)");
        out.push_str(&format!("No quota data: {detail}\n"));
        return out;
    };

    let stale_suffix = if view.is_stale { " (stale)" } else { "" };

    if opts.text_mode {
        let used = view.used.unwrap_or(percentage / 100.0);
        out.push_str(&format!(
            "Used: {} ({used:.4}){stale_suffix}\n",
            format_percent(percentage)
        ));
    } else {
        out.push_str(&render_usage_bar(percentage, opts));
        out.push_str(stale_suffix);
        out.push('\n');
    }

    if let Some(delta) = view.delta_pp {
        out.push_str(&format!("Delta: {delta:+.1}pp"));
        if !view.recent_deltas.is_empty() {
            let history: Vec<String> = view
                .recent_deltas
                .iter()
                .map(|d| format!("{:+.1}", d.delta_pp))
                .collect();
            out.push_str(&format!("  [recent: {}]", history.join(" ")));
        }
        out.push('\n');
    }

    match view.reset_time.as_deref() {
        Some(reset) if reset != RESET_TIME_NONE => {
            if let Some(reset_utc) = parse_iso8601_utc_to_epoch(reset) {
                let remaining = reset_utc - now_epoch;
                if opts.text_mode {
                    out.push_str(&format!(
                        "Reset in: {} (of 5h)\n",
                        format_duration_compact(remaining.max(0))
                    ));
                } else {
                    out.push_str(&render_reset_bar(remaining, opts));
                    out.push('\n');
                }
                out.push_str(&format!("Resets at: {}\n", format_timestamp_local(reset)));
            } else {
                out.push_str(&format!("Reset: {}\n", format_timestamp_local(reset)));
            }
        }
        _ => {
            out.push_str("Reset: No active window (quota not used recently)\n");
        }
    }

    if let Some(age) = view.last_success_age_secs {
        if view.is_stale {
            out.push_str(&format!(
                "Last success: {} ago ({} consecutive failures)\n",
                format_duration_compact(age),
                view.consecutive_failures
            ));
        }
    }

    if let Some(error) = &view.last_error {
        let line = format!("Error: {error}");
        if opts.use_colors {
            out.push_str(&line.red().to_string());
        } else {
            out.push_str(&line);
        }
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::engine::DeltaSample;

    fn plain_opts() -> RenderOptions {
        RenderOptions {
            use_colors: false,
            text_mode: false,
            terminal_width: 80,
        }
    }

    fn view_with(percentage: f64) -> QuotaView {
        QuotaView {
            used: Some(percentage / 100.0),
            percentage: Some(percentage),
            reset_time: Some(RESET_TIME_NONE.to_string()),
            captured_at: Some(0),
            is_stale: false,
            delta_pp: Some(0.0),
            recent_deltas: vec![],
            consecutive_failures: 0,
            last_error: None,
            last_success_age_secs: Some(0),
            seconds_until_next_attempt: 0,
        }
    }

    #[test]
    fn usage_bar_contains_percentage() {
        let line = render_usage_bar(42.0, &plain_opts());
        assert!(line.starts_with("Usage: ["));
        assert!(line.ends_with("] 42.00%"));
    }

    #[test]
    fn usage_bar_clamps_overrange_fill() {
        // Display clamps; the printed number stays raw.
        let line = render_usage_bar(125.0, &plain_opts());
        assert!(line.contains("125.00%"));
    }

    #[test]
    fn reset_bar_shows_remaining() {
        let line = render_reset_bar(2 * 3600, &plain_opts());
        assert!(line.contains("2h 0m left (of 5h)"));
    }

    #[test]
    fn reset_bar_clamps_negative_remaining() {
        let line = render_reset_bar(-30, &plain_opts());
        assert!(line.contains("0s left"));
    }

    #[test]
    fn no_data_view_shows_error_not_zero() {
        let view = QuotaView {
            used: None,
            percentage: None,
            reset_time: None,
            captured_at: None,
            is_stale: false,
            delta_pp: None,
            recent_deltas: vec![],
            consecutive_failures: 3,
            last_error: Some("request failed: dns".to_string()),
            last_success_age_secs: None,
            seconds_until_next_attempt: 0,
        };
        let out = render_view(&view, &plain_opts(), 0);
        assert!(out.contains("No quota data: request failed: dns"));
        assert!(!out.contains('%'));
    }

    #[test]
    fn stale_view_shows_last_good_with_marker() {
        let mut view = view_with(64.0);
        view.is_stale = true;
        view.last_error = Some("HTTP error: 503".to_string());
        view.consecutive_failures = 2;
        view.last_success_age_secs = Some(90);

        let out = render_view(&view, &plain_opts(), 0);
        assert!(out.contains("64.00%"));
        assert!(out.contains("(stale)"));
        assert!(out.contains("Error: HTTP error: 503"));
        assert!(out.contains("2 consecutive failures"));
    }

    #[test]
    fn delta_history_is_rendered_oldest_first() {
        let mut view = view_with(30.0);
        view.delta_pp = Some(4.0);
        view.recent_deltas = vec![
            DeltaSample {
                delta_pp: 1.5,
                captured_at: 1,
            },
            DeltaSample {
                delta_pp: -2.0,
                captured_at: 2,
            },
            DeltaSample {
                delta_pp: 4.0,
                captured_at: 3,
            },
        ];

        let out = render_view(&view, &plain_opts(), 0);
        assert!(out.contains("Delta: +4.0pp"));
        assert!(out.contains("[recent: +1.5 -2.0 +4.0]"));
    }

    #[test]
    fn text_mode_skips_bars() {
        let mut view = view_with(12.5);
        view.reset_time = Some("2025-01-01T10:00:00Z".to_string());
        let opts = RenderOptions {
            text_mode: true,
            ..plain_opts()
        };

        let reset_epoch = parse_iso8601_utc_to_epoch("2025-01-01T10:00:00Z").unwrap();
        let out = render_view(&view, &opts, reset_epoch - 3600);
        assert!(out.contains("Used: 12.50% (0.1250)"));
        assert!(out.contains("Reset in: 1h 0m (of 5h)"));
        assert!(!out.contains("Usage: ["));
    }

    #[test]
    fn missing_reset_window_message() {
        let out = render_view(&view_with(5.0), &plain_opts(), 0);
        assert!(out.contains("No active window"));
    }
}
