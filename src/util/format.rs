//! Number and string formatting utilities.

/// Format a usage percentage for display (two decimals).
#[must_use]
pub fn format_percent(value: f64) -> String {
    format!("{value:.2}%")
}

/// Clamp a percentage to the renderable [0, 100] range.
///
/// Storage keeps the raw value; only display clamps.
#[must_use]
pub fn clamp_percent(value: f64) -> f64 {
    value.clamp(0.0, 100.0)
}

/// Truncate a string for display, appending `...` when cut.
#[must_use]
pub fn truncate_for_display(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}
