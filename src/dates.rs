// src/dates.rs
//! Date handling for the feed: strict filter validation, the default
//! trailing window, tolerant timestamp parsing, and display formatting.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;

/// Trailing window applied when caller-supplied filter dates are unusable.
pub const DEFAULT_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DateWindow {
    pub start: String,
    pub end: String,
}

fn ymd_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("ymd regex"))
}

/// Strict `YYYY-MM-DD` check: shape and calendar validity.
pub fn is_strict_ymd(s: &str) -> bool {
    ymd_re().is_match(s) && NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

/// Trailing 30-day window ending today (UTC).
pub fn default_window() -> DateWindow {
    let end = Utc::now().date_naive();
    let start = end - Duration::days(DEFAULT_WINDOW_DAYS);
    DateWindow {
        start: start.format("%Y-%m-%d").to_string(),
        end: end.format("%Y-%m-%d").to_string(),
    }
}

/// Validate a caller-supplied window, silently falling back to the default
/// trailing window when either bound fails the strict format check. This is
/// a correcting filter, not an error path.
pub fn validated_window(start: Option<&str>, end: Option<&str>) -> DateWindow {
    match (start, end) {
        (Some(s), Some(e)) if is_strict_ymd(s) && is_strict_ymd(e) => DateWindow {
            start: s.to_string(),
            end: e.to_string(),
        },
        _ => default_window(),
    }
}

/// Tolerant parse of an announcement timestamp to epoch milliseconds.
/// Accepts RFC 3339 and the common bare shapes upstream emits.
pub fn parse_flexible_ms(s: &str) -> Option<i64> {
    let t = s.trim();
    if t.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(t) {
        return Some(dt.with_timezone(&Utc).timestamp_millis());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(t, fmt) {
            return Some(Utc.from_utc_datetime(&naive).timestamp_millis());
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(t, "%Y-%m-%d") {
        let naive = d.and_hms_opt(0, 0, 0)?;
        return Some(Utc.from_utc_datetime(&naive).timestamp_millis());
    }
    None
}

/// Render a timestamp as a long-form date + time for display. Unparseable
/// input comes back unchanged, never blank.
pub fn format_date(s: &str) -> String {
    match parse_flexible_ms(s).and_then(|ms| Utc.timestamp_millis_opt(ms).single()) {
        Some(dt) => dt
            .format("%B %e, %Y %l:%M %p")
            .to_string()
            .replace("  ", " "),
        None => s.to_string(),
    }
}

/// Current wall-clock time as epoch milliseconds.
pub fn now_epoch_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}
