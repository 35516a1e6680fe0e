//! Reusable formatting utilities for CLI output
//!
//! Timestamps, ages, sizes and delays shared by the table views.

use std::time::Duration;

use chrono::{DateTime, Local, Utc};

/// Format a server timestamp in local time.
///
/// Returns "N/A" when the server did not send one.
///
/// # Example output
/// `2025-01-15 14:30`
pub fn format_datetime_local(dt: Option<&DateTime<Utc>>) -> String {
    match dt {
        Some(dt) => dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
        None => "N/A".to_string(),
    }
}

/// Format a Unix timestamp (seconds) in local time
pub fn format_unix_local(secs: i64) -> String {
    format_datetime_local(DateTime::from_timestamp(secs, 0).as_ref())
}

/// Short age relative to `now`, falling back to the date after a week.
///
/// # Example output
/// - `just now`
/// - `5m ago`
/// - `3h ago`
/// - `2d ago`
pub fn format_age(dt: Option<&DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(dt) = dt else {
        return "N/A".to_string();
    };
    let elapsed = now.signed_duration_since(*dt);
    if elapsed.num_seconds() < 60 {
        "just now".to_string()
    } else if elapsed.num_minutes() < 60 {
        format!("{}m ago", elapsed.num_minutes())
    } else if elapsed.num_hours() < 24 {
        format!("{}h ago", elapsed.num_hours())
    } else if elapsed.num_days() < 7 {
        format!("{}d ago", elapsed.num_days())
    } else {
        dt.format("%Y-%m-%d").to_string()
    }
}

/// Format bytes as human-readable size
pub fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;
    const GB: usize = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

/// Format a delay such as a reconnect backoff.
///
/// # Example output
/// - `750ms`
/// - `2.25s`
/// - `2m 5s`
pub fn format_delay(delay: Duration) -> String {
    let millis = delay.as_millis();
    if millis < 1000 {
        format!("{}ms", millis)
    } else if millis < 60_000 {
        let secs = format!("{:.2}", delay.as_secs_f64());
        format!("{}s", secs.trim_end_matches('0').trim_end_matches('.'))
    } else {
        let secs = delay.as_secs();
        format!("{}m {}s", secs / 60, secs % 60)
    }
}

/// Truncate to `max_chars` characters, ending with an ellipsis when cut
pub fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let kept: String = s.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{}…", kept.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, h, m, s).unwrap()
    }

    #[test]
    fn test_format_datetime_local() {
        let dt = at(12, 0, 0);
        // Exact output depends on the local timezone
        assert!(format_datetime_local(Some(&dt)).starts_with("2025-01-1"));
        assert_eq!(format_datetime_local(None), "N/A");
    }

    #[test]
    fn test_format_unix_local() {
        assert!(format_unix_local(1736942400).starts_with("2025-01-1"));
    }

    #[test]
    fn test_format_age() {
        let now = at(12, 0, 0);
        assert_eq!(format_age(Some(&at(11, 59, 30)), now), "just now");
        assert_eq!(format_age(Some(&at(11, 55, 0)), now), "5m ago");
        assert_eq!(format_age(Some(&at(9, 0, 0)), now), "3h ago");
        let two_days = Utc.with_ymd_and_hms(2025, 1, 13, 12, 0, 0).unwrap();
        assert_eq!(format_age(Some(&two_days), now), "2d ago");
        let old = Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap();
        assert_eq!(format_age(Some(&old), now), "2024-12-01");
        assert_eq!(format_age(None, now), "N/A");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 bytes");
        assert_eq!(format_bytes(10 * 1024), "10.00 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024 / 2), "1.50 MB");
    }

    #[test]
    fn test_format_delay() {
        assert_eq!(format_delay(Duration::from_millis(750)), "750ms");
        assert_eq!(format_delay(Duration::from_millis(2250)), "2.25s");
        assert_eq!(format_delay(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_delay(Duration::from_secs(1)), "1s");
        assert_eq!(format_delay(Duration::from_secs(125)), "2m 5s");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a long article title", 8), "a long…");
        assert_eq!(truncate("héllo wörld", 6), "héllo…");
    }
}
