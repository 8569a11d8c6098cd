const URGENT_BELOW_SECS: i64 = 60;

/// Elapsed-time display, `HH:MM:SS`.
pub fn format_clock(total_seconds: i64) -> String {
    let secs = total_seconds.max(0);
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Remaining-time display, `MM:SS`. Minutes are not wrapped at an hour.
pub fn format_countdown(remaining_seconds: i64) -> String {
    let secs = remaining_seconds.max(0);
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

pub fn is_urgent(remaining_seconds: i64) -> bool {
    remaining_seconds.max(0) < URGENT_BELOW_SECS
}
