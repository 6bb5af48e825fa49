//! Human-readable time formatting

/// `MM:SS`, or `HH:MM:SS` once an hour is reached
pub fn format_time(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}

/// Duration for history listings, e.g. `1時間2分3秒`
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{}時間{}分{}秒", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}分{}秒", minutes, secs)
    } else {
        format!("{}秒", secs)
    }
}

/// Preset button label, e.g. `30秒`, `5分`, `1分30秒`
pub fn format_preset_time(seconds: u64) -> String {
    if seconds < 60 {
        return format!("{}秒", seconds);
    }
    let minutes = seconds / 60;
    let rest = seconds % 60;
    if rest == 0 {
        format!("{}分", minutes)
    } else {
        format!("{}分{}秒", minutes, rest)
    }
}
