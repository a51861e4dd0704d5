use chrono::{Days, NaiveDateTime};

const SIZE_UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

/// Escapes text for placement inside markup.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Base-1024 size with at most two decimals, e.g. `1.5 KB`.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return String::from("0 Bytes");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let fixed = format!("{value:.2}");
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed} {}", SIZE_UNITS[unit])
}

/// Conversation-list timestamp: time today, `Yesterday`, otherwise the date.
pub fn format_message_time(at: NaiveDateTime, now: NaiveDateTime) -> String {
    let day = at.date();
    if day == now.date() {
        return at.format("%H:%M").to_string();
    }
    if now.date().checked_sub_days(Days::new(1)) == Some(day) {
        return String::from("Yesterday");
    }
    at.format("%m/%d/%Y").to_string()
}
