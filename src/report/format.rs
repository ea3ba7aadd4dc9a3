//! Display formatting for byte sizes and timestamps.

use chrono::{Local, TimeZone, Utc};

/// Pattern used for every rendered timestamp.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const BYTE_UNITS: [&str; 7] = ["B", "kB", "MB", "GB", "TB", "PB", "EB"];

/// Time zone used when rendering timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeZoneMode {
    #[default]
    Local,
    Utc,
}

/// Human-readable byte size in decimal units with three significant digits.
///
/// `999` -> `"999 B"`, `1000` -> `"1 kB"`, `1536` -> `"1.54 kB"`.
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1000 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1000.0 && unit < BYTE_UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }

    let decimals = if value >= 100.0 {
        0
    } else if value >= 10.0 {
        1
    } else {
        2
    };

    let mut number = format!("{:.*}", decimals, value);
    if number.contains('.') {
        number = number.trim_end_matches('0').trim_end_matches('.').to_string();
    }

    format!("{} {}", number, BYTE_UNITS[unit])
}

/// Render epoch seconds as `YYYY-MM-DD HH:MM:SS`.
///
/// Values chrono cannot represent are rendered as the raw number.
pub fn format_timestamp(timestamp: i64, mode: TimeZoneMode) -> String {
    let formatted = match mode {
        TimeZoneMode::Local => Local
            .timestamp_opt(timestamp, 0)
            .earliest()
            .map(|dt| dt.format(TIMESTAMP_FORMAT).to_string()),
        TimeZoneMode::Utc => Utc
            .timestamp_opt(timestamp, 0)
            .single()
            .map(|dt| dt.format(TIMESTAMP_FORMAT).to_string()),
    };

    formatted.unwrap_or_else(|| timestamp.to_string())
}
