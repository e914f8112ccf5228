//! Display formatting for numbers and backend timestamps.

use chrono::{DateTime, Local, NaiveDateTime};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Group digits in thousands: `1234567` becomes `1,234,567`.
pub fn thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Thousands-grouped number with up to two decimals, trailing zeros dropped.
pub fn number(value: f64) -> String {
    if !value.is_finite() {
        return "-".to_string();
    }
    let sign = if value < 0.0 { "-" } else { "" };
    let cents_total = (value.abs() * 100.0).round() as u64;
    let whole = cents_total / 100;
    let cents = cents_total % 100;
    match cents {
        0 => format!("{}{}", sign, thousands(whole)),
        c if c % 10 == 0 => format!("{}{}.{}", sign, thousands(whole), c / 10),
        c => format!("{}{}.{:02}", sign, thousands(whole), c),
    }
}

/// Seconds with two decimals: `12.345` becomes `12.35s`.
pub fn seconds(value: f64) -> String {
    format!("{:.2}s", value)
}

/// Render a backend timestamp in local time.
///
/// Zoned timestamps (RFC 3339) are converted to the local zone. Naive
/// timestamps are already local to the backend and are shown as-is. Empty
/// input renders as `-`; anything unparseable is returned unchanged.
pub fn local_time(timestamp: &str) -> String {
    let timestamp = timestamp.trim();
    if timestamp.is_empty() {
        return "-".to_string();
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(timestamp) {
        return dt.with_timezone(&Local).format(TIME_FORMAT).to_string();
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(timestamp, pattern) {
            return dt.format(TIME_FORMAT).to_string();
        }
    }
    timestamp.to_string()
}

/// Cut `text` to `width` characters, ending with `…` when shortened.
pub fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let mut out: String = text.chars().take(width - 1).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thousands() {
        assert_eq!(thousands(0), "0");
        assert_eq!(thousands(999), "999");
        assert_eq!(thousands(1000), "1,000");
        assert_eq!(thousands(1234567), "1,234,567");
    }

    #[test]
    fn test_number() {
        assert_eq!(number(1234.5), "1,234.5");
        assert_eq!(number(1234.567), "1,234.57");
        assert_eq!(number(42.0), "42");
        assert_eq!(number(-0.25), "-0.25");
        assert_eq!(number(f64::NAN), "-");
    }

    #[test]
    fn test_seconds() {
        assert_eq!(seconds(12.345), "12.35s");
        assert_eq!(seconds(0.0), "0.00s");
    }

    #[test]
    fn test_naive_timestamps_are_kept() {
        assert_eq!(local_time("2025-02-01T10:00:00.123456"), "2025-02-01 10:00:00");
        assert_eq!(local_time("2025-02-01 10:00:00"), "2025-02-01 10:00:00");
    }

    #[test]
    fn test_zoned_timestamps_are_converted() {
        let expected = DateTime::parse_from_rfc3339("2025-02-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Local)
            .format(TIME_FORMAT)
            .to_string();
        assert_eq!(local_time("2025-02-01T00:00:00Z"), expected);
    }

    #[test]
    fn test_unparseable_and_empty() {
        assert_eq!(local_time(""), "-");
        assert_eq!(local_time("yesterday"), "yesterday");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("select 1", 20), "select 1");
        assert_eq!(truncate("select * from orders", 10), "select * …");
    }
}
