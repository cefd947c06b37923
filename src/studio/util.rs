use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use sha2::{Digest, Sha256};
use std::time::SystemTime;

/// Current UTC time as RFC3339 with millisecond precision.
///
/// Fixed width, so stored values compare correctly as strings.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn now_rfc3339_nanos() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn system_time_rfc3339(at: SystemTime) -> String {
    DateTime::<Utc>::from(at).to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn is_iso_date(raw: &str) -> bool {
    raw.len() == 10 && NaiveDate::parse_from_str(raw, "%Y-%m-%d").is_ok()
}

/// Truncate `input` (trimmed) to at most `limit` characters, ending with `…`
/// when something was cut.
pub fn truncate_with_ellipsis(input: &str, limit: usize) -> String {
    let trimmed = input.trim();
    if trimmed.chars().count() <= limit {
        return trimmed.to_string();
    }
    if limit <= 1 {
        return trimmed.chars().take(limit).collect();
    }
    let mut out: String = trimmed.chars().take(limit - 1).collect();
    out.push('…');
    out
}

/// Cut to at most `max_bytes` without splitting a character.
pub fn clamp_bytes(input: &str, max_bytes: usize) -> &str {
    if input.len() <= max_bytes {
        return input;
    }
    let mut end = max_bytes;
    while !input.is_char_boundary(end) {
        end -= 1;
    }
    &input[..end]
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_input() {
        assert_eq!(truncate_with_ellipsis("  hello ", 10), "hello");
    }

    #[test]
    fn truncate_marks_cut_within_limit() {
        let out = truncate_with_ellipsis("abcdefghij", 5);
        assert_eq!(out, "abcd…");
        assert_eq!(out.chars().count(), 5);
    }

    #[test]
    fn clamp_bytes_respects_char_boundaries() {
        assert_eq!(clamp_bytes("日記日記", 4), "日");
        assert_eq!(clamp_bytes("abc", 10), "abc");
    }

    #[test]
    fn iso_date_validation() {
        assert!(is_iso_date("2026-02-20"));
        assert!(!is_iso_date("2026-02-30"));
        assert!(!is_iso_date("20260220"));
    }
}
