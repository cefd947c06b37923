use crate::error::{StudioError, StudioResult};
use crate::studio::util::is_iso_date;
use serde::Serialize;

pub const MAX_SUMMARY_CHARS: usize = 5000;
pub const MAX_PERSONA_TEXT_CHARS: usize = 200_000;
pub const MAX_EXECUTION_LEVEL: u8 = 4;

const EMPTY_SUMMARY: &str = "(empty diary file)";

/// Body of a runtime diary upsert.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeUpsertPayload {
    pub summary: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub persona_text: String,
    pub execution_level: u8,
    pub diary_date: String,
}

pub fn build_payload(
    content: &str,
    diary_date: &str,
    execution_level: i64,
) -> StudioResult<RuntimeUpsertPayload> {
    let date = diary_date.trim();
    if !is_iso_date(date) {
        return Err(StudioError::validation(format!(
            "invalid diary date \"{date}\""
        )));
    }

    let summary = first_summary_line(content).unwrap_or(EMPTY_SUMMARY);

    Ok(RuntimeUpsertPayload {
        summary: take_chars(summary, MAX_SUMMARY_CHARS),
        persona_text: take_chars(content, MAX_PERSONA_TEXT_CHARS),
        execution_level: execution_level.clamp(0, MAX_EXECUTION_LEVEL as i64) as u8,
        diary_date: date.to_string(),
    })
}

fn first_summary_line(content: &str) -> Option<&str> {
    content
        .lines()
        .map(|raw| {
            raw.trim()
                .trim_start_matches('#')
                .trim()
                .trim_start_matches(|c: char| matches!(c, '-' | '*' | '.' | ' ') || c.is_ascii_digit())
                .trim()
        })
        .find(|line| !line.is_empty())
}

fn take_chars(input: &str, max: usize) -> String {
    match input.char_indices().nth(max) {
        Some((end, _)) => input[..end].to_string(),
        None => input.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_strips_heading_and_list_markers() {
        let payload = build_payload("\n## 1. Shipped the index\nrest\n", "2026-02-20", 0)
            .expect("payload");
        assert_eq!(payload.summary, "Shipped the index");
        assert_eq!(payload.persona_text, "\n## 1. Shipped the index\nrest\n");
    }

    #[test]
    fn blank_content_gets_placeholder_summary() {
        let payload = build_payload("  \n\n", "2026-02-20", 0).expect("payload");
        assert_eq!(payload.summary, EMPTY_SUMMARY);
    }

    #[test]
    fn execution_level_is_clamped() {
        assert_eq!(build_payload("x", "2026-02-20", -3).expect("low").execution_level, 0);
        assert_eq!(build_payload("x", "2026-02-20", 9).expect("high").execution_level, 4);
    }

    #[test]
    fn long_fields_are_capped_by_chars() {
        let body = "日".repeat(MAX_SUMMARY_CHARS + 10);
        let payload = build_payload(&body, "2026-02-20", 0).expect("payload");
        assert_eq!(payload.summary.chars().count(), MAX_SUMMARY_CHARS);
    }

    #[test]
    fn invalid_date_is_rejected() {
        let err = build_payload("x", "2026-02-30", 0).expect_err("bad date");
        assert!(matches!(err, StudioError::Validation(_)));
    }

    #[test]
    fn wire_shape_is_camel_case() {
        let payload = build_payload("hello", "2026-02-20", 1).expect("payload");
        let value = serde_json::to_value(&payload).expect("serialize");
        assert_eq!(value["personaText"], "hello");
        assert_eq!(value["executionLevel"], 1);
        assert_eq!(value["diaryDate"], "2026-02-20");
    }
}
