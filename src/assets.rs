const DIARY_PROMPT: &str = include_str!("../assets/diary-prompt.md");

/// The first builtin default shipped to users. A builtin `default` template
/// still holding exactly this text is replaced by the bundled one.
pub const LEGACY_MINIMAL_PROMPT: &str = "You are a persistent artificial operational system writing a daily journal entry.

[TODAY_STRUCTURED_SUMMARY]

[OPTIONAL: RECENT MEMORY EXCERPT]

[ROLE_DEFINITION]

[INSIGHT_PROMPT]

Output a concise, truthful journal entry based only on observed signals.";

pub fn bundled_diary_prompt() -> &'static str {
    DIARY_PROMPT.trim()
}
