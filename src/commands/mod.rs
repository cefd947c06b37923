pub mod history;
pub mod list;
pub mod prompt;
pub mod reindex;
pub mod save;
pub mod set_default;
pub mod settings;
pub mod show;
pub mod status;
pub mod sync;

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;

use crate::studio::model::DiarySummary;

#[derive(Debug, Clone, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub ok: bool,
    pub details: Vec<String>,
    pub issues: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl CommandReport {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ok: true,
            details: Vec::new(),
            issues: Vec::new(),
            data: None,
        }
    }

    pub fn detail(&mut self, text: impl Into<String>) {
        self.details.push(text.into());
    }

    pub fn issue(&mut self, text: impl Into<String>) {
        self.ok = false;
        self.issues.push(text.into());
    }

    pub fn set_data(&mut self, data: &impl Serialize) -> Result<()> {
        self.data = Some(serde_json::to_value(data)?);
        Ok(())
    }
}

/// One listing line: `id date flags title`.
pub fn summary_line(item: &DiarySummary) -> String {
    let mut flags = Vec::new();
    if item.is_default {
        flags.push("default");
    }
    if item.can_sync {
        flags.push("can-sync");
    }
    format!(
        "{} date={} [{}] {}",
        item.id,
        item.date.as_deref().unwrap_or("-"),
        flags.join(","),
        item.title
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_marks_report_failed() {
        let mut report = CommandReport::new("sync");
        report.issue("SYNC_DISABLED: blocked");
        assert!(!report.ok);
        assert_eq!(report.issues, vec!["SYNC_DISABLED: blocked".to_string()]);
    }

    #[test]
    fn data_is_omitted_until_set() {
        let mut report = CommandReport::new("list");
        let raw = serde_json::to_value(&report).expect("serialize");
        assert!(raw.get("data").is_none());
        report.set_data(&vec![1, 2]).expect("set data");
        assert_eq!(report.data, Some(serde_json::json!([1, 2])));
    }
}
