use crate::studio::util::now_rfc3339_nanos;
use crate::studio::warn::{self, WarnEvent};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;

pub const EVENT_BLOCKED: &str = "diary_sync_blocked";
pub const EVENT_FAILED: &str = "diary_sync_failed";
pub const EVENT_SUCCEEDED: &str = "diary_sync_succeeded";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Blocked,
    Failed,
    Succeeded,
}

impl SyncOutcome {
    pub fn event(self) -> &'static str {
        match self {
            Self::Blocked => EVENT_BLOCKED,
            Self::Failed => EVENT_FAILED,
            Self::Succeeded => EVENT_SUCCEEDED,
        }
    }

    pub fn level(self) -> &'static str {
        match self {
            Self::Blocked => "warn",
            Self::Failed => "error",
            Self::Succeeded => "info",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::Blocked => "sync blocked by local precondition",
            Self::Failed => "sync request failed",
            Self::Succeeded => "sync request completed",
        }
    }
}

/// One line of `sync.log`.
///
/// Every key is always written; checks that were not reached are `null`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncLogEntry {
    pub timestamp: String,
    pub level: String,
    pub event: String,
    pub stage: String,
    pub diary_id: String,
    pub diary_date: Option<String>,
    pub diary_title: Option<String>,
    pub diary_filename: Option<String>,
    pub diary_rel_path: Option<String>,
    pub diary_path: Option<String>,
    pub has_diary_date: Option<bool>,
    pub is_default: Option<bool>,
    pub cloud_sync_enabled: Option<bool>,
    pub api_key_configured: Option<bool>,
    pub api_key_source: Option<String>,
    pub api_base_url: Option<String>,
    pub action: Option<String>,
    pub status_code: Option<u16>,
    pub remote_diary_id: Option<String>,
    pub message: String,
    pub error: Option<String>,
}

impl SyncLogEntry {
    pub fn new(diary_id: &str) -> Self {
        Self {
            diary_id: diary_id.to_string(),
            ..Self::default()
        }
    }

    /// Stamp outcome, stage and time; call once, right before appending.
    pub fn finish(mut self, outcome: SyncOutcome, stage: &str, error: Option<String>) -> Self {
        self.timestamp = now_rfc3339_nanos();
        self.level = outcome.level().to_string();
        self.event = outcome.event().to_string();
        self.stage = stage.to_string();
        self.message = outcome.message().to_string();
        self.error = error;
        self
    }
}

pub fn append_entry(path: &Path, entry: &SyncLogEntry) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let line = format!("{}\n", serde_json::to_string(entry)?);
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    file.write_all(line.as_bytes())?;
    Ok(())
}

/// Append without letting a write failure reach the caller.
pub fn append_best_effort(path: &Path, entry: &SyncLogEntry) {
    if let Err(err) = append_entry(path, entry) {
        warn::emit(WarnEvent {
            code: "SYNC_LOG_WRITE_FAILED",
            stage: &entry.stage,
            subject: &path.display().to_string(),
            reason: "sync diagnostics entry was not written",
            err: &format!("{err:#}"),
        });
    }
}

#[cfg(test)]
pub fn read_entries(path: &Path) -> Result<Vec<SyncLogEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let mut out = Vec::new();
    for line in raw.lines().filter(|l| !l.trim().is_empty()) {
        out.push(serde_json::from_str(line).context("invalid sync log line")?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn unevaluated_fields_serialize_as_null() {
        let entry = SyncLogEntry::new("2026-02-20").finish(
            SyncOutcome::Blocked,
            "validate_diary_date",
            Some("diary date is required for sync".to_string()),
        );
        let value = serde_json::to_value(&entry).expect("serialize");
        assert_eq!(value["event"], "diary_sync_blocked");
        assert_eq!(value["level"], "warn");
        assert!(value["apiKeyConfigured"].is_null());
        assert!(value["cloudSyncEnabled"].is_null());
        assert!(value.as_object().expect("object").contains_key("remoteDiaryId"));
    }

    #[test]
    fn entries_append_one_line_each() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("logs/sync.log");
        for outcome in [SyncOutcome::Blocked, SyncOutcome::Succeeded] {
            let entry = SyncLogEntry::new("a").finish(outcome, "upsert_runtime_diary", None);
            append_entry(&path, &entry).expect("append");
        }
        let entries = read_entries(&path).expect("read back");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].event, EVENT_SUCCEEDED);
    }

    #[test]
    fn best_effort_swallows_unwritable_path() {
        let tmp = tempdir().expect("tempdir");
        let blocker = tmp.path().join("file");
        fs::write(&blocker, "x").expect("write blocker");
        let entry = SyncLogEntry::new("a").finish(SyncOutcome::Failed, "upsert_runtime_diary", None);
        append_best_effort(&blocker.join("sync.log"), &entry);
    }
}
