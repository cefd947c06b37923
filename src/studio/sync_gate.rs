use crate::error::{GateCode, StudioError, StudioResult};
use crate::studio::credentials::CredentialResolver;
use crate::studio::indexer::Indexer;
use crate::studio::model::DiaryEntry;
use crate::studio::payload::build_payload;
use crate::studio::remote::SyncClient;
use crate::studio::settings::SettingsSource;
use crate::studio::sync_log::{self, SyncLogEntry, SyncOutcome};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub diary_id: String,
    pub diary_date: String,
    pub action: String,
    pub remote_diary_id: Option<String>,
    pub status_code: u16,
}

/// Ordered preconditions in front of the remote upsert.
///
/// Every call to [`SyncGate::request_sync`] appends exactly one line to the
/// sync log, whatever the outcome.
pub struct SyncGate<'a> {
    indexer: &'a Indexer<'a>,
    settings: &'a dyn SettingsSource,
    credentials: &'a dyn CredentialResolver,
    client: &'a dyn SyncClient,
    log_path: PathBuf,
    execution_level: i64,
}

impl<'a> SyncGate<'a> {
    pub fn new(
        indexer: &'a Indexer<'a>,
        settings: &'a dyn SettingsSource,
        credentials: &'a dyn CredentialResolver,
        client: &'a dyn SyncClient,
        log_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            indexer,
            settings,
            credentials,
            client,
            log_path: log_path.into(),
            execution_level: 0,
        }
    }

    pub fn with_execution_level(mut self, level: i64) -> Self {
        self.execution_level = level;
        self
    }

    fn blocked(&self, log: SyncLogEntry, code: GateCode) -> StudioError {
        let entry = log.finish(SyncOutcome::Blocked, code.stage(), Some(code.reason().to_string()));
        sync_log::append_best_effort(&self.log_path, &entry);
        tracing::warn!(diary_id = %entry.diary_id, code = code.as_str(), "sync blocked");
        StudioError::GateBlocked {
            code,
            reason: code.reason().to_string(),
        }
    }

    fn failed(&self, log: SyncLogEntry, stage: &str, err: StudioError) -> StudioError {
        let entry = log.finish(SyncOutcome::Failed, stage, Some(err.to_string()));
        sync_log::append_best_effort(&self.log_path, &entry);
        tracing::error!(diary_id = %entry.diary_id, stage, "sync failed: {err}");
        err
    }

    fn identify(&self, log: &mut SyncLogEntry, entry: &DiaryEntry) {
        log.diary_date = entry.date.clone();
        log.diary_title = Some(entry.title.clone());
        log.diary_filename = Some(entry.filename.clone());
        log.diary_rel_path = Some(entry.rel_path.clone());
        log.diary_path = Some(
            self.indexer
                .diary_dir()
                .join(&entry.rel_path)
                .display()
                .to_string(),
        );
        log.has_diary_date = Some(entry.date.is_some());
    }

    pub fn request_sync(&self, diary_id: &str) -> StudioResult<SyncReport> {
        let diary_id = diary_id.trim();
        let mut log = SyncLogEntry::new(diary_id);
        log.api_base_url = Some(self.client.base_url().to_string());

        let entry = match self.indexer.entry(diary_id) {
            Ok(entry) => entry,
            Err(err) if err.is_not_found() => {
                let entry = log.finish(
                    SyncOutcome::Blocked,
                    GateCode::InvalidDate.stage(),
                    Some(err.to_string()),
                );
                sync_log::append_best_effort(&self.log_path, &entry);
                return Err(err);
            }
            Err(err) => return Err(self.failed(log, "load_diary_detail", err)),
        };
        self.identify(&mut log, &entry);

        let Some(date) = entry.date.clone() else {
            return Err(self.blocked(log, GateCode::InvalidDate));
        };

        let is_default = match self.indexer.day_default(&date) {
            Ok(record) => record.is_some_and(|r| r.diary_id == entry.id),
            Err(err) => return Err(self.failed(log, "load_diary_detail", err)),
        };
        log.is_default = Some(is_default);
        if !is_default {
            return Err(self.blocked(log, GateCode::NotDefault));
        }

        let enabled = match self.settings.cloud_sync_enabled() {
            Ok(enabled) => enabled,
            Err(err) => return Err(self.failed(log, "read_cloud_sync_setting", err)),
        };
        log.cloud_sync_enabled = Some(enabled);
        if !enabled {
            return Err(self.blocked(log, GateCode::SyncDisabled));
        }

        let credential = match self.credentials.resolve() {
            Ok(credential) => credential,
            Err(err) => return Err(self.failed(log, "resolve_api_key_state", err)),
        };
        log.api_key_configured = Some(credential.is_some());
        log.api_key_source = credential.as_ref().map(|c| c.source.as_str().to_string());
        if credential.is_none() {
            return Err(self.blocked(log, GateCode::CredentialMissing));
        }

        let path = self.indexer.diary_dir().join(&entry.rel_path);
        let payload = match fs::read(&path)
            .map_err(StudioError::from)
            .and_then(|bytes| build_payload(&String::from_utf8_lossy(&bytes), &date, self.execution_level))
        {
            Ok(payload) => payload,
            Err(err) => return Err(self.failed(log, "build_runtime_payload", err)),
        };

        let api_key = match self.credentials.resolve() {
            Ok(Some(credential)) => credential.api_key,
            Ok(None) => {
                let err = StudioError::delegate("resolve_api_key", "api key is no longer configured");
                return Err(self.failed(log, "resolve_api_key", err));
            }
            Err(err) => return Err(self.failed(log, "resolve_api_key", err)),
        };

        let receipt = match self.client.upsert(&api_key, &payload) {
            Ok(receipt) => receipt,
            Err(err) => return Err(self.failed(log, "upsert_runtime_diary", err)),
        };

        log.action = Some(receipt.action.clone());
        log.status_code = Some(receipt.status_code);
        log.remote_diary_id = receipt.remote_id.clone();
        let entry_line = log.finish(SyncOutcome::Succeeded, "upsert_runtime_diary", None);
        sync_log::append_best_effort(&self.log_path, &entry_line);
        tracing::info!(diary_id, date = %date, action = %receipt.action, "diary synced");

        Ok(SyncReport {
            diary_id: entry.id,
            diary_date: date,
            action: receipt.action,
            remote_diary_id: receipt.remote_id,
            status_code: receipt.status_code,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::studio::credentials::{Credential, CredentialSource};
    use crate::studio::payload::RuntimeUpsertPayload;
    use crate::studio::remote::SyncReceipt;
    use crate::studio::store::EntryStore;
    use crate::studio::sync_log::read_entries;
    use std::cell::{Cell, RefCell};
    use std::path::Path;
    use tempfile::{TempDir, tempdir};

    struct FakeSettings(Cell<bool>);

    impl SettingsSource for FakeSettings {
        fn cloud_sync_enabled(&self) -> StudioResult<bool> {
            Ok(self.0.get())
        }

        fn set_cloud_sync_enabled(&self, enabled: bool) -> StudioResult<()> {
            self.0.set(enabled);
            Ok(())
        }
    }

    struct FakeCredentials(Option<&'static str>);

    impl CredentialResolver for FakeCredentials {
        fn resolve(&self) -> StudioResult<Option<Credential>> {
            Ok(self.0.map(|key| Credential {
                api_key: key.to_string(),
                source: CredentialSource::Env,
            }))
        }
    }

    #[derive(Default)]
    struct FakeClient {
        fail: bool,
        calls: RefCell<Vec<(String, RuntimeUpsertPayload)>>,
    }

    impl SyncClient for FakeClient {
        fn base_url(&self) -> &str {
            "https://sync.invalid"
        }

        fn upsert(&self, api_key: &str, payload: &RuntimeUpsertPayload) -> StudioResult<SyncReceipt> {
            self.calls
                .borrow_mut()
                .push((api_key.to_string(), payload.clone()));
            if self.fail {
                return Err(StudioError::delegate(
                    "upsert_runtime_diary",
                    "upload diary failed with status 500: boom",
                ));
            }
            Ok(SyncReceipt {
                action: "POST".to_string(),
                remote_id: Some("remote-1".to_string()),
                status_code: 201,
            })
        }
    }

    struct Fixture {
        tmp: TempDir,
        store: EntryStore,
    }

    impl Fixture {
        fn new() -> Self {
            let tmp = tempdir().expect("tempdir");
            let diary = tmp.path().join("diary");
            fs::create_dir_all(&diary).expect("mkdir diary");
            fs::write(diary.join("2026-02-20-a.md"), "Date: 2026-02-20\n# A\nfirst").expect("write a");
            fs::write(diary.join("2026-02-20-b.md"), "Date: 2026-02-20\n# B\nsecond").expect("write b");
            fs::write(diary.join("loose.md"), "# Loose\nno day").expect("write loose");
            let store = EntryStore::open(tmp.path().join("data/local.db")).expect("open");
            let fx = Self { tmp, store };
            fx.indexer().reindex().expect("reindex");
            fx.indexer()
                .set_default("2026-02-20-b", Default::default())
                .expect("pin b");
            fx
        }

        fn diary_dir(&self) -> PathBuf {
            self.tmp.path().join("diary")
        }

        fn log_path(&self) -> PathBuf {
            self.tmp.path().join("data/sync.log")
        }

        fn indexer(&self) -> Indexer<'_> {
            Indexer::new(&self.store, self.diary_dir())
        }
    }

    fn run(
        fx: &Fixture,
        settings: &FakeSettings,
        creds: &FakeCredentials,
        client: &FakeClient,
        id: &str,
    ) -> StudioResult<SyncReport> {
        let indexer = fx.indexer();
        SyncGate::new(&indexer, settings, creds, client, fx.log_path()).request_sync(id)
    }

    fn log_lines(path: &Path) -> Vec<SyncLogEntry> {
        read_entries(path).expect("read sync log")
    }

    #[test]
    fn non_default_is_reported_before_disabled_sync() {
        let fx = Fixture::new();
        let settings = FakeSettings(Cell::new(false));
        let creds = FakeCredentials(None);
        let client = FakeClient::default();

        let err = run(&fx, &settings, &creds, &client, "2026-02-20-a").expect_err("blocked");
        assert_eq!(err.gate_code(), Some(GateCode::NotDefault));

        let err = run(&fx, &settings, &creds, &client, "2026-02-20-b").expect_err("blocked");
        assert_eq!(err.gate_code(), Some(GateCode::SyncDisabled));
        assert_eq!(err.to_string(), "sync blocked: cloud sync is disabled in Settings");

        let lines = log_lines(&fx.log_path());
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].stage, "validate_day_default");
        assert_eq!(lines[0].is_default, Some(false));
        assert_eq!(lines[0].cloud_sync_enabled, None);
        assert_eq!(lines[1].stage, "precheck_cloud_sync");
        assert_eq!(lines[1].cloud_sync_enabled, Some(false));
        assert_eq!(lines[1].api_key_configured, None);
        assert!(client.calls.borrow().is_empty());
    }

    #[test]
    fn undated_and_unknown_diaries_block_at_date_stage() {
        let fx = Fixture::new();
        let settings = FakeSettings(Cell::new(true));
        let creds = FakeCredentials(Some("key-123456"));
        let client = FakeClient::default();

        let err = run(&fx, &settings, &creds, &client, "loose").expect_err("blocked");
        assert_eq!(err.gate_code(), Some(GateCode::InvalidDate));
        let err = run(&fx, &settings, &creds, &client, "ghost").expect_err("not found");
        assert!(err.is_not_found());

        let lines = log_lines(&fx.log_path());
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.event == "diary_sync_blocked"));
        assert!(lines.iter().all(|l| l.stage == "validate_diary_date"));
        assert_eq!(lines[0].has_diary_date, Some(false));
        assert_eq!(lines[1].diary_title, None);
    }

    #[test]
    fn missing_credential_blocks_last() {
        let fx = Fixture::new();
        let settings = FakeSettings(Cell::new(true));
        let client = FakeClient::default();
        let err = run(&fx, &settings, &FakeCredentials(None), &client, "2026-02-20-b")
            .expect_err("blocked");
        assert_eq!(err.gate_code(), Some(GateCode::CredentialMissing));
        let line = &log_lines(&fx.log_path())[0];
        assert_eq!(line.api_key_configured, Some(false));
        assert_eq!(line.level, "warn");
    }

    #[test]
    fn successful_sync_sends_payload_and_logs_receipt() {
        let fx = Fixture::new();
        let settings = FakeSettings(Cell::new(true));
        let client = FakeClient::default();
        let report = run(
            &fx,
            &settings,
            &FakeCredentials(Some("key-123456")),
            &client,
            "2026-02-20-b",
        )
        .expect("sync");
        assert_eq!(report.action, "POST");
        assert_eq!(report.remote_diary_id.as_deref(), Some("remote-1"));

        let calls = client.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "key-123456");
        assert_eq!(calls[0].1.diary_date, "2026-02-20");
        assert_eq!(calls[0].1.summary, "Date: 2026-02-20");

        let lines = log_lines(&fx.log_path());
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].event, "diary_sync_succeeded");
        assert_eq!(lines[0].level, "info");
        assert_eq!(lines[0].status_code, Some(201));
        assert_eq!(lines[0].api_key_source.as_deref(), Some("env"));
        assert_eq!(lines[0].message, "sync request completed");
    }

    #[test]
    fn delegate_failure_is_logged_once_as_error() {
        let fx = Fixture::new();
        let settings = FakeSettings(Cell::new(true));
        let client = FakeClient {
            fail: true,
            ..FakeClient::default()
        };
        let err = run(
            &fx,
            &settings,
            &FakeCredentials(Some("key-123456")),
            &client,
            "2026-02-20-b",
        )
        .expect_err("delegate failure");
        assert!(matches!(err, StudioError::Delegate { .. }));

        let lines = log_lines(&fx.log_path());
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].event, "diary_sync_failed");
        assert_eq!(lines[0].level, "error");
        assert_eq!(lines[0].stage, "upsert_runtime_diary");
        assert!(lines[0].error.as_deref().unwrap_or_default().contains("status 500"));
    }
}
