use anyhow::Result;
use serde_json::json;

use crate::commands::CommandReport;
use crate::studio::Studio;
use crate::studio::remote::HttpSyncClient;
use crate::studio::sync_gate::SyncGate;

pub fn run(id: &str) -> Result<CommandReport> {
    let studio = Studio::open()?;
    let _lock = studio.writer_lock()?;
    let mut report = CommandReport::new("sync");

    let indexer = studio.indexer();
    let credentials = studio.credentials();
    let client = HttpSyncClient::new(&studio.config.sync)?;
    let gate = SyncGate::new(
        &indexer,
        &studio.store,
        &credentials,
        &client,
        &studio.paths.sync_log,
    )
    .with_execution_level(studio.config.sync.execution_level);

    report.detail(format!("sync_log={}", studio.paths.sync_log.display()));
    match gate.request_sync(id) {
        Ok(outcome) => {
            report.detail(format!(
                "synced {} date={} action={} status={}",
                outcome.diary_id, outcome.diary_date, outcome.action, outcome.status_code
            ));
            if let Some(remote) = &outcome.remote_diary_id {
                report.detail(format!("remote_diary_id={remote}"));
            }
            report.set_data(&outcome)?;
        }
        Err(err) => {
            let Some(code) = err.gate_code() else {
                return Err(err.into());
            };
            report.issue(format!("{}: {}", code.as_str(), code.reason()));
            report.set_data(&json!({
                "diaryId": id,
                "code": code.as_str(),
                "stage": code.stage(),
                "reason": code.reason(),
            }))?;
        }
    }
    Ok(report)
}
