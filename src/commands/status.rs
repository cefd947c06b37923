use anyhow::Result;
use serde::Serialize;

use crate::commands::CommandReport;
use crate::studio::Studio;
use crate::studio::store::count_entries;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusView {
    version: &'static str,
    diary_dir: String,
    data_dir: String,
    db_path: String,
    sync_log: String,
    diary_count: usize,
    prompt_count: usize,
    active_prompt_id: Option<String>,
    api_base_url: String,
}

pub fn run() -> Result<CommandReport> {
    let studio = Studio::open()?;
    let mut report = CommandReport::new("status");

    let (prompts, _) = {
        let _lock = studio.writer_lock()?;
        studio.prompts()?
    };
    let view = StatusView {
        version: env!("CARGO_PKG_VERSION"),
        diary_dir: studio.paths.diary_dir.display().to_string(),
        data_dir: studio.paths.data_dir.display().to_string(),
        db_path: studio.store.db_path().display().to_string(),
        sync_log: studio.paths.sync_log.display().to_string(),
        diary_count: studio.store.read(count_entries)?,
        prompt_count: prompts.count()?,
        active_prompt_id: prompts.active()?.map(|p| p.id),
        api_base_url: studio.config.sync.api_base_url.clone(),
    };

    report.detail(format!("version={}", view.version));
    report.detail(format!("diary_dir={}", view.diary_dir));
    report.detail(format!("data_dir={}", view.data_dir));
    report.detail(format!("db_path={}", view.db_path));
    report.detail(format!("sync_log={}", view.sync_log));
    report.detail(format!("diary_count={}", view.diary_count));
    report.detail(format!("prompt_count={}", view.prompt_count));
    report.detail(format!(
        "active_prompt={}",
        view.active_prompt_id.as_deref().unwrap_or("-")
    ));
    report.detail(format!("api_base_url={}", view.api_base_url));

    if !studio.paths.diary_dir.is_dir() {
        report.issue("diary dir does not exist");
    }
    if view.active_prompt_id.is_none() {
        report.issue("no active prompt template");
    }

    report.set_data(&view)?;
    Ok(report)
}
