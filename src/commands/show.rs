use anyhow::Result;

use crate::commands::{CommandReport, summary_line};
use crate::studio::Studio;

pub fn run(id: &str) -> Result<CommandReport> {
    let studio = Studio::open()?;
    let mut report = CommandReport::new("show");

    let detail = studio.indexer().detail(id, studio.readiness()?)?;
    report.detail(summary_line(&detail.summary));
    report.detail(format!("rel_path={}", detail.summary.rel_path));
    report.detail(format!("modified_at={}", detail.summary.modified_at));
    report.detail(String::new());
    report.detail(detail.content.clone());
    report.set_data(&detail)?;
    Ok(report)
}
