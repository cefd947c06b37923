use anyhow::Result;

use crate::commands::{CommandReport, summary_line};
use crate::studio::Studio;

pub fn run(id: &str) -> Result<CommandReport> {
    let studio = Studio::open()?;
    let _lock = studio.writer_lock()?;
    let mut report = CommandReport::new("set-default");

    let detail = studio.indexer().set_default(id, studio.readiness()?)?;
    report.detail(summary_line(&detail.summary));
    report.set_data(&detail.summary)?;
    Ok(report)
}
