use anyhow::Result;

use crate::commands::CommandReport;
use crate::studio::Studio;

pub fn run() -> Result<CommandReport> {
    let studio = Studio::open()?;
    let _lock = studio.writer_lock()?;
    let mut report = CommandReport::new("reindex");

    report.detail(format!("diary_dir={}", studio.paths.diary_dir.display()));
    let outcome = studio.indexer().reindex()?;
    report.detail(format!("indexed={}", outcome.indexed));
    report.detail(format!(
        "added={} changed={} removed={} unchanged={}",
        outcome.added, outcome.changed, outcome.removed, outcome.unchanged
    ));
    report.detail(format!(
        "day_defaults: days={} kept_manual={} updated={} removed={}",
        outcome.day_defaults.days,
        outcome.day_defaults.kept_manual,
        outcome.day_defaults.upserted,
        outcome.day_defaults.removed
    ));
    report.set_data(&outcome)?;
    Ok(report)
}
