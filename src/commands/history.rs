use anyhow::Result;

use crate::commands::CommandReport;
use crate::studio::Studio;

pub fn run() -> Result<CommandReport> {
    let studio = Studio::open()?;
    let mut report = CommandReport::new("history");

    let days = studio.indexer().history()?;
    for day in &days {
        let default = match (&day.default_diary_id, day.default_is_manual) {
            (Some(id), true) => format!("{id} (manual)"),
            (Some(id), false) => id.clone(),
            (None, _) => "-".to_string(),
        };
        report.detail(format!(
            "{} diaries={} default={} latest={}",
            day.date, day.diary_count, default, day.latest_modified_at
        ));
    }
    report.set_data(&days)?;
    Ok(report)
}
