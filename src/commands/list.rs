use anyhow::Result;

use crate::commands::{CommandReport, summary_line};
use crate::studio::Studio;

#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub query: Option<String>,
    pub limit: Option<usize>,
    pub offset: usize,
}

pub fn run(opts: &ListOptions) -> Result<CommandReport> {
    let studio = Studio::open()?;
    let mut report = CommandReport::new("list");

    let limit = opts.limit.unwrap_or(studio.config.listing.default_limit);
    let page = studio.indexer().list(
        opts.query.as_deref(),
        limit,
        opts.offset,
        studio.readiness()?,
    )?;

    report.detail(format!(
        "total={} offset={} limit={}",
        page.total, page.offset, page.limit
    ));
    for item in &page.items {
        report.detail(summary_line(item));
    }
    report.set_data(&page)?;
    Ok(report)
}
