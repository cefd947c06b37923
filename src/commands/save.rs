use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

use crate::commands::{CommandReport, summary_line};
use crate::studio::Studio;

#[derive(Debug, Clone)]
pub enum SaveSource {
    File(PathBuf),
    Inline(String),
}

#[derive(Debug, Clone)]
pub struct SaveOptions {
    pub id: String,
    pub source: SaveSource,
}

pub fn run(opts: &SaveOptions) -> Result<CommandReport> {
    let content = match &opts.source {
        SaveSource::File(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        SaveSource::Inline(text) => text.clone(),
    };

    let studio = Studio::open()?;
    let _lock = studio.writer_lock()?;
    let mut report = CommandReport::new("save");

    let detail = studio
        .indexer()
        .save(&opts.id, &content, studio.readiness()?)?;
    report.detail(summary_line(&detail.summary));
    report.detail(format!("size={}", detail.summary.size));
    report.set_data(&detail)?;
    Ok(report)
}
