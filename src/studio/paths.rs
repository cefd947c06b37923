use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct StudioPaths {
    pub studio_home: PathBuf,
    pub diary_dir: PathBuf,
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub sync_log: PathBuf,
    pub legacy_prompts: PathBuf,
    pub credentials_file: PathBuf,
    pub lock_file: PathBuf,
}

impl StudioPaths {
    /// Lay out every derived path under explicit diary and data directories.
    pub fn from_dirs(studio_home: PathBuf, diary_dir: PathBuf, data_dir: PathBuf) -> Self {
        Self {
            db_path: data_dir.join("local.db"),
            sync_log: data_dir.join("sync.log"),
            legacy_prompts: data_dir.join("prompts.json"),
            lock_file: data_dir.join("studio.lock"),
            credentials_file: studio_home.join("credentials.json"),
            studio_home,
            diary_dir,
            data_dir,
        }
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.studio_home, &self.diary_dir, &self.data_dir] {
            fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(())
    }
}

fn required_home_dir() -> Result<PathBuf> {
    if let Some(home) = dirs::home_dir() {
        return Ok(home);
    }
    Err(anyhow::anyhow!("HOME directory could not be resolved"))
}

fn expand_tilde(raw: &str, home: &Path) -> PathBuf {
    if raw == "~" {
        return home.to_path_buf();
    }
    match raw.strip_prefix("~/") {
        Some(rest) => home.join(rest),
        None => PathBuf::from(raw),
    }
}

fn env_or_default_path(var: &str, home: &Path, fallback: PathBuf) -> PathBuf {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => expand_tilde(v.trim(), home),
        _ => fallback,
    }
}

pub fn resolve_paths() -> Result<StudioPaths> {
    let home = required_home_dir()?;
    let studio_home = env_or_default_path("DIARY_STUDIO_HOME", &home, home.join(".diary-studio"));
    let diary_dir = env_or_default_path("DIARY_STUDIO_DIARY_DIR", &home, studio_home.join("diary"));
    let data_dir = env_or_default_path(
        "DIARY_STUDIO_DATA_DIR",
        &home,
        studio_home.join("local-web"),
    );

    Ok(StudioPaths::from_dirs(studio_home, diary_dir, data_dir))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tilde_expands_against_home() {
        let home = PathBuf::from("/home/alice");
        assert_eq!(expand_tilde("~/notes", &home), PathBuf::from("/home/alice/notes"));
        assert_eq!(expand_tilde("~", &home), home);
        assert_eq!(expand_tilde("/srv/diary", &home), PathBuf::from("/srv/diary"));
    }

    #[test]
    fn derived_files_live_in_data_dir() {
        let paths = StudioPaths::from_dirs(
            PathBuf::from("/h"),
            PathBuf::from("/h/diary"),
            PathBuf::from("/h/web"),
        );
        assert_eq!(paths.db_path, PathBuf::from("/h/web/local.db"));
        assert_eq!(paths.sync_log, PathBuf::from("/h/web/sync.log"));
        assert_eq!(paths.legacy_prompts, PathBuf::from("/h/web/prompts.json"));
        assert_eq!(paths.credentials_file, PathBuf::from("/h/credentials.json"));
    }
}
