use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_API_BASE_URL: &str = "https://api.moltbb.com";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StudioSyncConfig {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub allow_insecure_http: bool,
    pub execution_level: i64,
}

impl Default for StudioSyncConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: 12,
            allow_insecure_http: false,
            execution_level: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StudioListingConfig {
    pub default_limit: usize,
}

impl Default for StudioListingConfig {
    fn default() -> Self {
        Self { default_limit: 50 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StudioConfig {
    pub sync: StudioSyncConfig,
    pub listing: StudioListingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialStudioConfig {
    sync: Option<StudioSyncConfig>,
    listing: Option<StudioListingConfig>,
}

fn env_or_u64(var: &str, fallback: u64) -> u64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_i64(var: &str, fallback: i64) -> i64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<i64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_bool(var: &str, fallback: bool) -> bool {
    match env::var(var) {
        Ok(v) => match v.trim() {
            "1" | "true" | "TRUE" | "yes" | "on" => true,
            "0" | "false" | "FALSE" | "no" | "off" => false,
            _ => fallback,
        },
        Err(_) => fallback,
    }
}

fn env_or_string(var: &str, fallback: &str) -> String {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => fallback.to_string(),
    }
}

fn validate(cfg: &StudioConfig) -> Result<()> {
    let base = cfg.sync.api_base_url.trim();
    if !base.starts_with("https://") && !base.starts_with("http://") {
        return Err(anyhow!("invalid api base url: must be http(s): {base}"));
    }
    if base.starts_with("http://") && !cfg.sync.allow_insecure_http {
        return Err(anyhow!(
            "invalid api base url: must use https unless allow_insecure_http is enabled: {base}"
        ));
    }
    if cfg.sync.request_timeout_secs == 0 {
        return Err(anyhow!("invalid request timeout: must be >= 1 second"));
    }
    if !(0..=4).contains(&cfg.sync.execution_level) {
        return Err(anyhow!("invalid execution level: require 0 <= level <= 4"));
    }
    if !(1..=500).contains(&cfg.listing.default_limit) {
        return Err(anyhow!("invalid listing default limit: require 1 <= limit <= 500"));
    }
    Ok(())
}

fn resolve_config_path(studio_home: &Path) -> PathBuf {
    if let Ok(custom) = env::var("DIARY_STUDIO_CONFIG_PATH") {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }
    studio_home.join("studio.toml")
}

fn merge_file_config(base: &mut StudioConfig, path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(path)?;
    let parsed: PartialStudioConfig = toml::from_str(&raw)
        .map_err(|err| anyhow!("failed to parse studio config {}: {err}", path.display()))?;
    if let Some(sync) = parsed.sync {
        base.sync = sync;
    }
    if let Some(listing) = parsed.listing {
        base.listing = listing;
    }
    Ok(())
}

pub fn load_config(studio_home: &Path) -> Result<StudioConfig> {
    let mut cfg = StudioConfig::default();
    merge_file_config(&mut cfg, &resolve_config_path(studio_home))?;

    cfg.sync.api_base_url = env_or_string("DIARY_STUDIO_API_BASE_URL", &cfg.sync.api_base_url)
        .trim_end_matches('/')
        .to_string();
    cfg.sync.request_timeout_secs =
        env_or_u64("DIARY_STUDIO_REQUEST_TIMEOUT_SECS", cfg.sync.request_timeout_secs);
    cfg.sync.allow_insecure_http =
        env_or_bool("DIARY_STUDIO_ALLOW_INSECURE_HTTP", cfg.sync.allow_insecure_http);
    cfg.sync.execution_level =
        env_or_i64("DIARY_STUDIO_EXECUTION_LEVEL", cfg.sync.execution_level);
    cfg.listing.default_limit =
        env_or_u64("DIARY_STUDIO_LIST_LIMIT", cfg.listing.default_limit as u64) as usize;

    validate(&cfg)?;
    Ok(cfg)
}
