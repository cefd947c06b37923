use anyhow::Result;
use serde::Serialize;

use crate::commands::CommandReport;
use crate::studio::Studio;
use crate::studio::credentials::{CredentialResolver, save_api_key};
use crate::studio::settings::SettingsSource;
use crate::studio::util::now_rfc3339;

#[derive(Debug, Clone, Default)]
pub struct SettingsOptions {
    pub cloud_sync: Option<bool>,
    pub api_key: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SettingsView {
    cloud_sync_enabled: bool,
    api_key_configured: bool,
    api_key_masked: Option<String>,
    api_key_source: Option<&'static str>,
    api_base_url: String,
}

pub fn run(opts: &SettingsOptions) -> Result<CommandReport> {
    let studio = Studio::open()?;
    let mut report = CommandReport::new("settings");

    if opts.cloud_sync.is_some() || opts.api_key.is_some() {
        let _lock = studio.writer_lock()?;
        if let Some(enabled) = opts.cloud_sync {
            studio.store.set_cloud_sync_enabled(enabled)?;
            report.detail(format!(
                "cloud sync {}",
                if enabled { "enabled" } else { "disabled" }
            ));
        }
        if let Some(key) = &opts.api_key {
            save_api_key(&studio.paths.credentials_file, key, &now_rfc3339())?;
            report.detail(format!(
                "api key saved to {}",
                studio.paths.credentials_file.display()
            ));
        }
    }

    let credential = match studio.credentials().resolve() {
        Ok(credential) => credential,
        Err(err) => {
            report.issue(format!("credentials unreadable: {err}"));
            None
        }
    };
    let view = SettingsView {
        cloud_sync_enabled: studio.store.cloud_sync_enabled()?,
        api_key_configured: credential.is_some(),
        api_key_masked: credential.as_ref().map(|c| c.masked()),
        api_key_source: credential.as_ref().map(|c| c.source.as_str()),
        api_base_url: studio.config.sync.api_base_url.clone(),
    };

    report.detail(format!("cloud_sync_enabled={}", view.cloud_sync_enabled));
    report.detail(format!(
        "api_key={}",
        match (&view.api_key_masked, view.api_key_source) {
            (Some(masked), Some(source)) => format!("{masked} (source={source})"),
            _ => "not configured".to_string(),
        }
    ));
    report.detail(format!("api_base_url={}", view.api_base_url));
    report.set_data(&view)?;
    Ok(report)
}
