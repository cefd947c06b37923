use crate::error::StudioResult;
use crate::studio::store::EntryStore;
use crate::studio::util::now_rfc3339;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;

pub const CLOUD_SYNC_ENABLED: &str = "cloud_sync_enabled";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SettingEntry {
    pub key: String,
    pub value: String,
    pub updated_at: String,
}

/// Durable switches the sync gate consults.
pub trait SettingsSource {
    fn cloud_sync_enabled(&self) -> StudioResult<bool>;
    fn set_cloud_sync_enabled(&self, enabled: bool) -> StudioResult<()>;
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn get_setting(conn: &Connection, key: &str) -> StudioResult<Option<SettingEntry>> {
    let entry = conn
        .query_row(
            "SELECT key, value, updated_at FROM app_settings WHERE key = ?1",
            params![key],
            |row| {
                Ok(SettingEntry {
                    key: row.get(0)?,
                    value: row.get(1)?,
                    updated_at: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(entry)
}

impl EntryStore {
    pub fn setting(&self, key: &str) -> StudioResult<Option<SettingEntry>> {
        self.read(|conn| get_setting(conn, key))
    }

    pub fn put_setting(&self, key: &str, value: &str) -> StudioResult<()> {
        self.write(|tx| {
            tx.execute(
                "INSERT INTO app_settings(key, value, updated_at) VALUES (?1, ?2, ?3) \
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, now_rfc3339()],
            )?;
            Ok(())
        })
    }
}

impl SettingsSource for EntryStore {
    fn cloud_sync_enabled(&self) -> StudioResult<bool> {
        Ok(self
            .setting(CLOUD_SYNC_ENABLED)?
            .map(|entry| parse_flag(&entry.value))
            .unwrap_or(false))
    }

    fn set_cloud_sync_enabled(&self, enabled: bool) -> StudioResult<()> {
        self.put_setting(CLOUD_SYNC_ENABLED, if enabled { "1" } else { "0" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn cloud_sync_defaults_to_disabled() {
        let tmp = tempdir().expect("tempdir");
        let store = EntryStore::open(tmp.path().join("local.db")).expect("open store");
        assert!(!store.cloud_sync_enabled().expect("read flag"));
    }

    #[test]
    fn cloud_sync_toggle_persists_across_reopen() {
        let tmp = tempdir().expect("tempdir");
        let db = tmp.path().join("local.db");
        {
            let store = EntryStore::open(&db).expect("open store");
            store.set_cloud_sync_enabled(true).expect("enable");
        }
        let store = EntryStore::open(&db).expect("reopen store");
        assert!(store.cloud_sync_enabled().expect("read flag"));
        let entry = store
            .setting(CLOUD_SYNC_ENABLED)
            .expect("read setting")
            .expect("setting row");
        assert_eq!(entry.value, "1");
    }

    #[test]
    fn flag_parsing_accepts_common_spellings() {
        assert!(parse_flag(" TRUE "));
        assert!(parse_flag("on"));
        assert!(!parse_flag("0"));
        assert!(!parse_flag("maybe"));
    }
}
