use crate::error::{PromptRule, StudioError, StudioResult};
use crate::studio::store::EntryStore;
use crate::studio::util::now_rfc3339;
use crate::studio::warn::{self, WarnEvent};
use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

pub const DEFAULT_PROMPT_ID: &str = "default";
const DEFAULT_PROMPT_NAME: &str = "Default Diary Prompt";
const DEFAULT_PROMPT_DESCRIPTION: &str = "Bundled prompt template for diary generation.";
const MAX_PROMPT_ID_LEN: usize = 48;

static INVALID_ID_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9-]+").expect("prompt id regex"));

const PROMPT_COLUMNS: &str =
    "id, name, description, content, enabled, builtin, active, created_at, updated_at";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PromptTemplate {
    pub id: String,
    pub name: String,
    pub description: String,
    pub content: String,
    pub enabled: bool,
    pub builtin: bool,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// List view; the body is reduced to its length.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PromptMeta {
    pub id: String,
    pub name: String,
    pub description: String,
    pub enabled: bool,
    pub builtin: bool,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
    pub content_length: usize,
}

impl From<PromptTemplate> for PromptMeta {
    fn from(p: PromptTemplate) -> Self {
        Self {
            content_length: p.content.len(),
            id: p.id,
            name: p.name,
            description: p.description,
            enabled: p.enabled,
            builtin: p.builtin,
            active: p.active,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewPrompt {
    pub id: Option<String>,
    pub name: String,
    pub description: String,
    pub content: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Default)]
pub struct PromptPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub enabled: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyCatalog {
    #[serde(default)]
    active_prompt_id: String,
    #[serde(default)]
    prompts: Vec<LegacyPrompt>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyPrompt {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    enabled: bool,
    #[serde(default)]
    builtin: bool,
    #[serde(default)]
    created_at: String,
    #[serde(default)]
    updated_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapReport {
    pub migrated: usize,
    pub inserted_default: bool,
    pub upgraded_default: bool,
    pub archived_to: Option<PathBuf>,
}

/// Named prompt templates with exactly one active at a time.
pub struct PromptStore<'a> {
    store: &'a EntryStore,
}

impl<'a> PromptStore<'a> {
    /// Open the catalog, seeding it on first use.
    ///
    /// An empty table is filled from the legacy `prompts.json` if one
    /// exists, otherwise with the bundled default. A builtin default still
    /// carrying `legacy_minimal` is upgraded to `bundled`.
    pub fn open(
        store: &'a EntryStore,
        legacy_path: &Path,
        bundled: &str,
        legacy_minimal: &str,
    ) -> StudioResult<(Self, BootstrapReport)> {
        let count = store.read(count_prompts)?;
        let legacy = if count == 0 {
            load_legacy(legacy_path)?
        } else {
            None
        };

        let mut report = store.write(|tx| {
            let mut report = BootstrapReport::default();
            if count_prompts(tx)? == 0 {
                if let Some(catalog) = &legacy {
                    report.migrated = migrate_legacy(tx, catalog)?;
                }
                if report.migrated == 0 {
                    insert_default(tx, bundled)?;
                    report.inserted_default = true;
                }
            }
            report.upgraded_default = upgrade_builtin_default(tx, bundled, legacy_minimal)?;
            ensure_consistency(tx, bundled)?;
            Ok(report)
        })?;

        if report.migrated > 0 {
            report.archived_to = archive_legacy(legacy_path);
            tracing::info!(migrated = report.migrated, "legacy prompt catalog migrated");
        }
        Ok((Self { store }, report))
    }

    pub fn list(&self) -> StudioResult<Vec<PromptMeta>> {
        self.store.read(|conn| {
            let sql = format!(
                "SELECT {PROMPT_COLUMNS} FROM prompts ORDER BY active DESC, updated_at DESC, id ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], prompt_from_row)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(PromptMeta::from(row?));
            }
            Ok(out)
        })
    }

    pub fn get(&self, id: &str) -> StudioResult<PromptTemplate> {
        self.store
            .read(|conn| prompt_by_id(conn, id))?
            .ok_or_else(|| StudioError::not_found("prompt", id))
    }

    pub fn active(&self) -> StudioResult<Option<PromptTemplate>> {
        self.store.read(active_prompt)
    }

    pub fn count(&self) -> StudioResult<usize> {
        self.store.read(count_prompts)
    }

    pub fn create(&self, input: NewPrompt) -> StudioResult<PromptTemplate> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(StudioError::validation("name is required"));
        }
        let content = input.content.trim().to_string();
        if content.is_empty() {
            return Err(StudioError::validation("content is required"));
        }

        let base = Some(normalize_prompt_id(input.id.as_deref().unwrap_or("")))
            .filter(|id| !id.is_empty())
            .or_else(|| Some(normalize_prompt_id(&name)).filter(|id| !id.is_empty()))
            .unwrap_or_else(|| "prompt".to_string());

        let created = self.store.write(|tx| {
            let id = unique_id(tx, &base)?;
            let now = now_rfc3339();
            let first_active = active_prompt(tx)?.is_none();
            tx.execute(
                "INSERT INTO prompts(id, name, description, content, enabled, builtin, active, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?7, ?7)",
                params![
                    id,
                    name,
                    input.description.trim(),
                    content,
                    (input.enabled || first_active) as i64,
                    first_active as i64,
                    now,
                ],
            )?;
            ensure_consistency(tx, "")?;
            prompt_by_id(tx, &id)?.ok_or_else(|| StudioError::not_found("prompt", id))
        })?;
        tracing::info!(id = %created.id, active = created.active, "prompt created");
        Ok(created)
    }

    pub fn patch(&self, id: &str, patch: PromptPatch) -> StudioResult<PromptTemplate> {
        self.store.write(|tx| {
            let mut prompt =
                prompt_by_id(tx, id)?.ok_or_else(|| StudioError::not_found("prompt", id))?;
            let was_active = prompt.active;

            if let Some(name) = patch.name {
                let name = name.trim();
                if name.is_empty() {
                    return Err(StudioError::validation("name cannot be empty"));
                }
                prompt.name = name.to_string();
            }
            if let Some(description) = patch.description {
                prompt.description = description.trim().to_string();
            }
            if let Some(content) = patch.content {
                let content = content.trim();
                if content.is_empty() {
                    return Err(StudioError::validation("content cannot be empty"));
                }
                prompt.content = content.to_string();
            }
            if let Some(enabled) = patch.enabled {
                prompt.enabled = enabled;
            }
            if !prompt.enabled && enabled_count_excluding(tx, id)? == 0 {
                return Err(StudioError::PromptRule(PromptRule::NoEnabledTemplate));
            }

            tx.execute(
                "UPDATE prompts SET name = ?1, description = ?2, content = ?3, enabled = ?4, updated_at = ?5 \
                 WHERE id = ?6",
                params![
                    prompt.name,
                    prompt.description,
                    prompt.content,
                    prompt.enabled as i64,
                    now_rfc3339(),
                    id
                ],
            )?;
            if was_active && !prompt.enabled {
                promote_enabled(tx, Some(id))?;
            }
            ensure_consistency(tx, "")?;
            prompt_by_id(tx, id)?.ok_or_else(|| StudioError::not_found("prompt", id))
        })
    }

    pub fn delete(&self, id: &str) -> StudioResult<()> {
        self.store.write(|tx| {
            let prompt =
                prompt_by_id(tx, id)?.ok_or_else(|| StudioError::not_found("prompt", id))?;
            if prompt.builtin {
                return Err(StudioError::PromptRule(PromptRule::BuiltinProtected));
            }
            if count_prompts(tx)? <= 1 {
                return Err(StudioError::PromptRule(PromptRule::LastTemplate));
            }
            tx.execute("DELETE FROM prompts WHERE id = ?1", params![id])?;
            if prompt.active {
                promote_enabled(tx, None)?;
            }
            ensure_consistency(tx, "")
        })?;
        tracing::info!(id, "prompt deleted");
        Ok(())
    }

    pub fn activate(&self, id: &str) -> StudioResult<PromptTemplate> {
        self.store.write(|tx| {
            if prompt_by_id(tx, id)?.is_none() {
                return Err(StudioError::not_found("prompt", id));
            }
            tx.execute("UPDATE prompts SET active = 0 WHERE active = 1", [])?;
            tx.execute(
                "UPDATE prompts SET active = 1, enabled = 1, updated_at = ?1 WHERE id = ?2",
                params![now_rfc3339(), id],
            )?;
            prompt_by_id(tx, id)?.ok_or_else(|| StudioError::not_found("prompt", id))
        })
    }
}

fn prompt_from_row(row: &Row<'_>) -> rusqlite::Result<PromptTemplate> {
    let enabled: i64 = row.get(4)?;
    let builtin: i64 = row.get(5)?;
    let active: i64 = row.get(6)?;
    Ok(PromptTemplate {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        content: row.get(3)?,
        enabled: enabled == 1,
        builtin: builtin == 1,
        active: active == 1,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn prompt_by_id(conn: &Connection, id: &str) -> StudioResult<Option<PromptTemplate>> {
    let sql = format!("SELECT {PROMPT_COLUMNS} FROM prompts WHERE id = ?1");
    Ok(conn.query_row(&sql, params![id], prompt_from_row).optional()?)
}

fn active_prompt(conn: &Connection) -> StudioResult<Option<PromptTemplate>> {
    let sql = format!("SELECT {PROMPT_COLUMNS} FROM prompts WHERE active = 1 LIMIT 1");
    Ok(conn.query_row(&sql, [], prompt_from_row).optional()?)
}

fn count_prompts(conn: &Connection) -> StudioResult<usize> {
    let count: i64 = conn.query_row("SELECT COUNT(1) FROM prompts", [], |row| row.get(0))?;
    Ok(count.max(0) as usize)
}

fn enabled_count_excluding(conn: &Connection, id: &str) -> StudioResult<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(1) FROM prompts WHERE enabled = 1 AND id <> ?1",
        params![id],
        |row| row.get(0),
    )?;
    Ok(count.max(0) as usize)
}

fn unique_id(conn: &Connection, base: &str) -> StudioResult<String> {
    let mut candidate = base.to_string();
    let mut suffix = 2;
    while prompt_by_id(conn, &candidate)?.is_some() {
        candidate = format!("{base}-{suffix}");
        suffix += 1;
    }
    Ok(candidate)
}

fn set_only_active(tx: &Transaction<'_>, id: &str) -> StudioResult<()> {
    tx.execute(
        "UPDATE prompts SET active = CASE WHEN id = ?1 THEN 1 ELSE 0 END",
        params![id],
    )?;
    Ok(())
}

/// Make the most recently updated enabled template (other than `skip`) active.
fn promote_enabled(tx: &Transaction<'_>, skip: Option<&str>) -> StudioResult<()> {
    let candidate: Option<String> = tx
        .query_row(
            "SELECT id FROM prompts WHERE enabled = 1 AND id <> ?1 \
             ORDER BY updated_at DESC, id ASC LIMIT 1",
            params![skip.unwrap_or("")],
            |row| row.get(0),
        )
        .optional()?;
    let Some(id) = candidate else {
        return Err(StudioError::PromptRule(PromptRule::NoEnabledTemplate));
    };
    set_only_active(tx, &id)
}

/// Restore "exactly one active, at least one enabled" after any write.
fn ensure_consistency(tx: &Transaction<'_>, bundled: &str) -> StudioResult<()> {
    if count_prompts(tx)? == 0 {
        return insert_default(tx, bundled);
    }

    let active_ids = {
        let mut stmt = tx.prepare("SELECT id FROM prompts WHERE active = 1 ORDER BY updated_at DESC, id ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()?
    };
    if let Some(keep) = active_ids.first() {
        if active_ids.len() > 1 {
            set_only_active(tx, keep)?;
        }
        return Ok(());
    }

    let enabled: Option<String> = tx
        .query_row(
            "SELECT id FROM prompts WHERE enabled = 1 ORDER BY updated_at DESC, id ASC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()?;
    let id = match enabled {
        Some(id) => id,
        None => {
            let newest: String = tx.query_row(
                "SELECT id FROM prompts ORDER BY updated_at DESC, id ASC LIMIT 1",
                [],
                |row| row.get(0),
            )?;
            tx.execute("UPDATE prompts SET enabled = 1 WHERE id = ?1", params![newest])?;
            newest
        }
    };
    set_only_active(tx, &id)
}

fn insert_default(tx: &Transaction<'_>, bundled: &str) -> StudioResult<()> {
    let now = now_rfc3339();
    let content = bundled.trim();
    let content = if content.is_empty() {
        crate::assets::bundled_diary_prompt().trim()
    } else {
        content
    };
    tx.execute(
        "INSERT INTO prompts(id, name, description, content, enabled, builtin, active, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, 1, 1, 1, ?5, ?5)",
        params![
            DEFAULT_PROMPT_ID,
            DEFAULT_PROMPT_NAME,
            DEFAULT_PROMPT_DESCRIPTION,
            content,
            now
        ],
    )?;
    Ok(())
}

fn upgrade_builtin_default(
    tx: &Transaction<'_>,
    bundled: &str,
    legacy_minimal: &str,
) -> StudioResult<bool> {
    let bundled = bundled.trim();
    let legacy_minimal = legacy_minimal.trim();
    if bundled.is_empty() || legacy_minimal.is_empty() {
        return Ok(false);
    }
    let Some(current) = prompt_by_id(tx, DEFAULT_PROMPT_ID)? else {
        return Ok(false);
    };
    if !current.builtin || current.content.trim() != legacy_minimal {
        return Ok(false);
    }
    tx.execute(
        "UPDATE prompts SET content = ?1, updated_at = ?2 WHERE id = ?3",
        params![bundled, now_rfc3339(), DEFAULT_PROMPT_ID],
    )?;
    tracing::info!("builtin default prompt upgraded to bundled template");
    Ok(true)
}

fn load_legacy(path: &Path) -> StudioResult<Option<LegacyCatalog>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)?;
    let catalog: LegacyCatalog = json5::from_str(&raw).map_err(|err| {
        StudioError::validation(format!(
            "parse legacy prompts file {}: {err}",
            path.display()
        ))
    })?;
    if catalog.prompts.is_empty() {
        return Ok(None);
    }
    Ok(Some(catalog))
}

fn migrate_legacy(tx: &Transaction<'_>, catalog: &LegacyCatalog) -> StudioResult<usize> {
    let now = now_rfc3339();
    let active_id = catalog.active_prompt_id.trim();
    let mut taken = HashSet::new();
    let mut migrated = 0;

    for (idx, legacy) in catalog.prompts.iter().enumerate() {
        let content = legacy.content.trim();
        if content.is_empty() {
            continue;
        }
        let base = Some(normalize_prompt_id(&legacy.id))
            .filter(|id| !id.is_empty())
            .or_else(|| Some(normalize_prompt_id(&legacy.name)).filter(|id| !id.is_empty()))
            .unwrap_or_else(|| format!("prompt-{}", idx + 1));
        let mut id = base.clone();
        let mut suffix = 2;
        while !taken.insert(id.clone()) {
            id = format!("{base}-{suffix}");
            suffix += 1;
        }

        let name = match legacy.name.trim() {
            "" => id.as_str(),
            name => name,
        };
        let is_active = !active_id.is_empty() && legacy.id.trim() == active_id;

        tx.execute(
            "INSERT INTO prompts(id, name, description, content, enabled, builtin, active, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                id,
                name,
                legacy.description.trim(),
                content,
                legacy.enabled as i64,
                legacy.builtin as i64,
                is_active as i64,
                normalize_timestamp(&legacy.created_at, &now),
                normalize_timestamp(&legacy.updated_at, &now),
            ],
        )?;
        migrated += 1;
    }
    Ok(migrated)
}

fn archive_legacy(path: &Path) -> Option<PathBuf> {
    let stamp = Utc::now().format("%Y%m%d%H%M%S");
    let archived = PathBuf::from(format!("{}.migrated-{stamp}", path.display()));
    match fs::rename(path, &archived) {
        Ok(()) => Some(archived),
        Err(err) => {
            warn::emit(WarnEvent {
                code: "LEGACY_PROMPTS_ARCHIVE_FAILED",
                stage: "prompt_bootstrap",
                subject: &path.display().to_string(),
                reason: "legacy catalog already migrated; archival rename failed",
                err: &err.to_string(),
            });
            None
        }
    }
}

/// Lower-case, `[a-z0-9-]` only, at most 48 chars, no leading/trailing `-`.
pub fn normalize_prompt_id(input: &str) -> String {
    let lowered = input.trim().to_lowercase().replace(['_', ' '], "-");
    let replaced = INVALID_ID_CHARS.replace_all(&lowered, "-");
    let trimmed = replaced.trim_matches('-');
    let capped = trimmed.get(..MAX_PROMPT_ID_LEN).unwrap_or(trimmed);
    capped.trim_matches('-').to_string()
}

fn normalize_timestamp(input: &str, fallback: &str) -> String {
    match DateTime::parse_from_rfc3339(input.trim()) {
        Ok(at) => at
            .with_timezone(&Utc)
            .to_rfc3339_opts(SecondsFormat::Millis, true),
        Err(_) => fallback.to_string(),
    }
}
