use crate::error::StudioResult;
use crate::studio::model::{DayHistoryItem, DiaryEntry};
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

const SCHEMA_VERSION: &str = "1";

const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode=WAL;
PRAGMA synchronous=NORMAL;

CREATE TABLE IF NOT EXISTS meta (
  key TEXT PRIMARY KEY,
  value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS diary_entries (
  id TEXT PRIMARY KEY,
  rel_path TEXT NOT NULL UNIQUE,
  filename TEXT NOT NULL,
  date TEXT NOT NULL DEFAULT '',
  title TEXT NOT NULL,
  preview TEXT NOT NULL,
  content_text TEXT NOT NULL DEFAULT '',
  content_hash TEXT NOT NULL DEFAULT '',
  size INTEGER NOT NULL,
  modified_at TEXT NOT NULL,
  indexed_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_diary_entries_date ON diary_entries(date);
CREATE INDEX IF NOT EXISTS idx_diary_entries_modified_at ON diary_entries(modified_at);

CREATE TABLE IF NOT EXISTS diary_day_defaults (
  diary_date TEXT PRIMARY KEY,
  diary_id TEXT NOT NULL,
  is_manual INTEGER NOT NULL DEFAULT 0 CHECK (is_manual IN (0,1)),
  updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS app_settings (
  key TEXT PRIMARY KEY,
  value TEXT NOT NULL,
  updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS prompts (
  id TEXT PRIMARY KEY,
  name TEXT NOT NULL,
  description TEXT NOT NULL DEFAULT '',
  content TEXT NOT NULL,
  enabled INTEGER NOT NULL DEFAULT 1 CHECK (enabled IN (0,1)),
  builtin INTEGER NOT NULL DEFAULT 0 CHECK (builtin IN (0,1)),
  active INTEGER NOT NULL DEFAULT 0 CHECK (active IN (0,1)),
  created_at TEXT NOT NULL,
  updated_at TEXT NOT NULL
);
"#;

const ENTRY_COLUMNS: &str =
    "id, rel_path, filename, date, title, preview, content_text, content_hash, size, modified_at";

/// The relational store behind the index, day defaults, settings and prompts.
///
/// One connection behind a mutex: every read and write in this process goes
/// through it, so a reindex, a save and a reconciliation never interleave.
#[derive(Debug)]
pub struct EntryStore {
    db_path: PathBuf,
    conn: Mutex<Connection>,
}

impl EntryStore {
    pub fn open(db_path: impl AsRef<Path>) -> StudioResult<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&db_path)?;
        conn.busy_timeout(Duration::from_millis(5000))?;
        let store = Self {
            db_path,
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn migrate(&self) -> StudioResult<()> {
        let conn = self.lock();
        conn.execute_batch(SCHEMA_SQL)?;
        conn.execute(
            "INSERT OR IGNORE INTO meta(key, value) VALUES (?1, ?2)",
            params!["schema_version", SCHEMA_VERSION],
        )?;
        Ok(())
    }

    /// Run `f` against the connection without opening a transaction.
    pub fn read<T>(&self, f: impl FnOnce(&Connection) -> StudioResult<T>) -> StudioResult<T> {
        let conn = self.lock();
        f(&conn)
    }

    /// Run `f` inside one transaction; commits on `Ok`, rolls back otherwise.
    pub fn write<T>(
        &self,
        f: impl FnOnce(&Transaction<'_>) -> StudioResult<T>,
    ) -> StudioResult<T> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<DiaryEntry> {
    let date: String = row.get(3)?;
    Ok(DiaryEntry {
        id: row.get(0)?,
        rel_path: row.get(1)?,
        filename: row.get(2)?,
        date: if date.trim().is_empty() { None } else { Some(date) },
        title: row.get(4)?,
        preview: row.get(5)?,
        search_text: row.get(6)?,
        content_hash: row.get(7)?,
        size: row.get(8)?,
        modified_at: row.get(9)?,
    })
}

pub fn entry_by_id(conn: &Connection, id: &str) -> StudioResult<Option<DiaryEntry>> {
    let sql = format!("SELECT {ENTRY_COLUMNS} FROM diary_entries WHERE id = ?1");
    let entry = conn
        .query_row(&sql, params![id], entry_from_row)
        .optional()?;
    Ok(entry)
}

pub fn insert_entry(tx: &Transaction<'_>, entry: &DiaryEntry, indexed_at: &str) -> StudioResult<()> {
    let mut stmt = tx.prepare_cached(
        "INSERT INTO diary_entries(id, rel_path, filename, date, title, preview, content_text, \
         content_hash, size, modified_at, indexed_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
    )?;
    stmt.execute(params![
        entry.id,
        entry.rel_path,
        entry.filename,
        entry.date.as_deref().unwrap_or(""),
        entry.title,
        entry.preview,
        entry.search_text,
        entry.content_hash,
        entry.size,
        entry.modified_at,
        indexed_at,
    ])?;
    Ok(())
}

/// Rewrite the derived columns of one row; returns the number of rows touched.
pub fn update_entry(tx: &Transaction<'_>, entry: &DiaryEntry, indexed_at: &str) -> StudioResult<usize> {
    let changed = tx.execute(
        "UPDATE diary_entries \
         SET date = ?1, title = ?2, preview = ?3, content_text = ?4, content_hash = ?5, \
             size = ?6, modified_at = ?7, indexed_at = ?8 \
         WHERE id = ?9",
        params![
            entry.date.as_deref().unwrap_or(""),
            entry.title,
            entry.preview,
            entry.search_text,
            entry.content_hash,
            entry.size,
            entry.modified_at,
            indexed_at,
            entry.id,
        ],
    )?;
    Ok(changed)
}

pub fn clear_entries(tx: &Transaction<'_>) -> StudioResult<usize> {
    Ok(tx.execute("DELETE FROM diary_entries", [])?)
}

/// `rel_path -> content_hash` for every indexed row.
pub fn entry_hashes(conn: &Connection) -> StudioResult<HashMap<String, String>> {
    let mut stmt = conn.prepare("SELECT rel_path, content_hash FROM diary_entries")?;
    let mut rows = stmt.query([])?;
    let mut out = HashMap::new();
    while let Some(row) = rows.next()? {
        out.insert(row.get(0)?, row.get(1)?);
    }
    Ok(out)
}

pub fn count_entries(conn: &Connection) -> StudioResult<usize> {
    let count: i64 = conn.query_row("SELECT COUNT(1) FROM diary_entries", [], |row| row.get(0))?;
    Ok(count.max(0) as usize)
}

fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for ch in query.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

/// One page of entries plus the total number matching `query`.
///
/// Dated entries come first (newest day first), undated after; within a day
/// the most recently modified file leads.
pub fn query_entries(
    conn: &Connection,
    query: Option<&str>,
    limit: usize,
    offset: usize,
) -> StudioResult<(Vec<DiaryEntry>, usize)> {
    let pattern = query
        .map(|q| q.trim().to_lowercase())
        .filter(|q| !q.is_empty())
        .map(|q| like_pattern(&q));

    let where_sql = if pattern.is_some() {
        " WHERE lower(title) LIKE ?1 ESCAPE '\\' OR lower(preview) LIKE ?1 ESCAPE '\\' \
          OR lower(filename) LIKE ?1 ESCAPE '\\' OR date LIKE ?1 ESCAPE '\\' \
          OR content_text LIKE ?1 ESCAPE '\\'"
    } else {
        ""
    };
    let order_sql = " ORDER BY CASE WHEN date = '' THEN 1 ELSE 0 END, date DESC, modified_at DESC, id ASC";
    let limit = limit as i64;
    let offset = offset as i64;

    let (total, entries) = match &pattern {
        Some(pattern) => {
            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(1) FROM diary_entries{where_sql}"),
                params![pattern],
                |row| row.get(0),
            )?;
            let sql = format!(
                "SELECT {ENTRY_COLUMNS} FROM diary_entries{where_sql}{order_sql} LIMIT ?2 OFFSET ?3"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![pattern, limit, offset], entry_from_row)?;
            (total, rows.collect::<rusqlite::Result<Vec<_>>>()?)
        }
        None => {
            let total: i64 =
                conn.query_row("SELECT COUNT(1) FROM diary_entries", [], |row| row.get(0))?;
            let sql =
                format!("SELECT {ENTRY_COLUMNS} FROM diary_entries{order_sql} LIMIT ?1 OFFSET ?2");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![limit, offset], entry_from_row)?;
            (total, rows.collect::<rusqlite::Result<Vec<_>>>()?)
        }
    };

    Ok((entries, total.max(0) as usize))
}

pub fn day_history(conn: &Connection) -> StudioResult<Vec<DayHistoryItem>> {
    let mut stmt = conn.prepare(
        "SELECT e.date, COUNT(1) AS diary_count, MAX(e.modified_at) AS latest_modified_at, \
                COALESCE(d.diary_id, '') AS default_diary_id, \
                COALESCE(d.is_manual, 0) AS default_is_manual \
         FROM diary_entries e \
         LEFT JOIN diary_day_defaults d ON d.diary_date = e.date \
         WHERE e.date <> '' \
         GROUP BY e.date, d.diary_id, d.is_manual \
         ORDER BY e.date DESC",
    )?;
    let rows = stmt.query_map([], |row| {
        let count: i64 = row.get(1)?;
        let default_id: String = row.get(3)?;
        let is_manual: i64 = row.get(4)?;
        Ok(DayHistoryItem {
            date: row.get(0)?,
            diary_count: count.max(0) as usize,
            has_default: !default_id.trim().is_empty(),
            default_diary_id: if default_id.trim().is_empty() {
                None
            } else {
                Some(default_id)
            },
            default_is_manual: is_manual == 1,
            latest_modified_at: row.get(2)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}
