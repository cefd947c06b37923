use crate::error::{StudioError, StudioResult};
use crate::studio::model::DayDefaultRecord;
use crate::studio::store::entry_by_id;
use crate::studio::util::now_rfc3339;
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileOutcome {
    pub days: usize,
    pub kept_manual: usize,
    pub upserted: usize,
    pub removed: usize,
}

impl ReconcileOutcome {
    pub fn changed(&self) -> bool {
        self.upserted > 0 || self.removed > 0
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<DayDefaultRecord> {
    let is_manual: i64 = row.get(2)?;
    Ok(DayDefaultRecord {
        date: row.get(0)?,
        diary_id: row.get(1)?,
        is_manual: is_manual == 1,
        updated_at: row.get(3)?,
    })
}

pub fn load_defaults(conn: &Connection) -> StudioResult<HashMap<String, DayDefaultRecord>> {
    let mut stmt = conn.prepare(
        "SELECT diary_date, diary_id, is_manual, updated_at FROM diary_day_defaults",
    )?;
    let rows = stmt.query_map([], record_from_row)?;
    let mut out = HashMap::new();
    for record in rows {
        let record = record?;
        out.insert(record.date.clone(), record);
    }
    Ok(out)
}

pub fn load_default(conn: &Connection, date: &str) -> StudioResult<Option<DayDefaultRecord>> {
    let record = conn
        .query_row(
            "SELECT diary_date, diary_id, is_manual, updated_at \
             FROM diary_day_defaults WHERE diary_date = ?1",
            params![date],
            record_from_row,
        )
        .optional()?;
    Ok(record)
}

fn upsert_default(tx: &Transaction<'_>, date: &str, diary_id: &str, manual: bool) -> StudioResult<()> {
    tx.execute(
        "INSERT INTO diary_day_defaults(diary_date, diary_id, is_manual, updated_at) \
         VALUES (?1, ?2, ?3, ?4) \
         ON CONFLICT(diary_date) DO UPDATE SET diary_id = excluded.diary_id, \
           is_manual = excluded.is_manual, updated_at = excluded.updated_at",
        params![date, diary_id, manual as i64, now_rfc3339()],
    )?;
    Ok(())
}

/// Ids per day, newest file first, smallest id breaking ties.
fn dated_groups(conn: &Connection) -> StudioResult<BTreeMap<String, Vec<String>>> {
    let mut stmt = conn.prepare(
        "SELECT date, id FROM diary_entries WHERE date <> '' \
         ORDER BY date ASC, modified_at DESC, id ASC",
    )?;
    let mut rows = stmt.query([])?;
    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    while let Some(row) = rows.next()? {
        let date: String = row.get(0)?;
        let id: String = row.get(1)?;
        groups.entry(date).or_default().push(id);
    }
    Ok(groups)
}

/// Bring `diary_day_defaults` in line with the indexed entries.
///
/// Days without entries lose their row. A manual pin whose entry still
/// carries that day is kept; every other day points at its newest entry.
/// Rows that already hold the right value are not rewritten, so running
/// this twice in a row leaves the table untouched.
pub fn reconcile_tx(tx: &Transaction<'_>) -> StudioResult<ReconcileOutcome> {
    let groups = dated_groups(tx)?;
    let existing = load_defaults(tx)?;
    let mut outcome = ReconcileOutcome {
        days: groups.len(),
        ..ReconcileOutcome::default()
    };

    for date in existing.keys() {
        if !groups.contains_key(date) {
            tx.execute(
                "DELETE FROM diary_day_defaults WHERE diary_date = ?1",
                params![date],
            )?;
            outcome.removed += 1;
        }
    }

    for (date, ids) in &groups {
        let Some(newest) = ids.first() else {
            continue;
        };
        match existing.get(date) {
            Some(prior) if prior.is_manual && ids.contains(&prior.diary_id) => {
                outcome.kept_manual += 1;
            }
            Some(prior) if !prior.is_manual && &prior.diary_id == newest => {}
            _ => {
                upsert_default(tx, date, newest, false)?;
                outcome.upserted += 1;
            }
        }
    }

    if outcome.changed() {
        tracing::debug!(
            days = outcome.days,
            upserted = outcome.upserted,
            removed = outcome.removed,
            "day defaults reconciled"
        );
    }
    Ok(outcome)
}

/// Pin `diary_id` as the manual default for its day.
pub fn set_default_tx(tx: &Transaction<'_>, diary_id: &str) -> StudioResult<DayDefaultRecord> {
    let entry = entry_by_id(tx, diary_id)?.ok_or_else(|| StudioError::not_found("diary", diary_id))?;
    let Some(date) = entry.date.filter(|d| !d.trim().is_empty()) else {
        return Err(StudioError::validation(
            "diary date is empty, cannot set default",
        ));
    };
    upsert_default(tx, &date, &entry.id, true)?;
    load_default(tx, &date)?.ok_or_else(|| StudioError::not_found("day default", date))
}
