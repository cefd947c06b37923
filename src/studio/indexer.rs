use crate::error::{StudioError, StudioResult};
use crate::studio::day_default::{self, ReconcileOutcome};
use crate::studio::model::{
    DayDefaultRecord, DayHistoryItem, DiaryDetail, DiaryEntry, DiaryPage, DiarySummary, SyncReadiness,
};
use crate::studio::scanner::{Scanner, derive_entry};
use crate::studio::store::{self, EntryStore};
use crate::studio::util::{now_rfc3339, system_time_rfc3339};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tempfile::NamedTempFile;

pub const MAX_LIST_LIMIT: usize = 500;

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReindexOutcome {
    pub indexed: usize,
    pub added: usize,
    pub changed: usize,
    pub removed: usize,
    pub unchanged: usize,
    pub day_defaults: ReconcileOutcome,
}

/// Keeps the entry table mirrored from the diary directory and builds the
/// views callers read.
pub struct Indexer<'a> {
    store: &'a EntryStore,
    scanner: Scanner,
}

impl<'a> Indexer<'a> {
    pub fn new(store: &'a EntryStore, diary_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            scanner: Scanner::new(diary_dir),
        }
    }

    pub fn diary_dir(&self) -> &Path {
        self.scanner.root()
    }

    /// Replace every indexed row with a fresh scan and reconcile day
    /// defaults, all in one transaction.
    pub fn reindex(&self) -> StudioResult<ReindexOutcome> {
        let root = self.diary_dir();
        if !root.is_dir() {
            return Err(StudioError::validation(format!(
                "diary directory does not exist: {}",
                root.display()
            )));
        }

        let snapshot = self.scanner.snapshot();
        let indexed_at = now_rfc3339();

        let outcome = self.store.write(|tx| {
            let prior = store::entry_hashes(tx)?;
            let mut outcome = ReindexOutcome {
                indexed: snapshot.len(),
                ..ReindexOutcome::default()
            };
            let mut seen = HashSet::with_capacity(snapshot.len());
            for entry in &snapshot {
                match prior.get(&entry.rel_path) {
                    None => outcome.added += 1,
                    Some(hash) if hash == &entry.content_hash => outcome.unchanged += 1,
                    Some(_) => outcome.changed += 1,
                }
                seen.insert(entry.rel_path.as_str());
            }
            outcome.removed = prior.keys().filter(|k| !seen.contains(k.as_str())).count();

            store::clear_entries(tx)?;
            for entry in &snapshot {
                store::insert_entry(tx, entry, &indexed_at)?;
            }
            outcome.day_defaults = day_default::reconcile_tx(tx)?;
            Ok(outcome)
        })?;

        tracing::info!(
            indexed = outcome.indexed,
            added = outcome.added,
            changed = outcome.changed,
            removed = outcome.removed,
            "diary index rebuilt"
        );
        Ok(outcome)
    }

    /// Overwrite one diary's file and refresh only its row.
    pub fn save(&self, id: &str, content: &str, readiness: SyncReadiness) -> StudioResult<DiaryDetail> {
        let current = self.entry(id)?;
        let path = self.diary_dir().join(&current.rel_path);
        write_atomic(&path, content.as_bytes())?;

        let meta = fs::metadata(&path)?;
        let modified = meta.modified().unwrap_or(UNIX_EPOCH);
        let refreshed = derive_entry(
            &current.rel_path,
            &current.filename,
            content.as_bytes(),
            meta.len() as i64,
            &system_time_rfc3339(modified),
        );
        let indexed_at = now_rfc3339();

        self.store.write(|tx| {
            if store::update_entry(tx, &refreshed, &indexed_at)? == 0 {
                return Err(StudioError::not_found("diary", id));
            }
            day_default::reconcile_tx(tx)?;
            Ok(())
        })?;
        tracing::info!(id, date = ?refreshed.date, "diary saved");

        let defaults = self.store.read(day_default::load_defaults)?;
        Ok(DiaryDetail {
            summary: summarize(refreshed, &defaults, readiness),
            content: content.to_string(),
        })
    }

    pub fn entry(&self, id: &str) -> StudioResult<DiaryEntry> {
        self.store
            .read(|conn| store::entry_by_id(conn, id))?
            .ok_or_else(|| StudioError::not_found("diary", id))
    }

    /// Full view of one diary, including the file's current content.
    pub fn detail(&self, id: &str, readiness: SyncReadiness) -> StudioResult<DiaryDetail> {
        let entry = self.entry(id)?;
        let content = fs::read(self.diary_dir().join(&entry.rel_path))?;
        let defaults = self.store.read(day_default::load_defaults)?;
        Ok(DiaryDetail {
            summary: summarize(entry, &defaults, readiness),
            content: String::from_utf8_lossy(&content).into_owned(),
        })
    }

    pub fn list(
        &self,
        query: Option<&str>,
        limit: usize,
        offset: usize,
        readiness: SyncReadiness,
    ) -> StudioResult<DiaryPage> {
        let limit = limit.clamp(1, MAX_LIST_LIMIT);
        let (entries, total, defaults) = self.store.read(|conn| {
            let (entries, total) = store::query_entries(conn, query, limit, offset)?;
            Ok((entries, total, day_default::load_defaults(conn)?))
        })?;
        let items = entries
            .into_iter()
            .map(|entry| summarize(entry, &defaults, readiness))
            .collect();
        Ok(DiaryPage {
            items,
            total,
            offset,
            limit,
        })
    }

    pub fn history(&self) -> StudioResult<Vec<DayHistoryItem>> {
        self.store.read(store::day_history)
    }

    /// Pin `id` as its day's default and return the refreshed view.
    pub fn set_default(&self, id: &str, readiness: SyncReadiness) -> StudioResult<DiaryDetail> {
        let record = self.store.write(|tx| day_default::set_default_tx(tx, id))?;
        tracing::info!(id, date = %record.date, "day default pinned");
        self.detail(id, readiness)
    }

    pub fn day_default(&self, date: &str) -> StudioResult<Option<DayDefaultRecord>> {
        self.store.read(|conn| day_default::load_default(conn, date))
    }
}

fn summarize(
    entry: DiaryEntry,
    defaults: &HashMap<String, DayDefaultRecord>,
    readiness: SyncReadiness,
) -> DiarySummary {
    let is_default = entry
        .date
        .as_ref()
        .and_then(|date| defaults.get(date))
        .is_some_and(|record| record.diary_id == entry.id);
    let mut summary = DiarySummary::from(entry);
    summary.is_default = is_default;
    summary.can_sync = is_default && readiness.ready();
    summary
}

fn write_atomic(path: &Path, bytes: &[u8]) -> StudioResult<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;
    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    if let Ok(meta) = fs::metadata(path) {
        tmp.as_file().set_permissions(meta.permissions())?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|err| err.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::{Duration, SystemTime};
    use tempfile::{TempDir, tempdir};

    struct Fixture {
        _tmp: TempDir,
        diary_dir: PathBuf,
        store: EntryStore,
    }

    fn fixture() -> Fixture {
        let tmp = tempdir().expect("tempdir");
        let diary_dir = tmp.path().join("diary");
        fs::create_dir_all(&diary_dir).expect("mkdir diary");
        let store = EntryStore::open(tmp.path().join("data/local.db")).expect("open store");
        Fixture {
            _tmp: tmp,
            diary_dir,
            store,
        }
    }

    fn write_diary(dir: &Path, name: &str, body: &str, mtime: SystemTime) {
        let path = dir.join(name);
        fs::write(&path, body).expect("write diary");
        File::options()
            .write(true)
            .open(&path)
            .expect("open diary")
            .set_modified(mtime)
            .expect("set mtime");
    }

    fn base_time() -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(1_771_574_400)
    }

    #[test]
    fn newest_file_is_default_until_pinned() {
        let fx = fixture();
        let t = base_time();
        write_diary(&fx.diary_dir, "2026-02-20-a.md", "Date: 2026-02-20\n# A\n", t);
        write_diary(
            &fx.diary_dir,
            "2026-02-20-b.md",
            "Date: 2026-02-20\n# B\n",
            t + Duration::from_secs(3600),
        );
        let indexer = Indexer::new(&fx.store, &fx.diary_dir);
        let outcome = indexer.reindex().expect("reindex");
        assert_eq!(outcome.indexed, 2);
        assert_eq!(outcome.added, 2);

        let page = indexer
            .list(None, 50, 0, SyncReadiness::default())
            .expect("list");
        let flags = page
            .items
            .iter()
            .map(|s| (s.id.as_str(), s.is_default))
            .collect::<Vec<_>>();
        assert_eq!(flags, vec![("2026-02-20-b", true), ("2026-02-20-a", false)]);

        indexer
            .set_default("2026-02-20-a", SyncReadiness::default())
            .expect("pin a");
        let page = indexer
            .list(None, 50, 0, SyncReadiness::default())
            .expect("list");
        let flags = page
            .items
            .iter()
            .map(|s| (s.id.as_str(), s.is_default))
            .collect::<Vec<_>>();
        assert_eq!(flags, vec![("2026-02-20-b", false), ("2026-02-20-a", true)]);

        let history = indexer.history().expect("history");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].diary_count, 2);
        assert!(history[0].default_is_manual);
    }

    #[test]
    fn reindex_twice_is_stable() {
        let fx = fixture();
        write_diary(&fx.diary_dir, "2026-02-20.md", "# one\n", base_time());
        write_diary(&fx.diary_dir, "notes.md", "undated\n", base_time());
        let indexer = Indexer::new(&fx.store, &fx.diary_dir);
        indexer.reindex().expect("first reindex");
        let before = indexer.day_default("2026-02-20").expect("load");

        let second = indexer.reindex().expect("second reindex");
        assert_eq!(second.unchanged, 2);
        assert_eq!(second.added + second.changed + second.removed, 0);
        assert!(!second.day_defaults.changed());
        assert_eq!(indexer.day_default("2026-02-20").expect("load"), before);
    }

    #[test]
    fn save_refreshes_row_and_search_without_reindex() {
        let fx = fixture();
        write_diary(
            &fx.diary_dir,
            "2026-02-20.md",
            "# Day\nzebracorn sighting\n",
            base_time(),
        );
        write_diary(&fx.diary_dir, "2026-02-21.md", "# Other\nnothing\n", base_time());
        let indexer = Indexer::new(&fx.store, &fx.diary_dir);
        indexer.reindex().expect("reindex");

        let hits = indexer
            .list(Some("ZebraCorn"), 50, 0, SyncReadiness::default())
            .expect("search");
        assert_eq!(hits.total, 1);
        assert_eq!(hits.items[0].id, "2026-02-20");

        let detail = indexer
            .save("2026-02-20", "# Day\nplain again\n", SyncReadiness::default())
            .expect("save");
        assert_eq!(detail.summary.preview, "plain again");
        assert!(detail.summary.is_default);
        let hits = indexer
            .list(Some("zebracorn"), 50, 0, SyncReadiness::default())
            .expect("search");
        assert_eq!(hits.total, 0);
        assert_eq!(
            fs::read_to_string(fx.diary_dir.join("2026-02-20.md")).expect("read back"),
            "# Day\nplain again\n"
        );
    }

    #[test]
    fn save_moves_entry_to_new_day() {
        let fx = fixture();
        write_diary(&fx.diary_dir, "journal.md", "Date: 2026-02-20\nbody\n", base_time());
        let indexer = Indexer::new(&fx.store, &fx.diary_dir);
        indexer.reindex().expect("reindex");
        indexer
            .set_default("journal", SyncReadiness::default())
            .expect("pin");

        indexer
            .save("journal", "Date: 2026-02-22\nbody\n", SyncReadiness::default())
            .expect("save");
        assert_eq!(indexer.day_default("2026-02-20").expect("old day"), None);
        let moved = indexer
            .day_default("2026-02-22")
            .expect("new day")
            .expect("new day row");
        assert_eq!(moved.diary_id, "journal");
        assert!(!moved.is_manual);
    }

    #[cfg(unix)]
    #[test]
    fn save_keeps_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let fx = fixture();
        write_diary(&fx.diary_dir, "shared.md", "Date: 2026-02-20\nbody\n", base_time());
        let path = fx.diary_dir.join("shared.md");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).expect("chmod");
        let indexer = Indexer::new(&fx.store, &fx.diary_dir);
        indexer.reindex().expect("reindex");

        indexer
            .save("shared", "Date: 2026-02-20\nedited\n", SyncReadiness::default())
            .expect("save");
        let mode = fs::metadata(&path).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
        assert_eq!(fs::read_to_string(&path).expect("read"), "Date: 2026-02-20\nedited\n");
    }

    #[test]
    fn unknown_id_is_not_found() {
        let fx = fixture();
        let indexer = Indexer::new(&fx.store, &fx.diary_dir);
        indexer.reindex().expect("reindex");
        let err = indexer
            .save("ghost", "x", SyncReadiness::default())
            .expect_err("save must fail");
        assert!(err.is_not_found());
        assert!(!fx.diary_dir.join("ghost.md").exists());
    }

    #[test]
    fn can_sync_requires_default_and_readiness() {
        let fx = fixture();
        write_diary(&fx.diary_dir, "2026-02-20.md", "# x\n", base_time());
        let indexer = Indexer::new(&fx.store, &fx.diary_dir);
        indexer.reindex().expect("reindex");
        let ready = SyncReadiness {
            cloud_sync_enabled: true,
            api_key_configured: true,
        };
        assert!(indexer.detail("2026-02-20", ready).expect("detail").summary.can_sync);
        let half = SyncReadiness {
            cloud_sync_enabled: true,
            api_key_configured: false,
        };
        assert!(!indexer.detail("2026-02-20", half).expect("detail").summary.can_sync);
    }

    #[test]
    fn list_limit_is_clamped() {
        let fx = fixture();
        let indexer = Indexer::new(&fx.store, &fx.diary_dir);
        indexer.reindex().expect("reindex");
        let page = indexer
            .list(None, 0, 0, SyncReadiness::default())
            .expect("list");
        assert_eq!(page.limit, 1);
        let page = indexer
            .list(None, 10_000, 0, SyncReadiness::default())
            .expect("list");
        assert_eq!(page.limit, MAX_LIST_LIMIT);
    }
}
