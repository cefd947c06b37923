use crate::studio::model::DiaryEntry;
use crate::studio::warn::{self, WarnEvent};
use crate::studio::util::{
    clamp_bytes, is_iso_date, sha256_hex, system_time_rfc3339, truncate_with_ellipsis,
};
use regex::Regex;
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::UNIX_EPOCH;
use walkdir::{DirEntry, WalkDir};

pub const DIARY_EXTENSION: &str = ".md";
/// Agent prompt packets share the diary directory but are never diaries.
pub const PACKET_SUFFIX: &str = ".prompt.md";

const UNTITLED: &str = "Untitled Diary";
const EMPTY_PREVIEW: &str = "(empty diary content)";
const TITLE_MAX_CHARS: usize = 90;
const TITLE_FALLBACK_MAX_CHARS: usize = 80;
const PREVIEW_MAX_CHARS: usize = 220;
const PREVIEW_MAX_LINES: usize = 4;
const SEARCH_TEXT_MAX_BYTES: usize = 120_000;

static LABEL_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^\s*(?:[-*]\s*)?(?:date|日期)\s*:\s*([0-9]{4}-[0-9]{2}-[0-9]{2})\s*$")
        .expect("label date regex")
});
// ASCII boundaries: a date glued to CJK text still counts.
static ANY_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?-u:\b)[0-9]{4}-[0-9]{2}-[0-9]{2}(?-u:\b)").expect("date regex")
});

/// Walks a diary root and derives one [`DiaryEntry`] per markdown file.
#[derive(Debug, Clone)]
pub struct Scanner {
    root: PathBuf,
}

impl Scanner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lazily yield every readable diary under the root, in walk order.
    ///
    /// Dot-directories are pruned. Symlinked files are followed, symlinked
    /// directories are not. Files that cannot be stat'ed or read are skipped
    /// with a `STUDIO_WARN`. Calling this again re-reads the disk from scratch.
    pub fn documents(&self) -> impl Iterator<Item = DiaryEntry> + '_ {
        WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| !is_reserved_dir(entry))
            .filter_map(Result::ok)
            .filter(|entry| {
                !entry.file_type().is_dir() && is_diary_file_name(&entry.file_name().to_string_lossy())
            })
            .filter_map(move |entry| self.read_entry(&entry))
    }

    /// Every diary, ordered the way listings show them.
    pub fn snapshot(&self) -> Vec<DiaryEntry> {
        let mut items = self.documents().collect::<Vec<_>>();
        items.sort_by(listing_order);
        items
    }

    fn read_entry(&self, entry: &DirEntry) -> Option<DiaryEntry> {
        let path = entry.path();
        let meta = match fs::metadata(path) {
            Ok(meta) if meta.is_file() => meta,
            Ok(_) => return None,
            Err(err) => {
                warn_unreadable(path, &err);
                return None;
            }
        };
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(err) => {
                warn_unreadable(path, &err);
                return None;
            }
        };
        let rel_path = relative_slash_path(&self.root, path)?;
        let filename = entry.file_name().to_string_lossy().to_string();
        let modified = meta.modified().unwrap_or(UNIX_EPOCH);

        Some(derive_entry(
            &rel_path,
            &filename,
            &data,
            meta.len() as i64,
            &system_time_rfc3339(modified),
        ))
    }
}

fn warn_unreadable(path: &Path, err: &std::io::Error) {
    warn::emit(WarnEvent {
        code: "DIARY_UNREADABLE",
        stage: "scan",
        subject: &path.display().to_string(),
        reason: "diary skipped during scan",
        err: &err.to_string(),
    });
}

fn is_reserved_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry.file_name().to_string_lossy().starts_with('.')
}

pub fn is_diary_file_name(name: &str) -> bool {
    name.ends_with(DIARY_EXTENSION) && !name.ends_with(PACKET_SUFFIX)
}

fn relative_slash_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>();
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

/// Stable id of a diary: its slash-separated relative path without `.md`.
pub fn diary_id(rel_path: &str) -> String {
    let slashed = rel_path.replace('\\', "/");
    slashed
        .strip_suffix(DIARY_EXTENSION)
        .unwrap_or(&slashed)
        .to_string()
}

/// Build the index row for one file from its bytes and filesystem metadata.
pub fn derive_entry(
    rel_path: &str,
    filename: &str,
    content: &[u8],
    size: i64,
    modified_at: &str,
) -> DiaryEntry {
    let text = String::from_utf8_lossy(content);
    let base = filename.strip_suffix(DIARY_EXTENSION).unwrap_or(filename);
    let (title, preview) = extract_title_and_preview(&text);

    DiaryEntry {
        id: diary_id(rel_path),
        rel_path: rel_path.replace('\\', "/"),
        filename: filename.to_string(),
        date: detect_diary_date(base, &text),
        title,
        preview,
        search_text: normalize_search_text(&text),
        content_hash: sha256_hex(content),
        size,
        modified_at: modified_at.to_string(),
    }
}

/// Resolve the calendar day a diary belongs to.
///
/// An explicit `Date:`/`日期:` label wins, then a `YYYY-MM-DD` filename
/// prefix, then the first valid ISO date anywhere in the body.
pub fn detect_diary_date(base: &str, content: &str) -> Option<String> {
    if let Some(caps) = LABEL_DATE_RE.captures(content) {
        let labelled = caps[1].trim();
        if is_iso_date(labelled) {
            return Some(labelled.to_string());
        }
    }

    if let Some(prefix) = base.get(..10)
        && is_iso_date(prefix)
    {
        return Some(prefix.to_string());
    }

    ANY_DATE_RE
        .find_iter(content)
        .map(|m| m.as_str())
        .find(|candidate| is_iso_date(candidate))
        .map(str::to_string)
}

fn strip_list_marker(line: &str) -> &str {
    line.trim_start_matches(|c: char| c == '-' || c == '*' || c == '.' || c == ' ' || c.is_ascii_digit())
        .trim()
}

pub fn extract_title_and_preview(content: &str) -> (String, String) {
    let mut title: Option<String> = None;
    let mut preview_lines = Vec::with_capacity(PREVIEW_MAX_LINES);

    for raw in content.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with('#') {
            if title.is_none() {
                title = Some(line.trim_start_matches('#').trim().to_string());
            }
            continue;
        }
        let clean = strip_list_marker(line);
        if clean.is_empty() {
            continue;
        }
        if title.is_none() {
            title = Some(truncate_with_ellipsis(clean, TITLE_FALLBACK_MAX_CHARS));
        }
        preview_lines.push(clean);
        if preview_lines.len() >= PREVIEW_MAX_LINES {
            break;
        }
    }

    let title = title
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNTITLED.to_string());
    let preview = if preview_lines.is_empty() {
        EMPTY_PREVIEW.to_string()
    } else {
        preview_lines.join(" ")
    };

    (
        truncate_with_ellipsis(&title, TITLE_MAX_CHARS),
        truncate_with_ellipsis(&preview, PREVIEW_MAX_CHARS),
    )
}

pub fn normalize_search_text(content: &str) -> String {
    let lowered = content.to_lowercase();
    let joined = lowered.split_whitespace().collect::<Vec<_>>().join(" ");
    clamp_bytes(&joined, SEARCH_TEXT_MAX_BYTES).to_string()
}

/// Dated first (newest day first), undated last; newer files lead ties.
pub fn listing_order(a: &DiaryEntry, b: &DiaryEntry) -> Ordering {
    let by_date = match (&a.date, &b.date) {
        (Some(x), Some(y)) => y.cmp(x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_date
        .then_with(|| b.modified_at.cmp(&a.modified_at))
        .then_with(|| a.id.cmp(&b.id))
}
