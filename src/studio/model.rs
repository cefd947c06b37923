use serde::Serialize;

/// One indexed markdown file, as the scanner derives it and the store keeps it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiaryEntry {
    pub id: String,
    pub rel_path: String,
    pub filename: String,
    pub date: Option<String>,
    pub title: String,
    pub preview: String,
    pub search_text: String,
    pub content_hash: String,
    pub size: i64,
    pub modified_at: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DiarySummary {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    pub title: String,
    pub preview: String,
    pub filename: String,
    pub rel_path: String,
    pub size: i64,
    pub modified_at: String,
    pub is_default: bool,
    pub can_sync: bool,
}

impl From<DiaryEntry> for DiarySummary {
    fn from(entry: DiaryEntry) -> Self {
        Self {
            id: entry.id,
            date: entry.date,
            title: entry.title,
            preview: entry.preview,
            filename: entry.filename,
            rel_path: entry.rel_path,
            size: entry.size,
            modified_at: entry.modified_at,
            is_default: false,
            can_sync: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiaryDetail {
    #[serde(flatten)]
    pub summary: DiarySummary,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiaryPage {
    pub items: Vec<DiarySummary>,
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DayHistoryItem {
    pub date: String,
    pub diary_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_diary_id: Option<String>,
    pub has_default: bool,
    pub default_is_manual: bool,
    pub latest_modified_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayDefaultRecord {
    pub date: String,
    pub diary_id: String,
    pub is_manual: bool,
    pub updated_at: String,
}

/// Sync switches as seen when a view is built; `canSync` needs both.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReadiness {
    pub cloud_sync_enabled: bool,
    pub api_key_configured: bool,
}

impl SyncReadiness {
    pub fn ready(self) -> bool {
        self.cloud_sync_enabled && self.api_key_configured
    }
}
