use crate::error::FetchError;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }

    pub fn default_extension(self) -> &'static str {
        match self {
            MediaKind::Image => ".jpg",
            MediaKind::Video => ".mp4",
        }
    }
}

/// A network response that looked like a media asset. Identity is the exact URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaCandidate {
    pub url: String,
    pub kind: MediaKind,
    pub discovered_at_ms: i64,
}

impl MediaCandidate {
    pub fn new(url: impl Into<String>, kind: MediaKind) -> Self {
        Self {
            url: url.into(),
            kind,
            discovered_at_ms: now_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRecord {
    pub source_url: String,
    pub content_hash: String,
    pub local_path: String,
    pub size_bytes: u64,
    pub kind: MediaKind,
}

/// Like/comment counters as shown on the page. Plain digit strings
/// (optionally with thousands separators) become numbers; abbreviated
/// values such as "1.2M" are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatCount {
    Number(u64),
    Text(String),
}

impl StatCount {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return StatCount::Number(0);
        }
        let digits: String = trimmed.chars().filter(|c| *c != ',').collect();
        let well_formed = !digits.is_empty()
            && digits.chars().all(|c| c.is_ascii_digit())
            && !trimmed.starts_with(',')
            && !trimmed.ends_with(',');
        if well_formed {
            if let Ok(value) = digits.parse::<u64>() {
                return StatCount::Number(value);
            }
        }
        StatCount::Text(trimmed.to_string())
    }
}

impl Default for StatCount {
    fn default() -> Self {
        StatCount::Number(0)
    }
}

impl std::fmt::Display for StatCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatCount::Number(n) => write!(f, "{n}"),
            StatCount::Text(t) => write!(f, "{t}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostStats {
    pub post_id: String,
    pub post_url: String,
    pub likes: StatCount,
    pub comments: StatCount,
    pub paid_partnership: bool,
    pub media_downloaded: usize,
    pub timestamp_ms: i64,
    #[serde(default)]
    pub downloads: Vec<DownloadRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Downloaded(DownloadRecord),
    Duplicate { url: String, content_hash: String },
    TooSmall { url: String, size_bytes: u64 },
    Failed(FetchError),
}

impl FetchOutcome {
    pub fn record(&self) -> Option<&DownloadRecord> {
        match self {
            FetchOutcome::Downloaded(record) => Some(record),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub posts_scraped: usize,
    pub candidates_captured: usize,
    pub downloaded: usize,
    pub duplicates: usize,
    pub too_small: usize,
    pub failed: usize,
    pub dropped_events: usize,
    pub stats_path: String,
}

impl RunSummary {
    pub fn absorb(&mut self, outcomes: &[FetchOutcome]) {
        for outcome in outcomes {
            match outcome {
                FetchOutcome::Downloaded(_) => self.downloaded += 1,
                FetchOutcome::Duplicate { .. } => self.duplicates += 1,
                FetchOutcome::TooSmall { .. } => self.too_small += 1,
                FetchOutcome::Failed(_) => self.failed += 1,
            }
        }
    }
}

/// Shortens long signed CDN URLs so log lines stay readable.
pub fn url_for_log(url: &str) -> String {
    const MAX_CHARS: usize = 96;
    if url.chars().count() <= MAX_CHARS {
        return url.to_string();
    }
    let head: String = url.chars().take(MAX_CHARS).collect();
    format!("{head}...")
}

pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
