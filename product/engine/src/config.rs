use crate::page;
use crate::paths::AppPaths;
use crate::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const MIN_FETCH_TIMEOUT_SECS: u64 = 1;
const MAX_FETCH_TIMEOUT_SECS: u64 = 300;
const MAX_FETCH_RETRIES: u32 = 5;
const MAX_FETCH_WORKERS: usize = 8;
const MIN_CAPTURE_CAPACITY: usize = 16;
const MAX_CAROUSEL_CLICKS: u32 = 100;
const MIN_VIEWPORT_EDGE: u32 = 200;
const MAX_DEVICE_SCALE_FACTOR: f64 = 4.0;

pub const DEFAULT_MOBILE_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 14_6 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.1.1 Mobile/15E148 Safari/604.1";

/// Whether deduplication state spans the whole run or is reset per post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupScope {
    Run,
    Post,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    pub site_url: String,
    pub cdn_hosts: Vec<String>,
    pub video_extensions: Vec<String>,
    pub fetch_timeout_secs: u64,
    pub fetch_retries: u32,
    pub retry_backoff_ms: u64,
    /// Images smaller than this are treated as tracking pixels and discarded after download.
    pub min_image_bytes: u64,
    pub fetch_workers: usize,
    pub capture_capacity: usize,
    pub user_agent: String,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub device_scale_factor: f64,
    pub headless: bool,
    pub element_timeout_ms: u64,
    pub popup_timeout_ms: u64,
    pub page_settle_ms: u64,
    pub carousel_max_clicks: u32,
    pub carousel_click_delay_ms: u64,
    pub like_selector: String,
    pub comment_selector: String,
    pub post_delay_ms: u64,
    pub dedup_scope: DedupScope,
    pub persist_stats_each_post: bool,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            site_url: "https://www.instagram.com/".to_string(),
            cdn_hosts: vec!["cdninstagram.com".to_string(), "fbcdn.net".to_string()],
            video_extensions: vec![
                ".mp4".to_string(),
                ".m4v".to_string(),
                ".mov".to_string(),
                ".webm".to_string(),
            ],
            fetch_timeout_secs: 30,
            fetch_retries: 0,
            retry_backoff_ms: 500,
            min_image_bytes: 1_024,
            fetch_workers: 1,
            capture_capacity: 4_096,
            user_agent: DEFAULT_MOBILE_USER_AGENT.to_string(),
            viewport_width: 375,
            viewport_height: 812,
            device_scale_factor: 3.0,
            headless: false,
            element_timeout_ms: 10_000,
            popup_timeout_ms: 2_000,
            page_settle_ms: 3_000,
            carousel_max_clicks: 20,
            carousel_click_delay_ms: 500,
            like_selector: page::DEFAULT_LIKE_SELECTOR.to_string(),
            comment_selector: page::DEFAULT_COMMENT_SELECTOR.to_string(),
            post_delay_ms: 2_000,
            dedup_scope: DedupScope::Run,
            persist_stats_each_post: true,
        }
    }
}

impl ScrapeConfig {
    /// Clamp numeric fields into usable ranges and normalize the allowlists.
    pub fn validate(mut self) -> Result<Self> {
        self.fetch_timeout_secs = self
            .fetch_timeout_secs
            .clamp(MIN_FETCH_TIMEOUT_SECS, MAX_FETCH_TIMEOUT_SECS);
        self.fetch_retries = self.fetch_retries.min(MAX_FETCH_RETRIES);
        self.fetch_workers = self.fetch_workers.clamp(1, MAX_FETCH_WORKERS);
        self.capture_capacity = self.capture_capacity.max(MIN_CAPTURE_CAPACITY);
        self.carousel_max_clicks = self.carousel_max_clicks.min(MAX_CAROUSEL_CLICKS);
        self.viewport_width = self.viewport_width.max(MIN_VIEWPORT_EDGE);
        self.viewport_height = self.viewport_height.max(MIN_VIEWPORT_EDGE);
        self.device_scale_factor = if self.device_scale_factor.is_finite() {
            self.device_scale_factor.clamp(1.0, MAX_DEVICE_SCALE_FACTOR)
        } else {
            1.0
        };

        self.cdn_hosts = normalize_list(&self.cdn_hosts, |v| v.trim_start_matches('.').to_string());
        self.video_extensions = normalize_list(&self.video_extensions, |v| {
            if v.starts_with('.') {
                v.to_string()
            } else {
                format!(".{v}")
            }
        });

        if self.cdn_hosts.is_empty() {
            return Err(EngineError::InvalidInput(
                "at least one CDN host is required".to_string(),
            ));
        }
        if url::Url::parse(&self.site_url).is_err() {
            return Err(EngineError::InvalidInput(format!(
                "site_url is not a valid URL: {}",
                self.site_url
            )));
        }
        page::PageSelectors::from_config(&self)?;
        Ok(self)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn element_timeout(&self) -> Duration {
        Duration::from_millis(self.element_timeout_ms)
    }

    pub fn popup_timeout(&self) -> Duration {
        Duration::from_millis(self.popup_timeout_ms)
    }
}

fn normalize_list(values: &[String], shape: impl Fn(&str) -> String) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for value in values {
        let trimmed = value.trim().to_ascii_lowercase();
        if trimmed.is_empty() {
            continue;
        }
        let shaped = shape(&trimmed);
        if !out.contains(&shaped) {
            out.push(shaped);
        }
    }
    out
}

pub fn load_scrape_config(paths: &AppPaths) -> Result<ScrapeConfig> {
    load_scrape_config_from(&paths.scrape_config_path())
}

pub fn load_scrape_config_from(path: &std::path::Path) -> Result<ScrapeConfig> {
    if !path.exists() {
        return ScrapeConfig::default().validate();
    }
    let bytes = std::fs::read(path)?;
    let parsed: ScrapeConfig = serde_json::from_slice(&bytes).map_err(|e| EngineError::Config {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    parsed.validate()
}

pub fn save_scrape_config(paths: &AppPaths, config: &ScrapeConfig) -> Result<()> {
    let path = paths.scrape_config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, format!("{json}\n"))?;
    Ok(())
}
