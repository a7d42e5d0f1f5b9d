use crate::browser::{BrowserDriver, BrowserGuard, Locator, Presence};
use crate::capture::{capture_channel, CaptureQueue};
use crate::classify::ClassifierRules;
use crate::config::{DedupScope, ScrapeConfig};
use crate::dedup::Deduplicator;
use crate::fetch::{FetchPolicy, MediaFetcher, MediaSource, PostScope};
use crate::models::{now_ms, DownloadRecord, FetchOutcome, PostStats, RunSummary};
use crate::page::{self, PageSelectors};
use crate::paths::AppPaths;
use crate::stats::StatsRecorder;
use crate::{EngineError, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

const USERNAME_INPUT: &str = r#"input[name="username"]"#;
const PASSWORD_INPUT: &str = r#"input[name="password"]"#;
const SUBMIT_BUTTON: &str = r#"button[type="submit"]"#;
const CAROUSEL_NEXT: &str = r#"button[aria-label="Next"], button[aria-label="next"]"#;
const DISMISS_POPUP_XPATHS: &[&str] = &[
    "//button[contains(text(), 'Not now')]",
    "//button[contains(text(), 'Not Now')]",
];

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrapeTarget {
    Post { url: String },
    Profile { username: String, max_posts: Option<usize> },
}

#[derive(Debug, Clone)]
pub struct RunRequest {
    pub target: ScrapeTarget,
    pub credentials: Option<Credentials>,
}

/// Everything a run accumulates. Owned by one `Session`; nothing is global.
#[derive(Debug)]
pub struct SessionContext {
    pub dedup: Deduplicator,
    pub stats: StatsRecorder,
    pub summary: RunSummary,
}

impl SessionContext {
    pub fn new(download_root: &Path, config: &ScrapeConfig) -> Self {
        let stats_path = AppPaths::stats_path(download_root);
        Self {
            dedup: Deduplicator::new(),
            stats: StatsRecorder::new(stats_path.clone(), config.persist_stats_each_post),
            summary: RunSummary {
                stats_path: stats_path.to_string_lossy().to_string(),
                ..RunSummary::default()
            },
        }
    }
}

pub struct Session<D: BrowserDriver, S: MediaSource> {
    browser: BrowserGuard<D>,
    fetcher: MediaFetcher<S>,
    queue: CaptureQueue,
    rules: ClassifierRules,
    selectors: PageSelectors,
    config: ScrapeConfig,
    download_root: PathBuf,
    context: SessionContext,
}

impl<D: BrowserDriver, S: MediaSource> Session<D, S> {
    /// Takes ownership of the driver immediately so it is released even if
    /// setup fails.
    pub fn new(driver: D, source: S, config: ScrapeConfig, download_root: &Path) -> Result<Self> {
        let mut browser = BrowserGuard::new(driver);
        let selectors = PageSelectors::from_config(&config)?;
        std::fs::create_dir_all(download_root)?;

        let (sink, queue) = capture_channel(config.capture_capacity);
        browser.observe_responses(sink)?;

        Ok(Self {
            browser,
            fetcher: MediaFetcher::new(source, FetchPolicy::from_config(&config)),
            queue,
            rules: ClassifierRules::from_config(&config),
            selectors,
            context: SessionContext::new(download_root, &config),
            config,
            download_root: download_root.to_path_buf(),
        })
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    fn settle(&mut self) {
        let delay = Duration::from_millis(self.config.page_settle_ms);
        self.browser.pause(delay);
    }

    /// Sign in through the login form. Any failure here is fatal for the run.
    pub fn login(&mut self, credentials: &Credentials) -> Result<()> {
        tracing::info!(event = "login_started", username = %credentials.username);
        let timeout = self.config.element_timeout();
        let site_url = self.config.site_url.clone();

        let attempt = (|| -> Result<()> {
            self.browser.goto(&site_url)?;
            self.settle();
            self.browser
                .fill(&Locator::css(USERNAME_INPUT), &credentials.username, timeout)?;
            self.browser
                .fill(&Locator::css(PASSWORD_INPUT), &credentials.password, timeout)?;
            self.browser.click(&Locator::css(SUBMIT_BUTTON), timeout)?;
            self.settle();
            Ok(())
        })();
        attempt.map_err(|err| EngineError::Login(err.to_string()))?;

        self.dismiss_popups();
        tracing::info!(event = "login_succeeded");
        Ok(())
    }

    fn dismiss_popups(&mut self) {
        let timeout = self.config.popup_timeout();
        for xpath in DISMISS_POPUP_XPATHS {
            match self.browser.click_optional(&Locator::xpath(*xpath), timeout) {
                Ok(Presence::Clicked) => {
                    tracing::debug!(event = "popup_dismissed", locator = xpath);
                    self.browser.pause(self.config.popup_timeout());
                }
                Ok(Presence::Absent) => {}
                Err(err) => tracing::warn!(event = "popup_dismiss_failed", error = %err),
            }
        }
    }

    fn traverse_carousel(&mut self) -> u32 {
        let locator = Locator::css(CAROUSEL_NEXT);
        let timeout = self.config.popup_timeout();
        let delay = Duration::from_millis(self.config.carousel_click_delay_ms);
        let mut clicks = 0;
        while clicks < self.config.carousel_max_clicks {
            match self.browser.click_optional(&locator, timeout) {
                Ok(Presence::Clicked) => {
                    clicks += 1;
                    self.browser.pause(delay);
                }
                Ok(Presence::Absent) => break,
                Err(err) => {
                    tracing::warn!(event = "carousel_click_failed", clicks, error = %err);
                    break;
                }
            }
        }
        clicks
    }

    /// Visit one post, walk its carousel, download what the network revealed,
    /// and record the post's stats (also when nothing was downloaded).
    pub fn scrape_post(&mut self, post_url: &str) -> Result<PostStats> {
        let post_id = page::post_id_from_url(post_url);
        tracing::info!(event = "post_started", post_id = %post_id, url = %post_url);

        if self.config.dedup_scope == DedupScope::Post {
            self.context.dedup.reset();
        }
        let stale = self.queue.discard_pending();
        if stale > 0 {
            tracing::debug!(event = "stale_events_discarded", count = stale);
        }

        self.browser.goto(post_url)?;
        self.settle();
        self.browser.reload()?;
        self.settle();

        let html = self.browser.page_html()?;
        let scraped = page::extract_post_stats(&html, &self.selectors);
        tracing::info!(
            event = "post_stats",
            post_id = %post_id,
            likes = %scraped.likes,
            comments = %scraped.comments,
            paid_partnership = scraped.paid_partnership,
        );

        let clicks = self.traverse_carousel();
        if clicks > 0 {
            tracing::info!(event = "carousel_traversed", post_id = %post_id, clicks);
        }

        let candidates = self.queue.drain(&self.rules, &self.context.dedup);
        self.context.summary.candidates_captured += candidates.len();
        tracing::info!(
            event = "post_candidates",
            post_id = %post_id,
            count = candidates.len(),
        );

        let scope = PostScope::new(&self.download_root, &post_id);
        std::fs::create_dir_all(scope.dir())?;
        let outcomes = self
            .fetcher
            .fetch_all(&candidates, &scope, &self.context.dedup);
        self.context.summary.absorb(&outcomes);

        let downloads: Vec<DownloadRecord> = outcomes
            .into_iter()
            .filter_map(|outcome| match outcome {
                FetchOutcome::Downloaded(record) => Some(record),
                _ => None,
            })
            .collect();

        let stats = PostStats {
            post_id: post_id.clone(),
            post_url: post_url.to_string(),
            likes: scraped.likes,
            comments: scraped.comments,
            paid_partnership: scraped.paid_partnership,
            media_downloaded: downloads.len(),
            timestamp_ms: now_ms(),
            downloads,
        };
        if let Err(err) = self.context.stats.record(stats.clone()) {
            tracing::warn!(event = "stats_persist_failed", post_id = %post_id, error = %err);
        }
        self.context.summary.posts_scraped += 1;

        tracing::info!(
            event = "post_finished",
            post_id = %post_id,
            downloaded = stats.media_downloaded,
            dir = %scope.dir().display(),
        );
        Ok(stats)
    }

    /// Scrape up to `max_posts` posts linked from a profile page (`None` or
    /// `Some(0)` means every linked post). A post that
    /// fails to load ends that post only; the profile scope continues.
    pub fn scrape_profile(&mut self, username: &str, max_posts: Option<usize>) -> Result<usize> {
        let url = page::profile_url(&self.config.site_url, username)?;
        tracing::info!(event = "profile_started", username, url = %url);

        self.browser.goto(&url)?;
        self.settle();
        let html = self.browser.page_html()?;
        let mut links = page::extract_post_links(&html, &url, &self.selectors);
        if let Some(max) = max_posts.filter(|n| *n > 0) {
            links.truncate(max);
        }
        tracing::info!(event = "profile_posts_found", username, count = links.len());

        let total = links.len();
        let mut scraped = 0;
        for (index, link) in links.iter().enumerate() {
            tracing::info!(event = "profile_post", position = index + 1, total);
            match self.scrape_post(link) {
                Ok(_) => scraped += 1,
                Err(err) => end_scope_gracefully("post", err)?,
            }
            if index + 1 < total {
                self.browser
                    .pause(Duration::from_millis(self.config.post_delay_ms));
            }
        }
        Ok(scraped)
    }

    /// Final stats flush, browser shutdown, and the run report.
    pub fn finish(mut self) -> Result<RunSummary> {
        self.context.stats.flush()?;
        if let Err(err) = self.browser.close() {
            tracing::warn!(event = "browser_close_failed", error = %err);
        }
        let mut summary = self.context.summary.clone();
        summary.dropped_events = self.queue.dropped_events();
        tracing::info!(
            event = "run_complete",
            posts = summary.posts_scraped,
            captured = summary.candidates_captured,
            downloaded = summary.downloaded,
            duplicates = summary.duplicates,
            failed = summary.failed,
            urls_seen = self.context.dedup.seen_url_count(),
            unique_content = self.context.dedup.content_hash_count(),
            stats = %self.context.stats.path().display(),
        );
        Ok(summary)
    }
}

/// Automation failures end the current scope; anything else (disk, config) propagates.
fn end_scope_gracefully(scope: &str, err: EngineError) -> Result<()> {
    match err {
        EngineError::Automation(reason) => {
            tracing::warn!(event = "scope_ended", scope, reason = %reason);
            Ok(())
        }
        other => Err(other),
    }
}

pub fn run<D: BrowserDriver, S: MediaSource>(
    driver: D,
    source: S,
    request: &RunRequest,
    config: ScrapeConfig,
    download_root: &Path,
) -> Result<RunSummary> {
    let mut session = Session::new(driver, source, config, download_root)?;

    if let Some(credentials) = &request.credentials {
        session.login(credentials)?;
    }

    match &request.target {
        ScrapeTarget::Post { url } => {
            if let Err(err) = session.scrape_post(url) {
                end_scope_gracefully("post", err)?;
            }
        }
        ScrapeTarget::Profile {
            username,
            max_posts,
        } => {
            if let Err(err) = session.scrape_profile(username, *max_posts) {
                end_scope_gracefully("profile", err)?;
            }
        }
    }

    session.finish()
}
