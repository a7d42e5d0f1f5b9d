use crate::config::ScrapeConfig;
use crate::dedup::Deduplicator;
use crate::error::FetchError;
use crate::models::{url_for_log, DownloadRecord, FetchOutcome, MediaCandidate, MediaKind};
use crate::paths::AppPaths;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;
use url::Url;

const KNOWN_EXTS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".webp", ".heic", ".avif", ".mp4", ".m4v", ".mov", ".webm",
];

#[derive(Debug, Clone)]
pub struct FetchedBody {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Blocking retrieval of a single URL. Implementations must classify their
/// failures into `FetchError` rather than panic.
pub trait MediaSource: Send + Sync {
    fn get(&self, url: &str) -> std::result::Result<FetchedBody, FetchError>;
}

pub struct HttpMediaSource {
    agent: ureq::Agent,
}

impl HttpMediaSource {
    pub fn new(timeout: Duration, user_agent: &str) -> Self {
        let mut config = ureq::Agent::config_builder();
        config = config
            .http_status_as_error(false)
            .timeout_global(Some(timeout.max(Duration::from_secs(1))))
            .user_agent(user_agent);
        Self {
            agent: config.build().into(),
        }
    }

    pub fn from_config(config: &ScrapeConfig) -> Self {
        Self::new(config.fetch_timeout(), &config.user_agent)
    }
}

impl MediaSource for HttpMediaSource {
    fn get(&self, url: &str) -> std::result::Result<FetchedBody, FetchError> {
        let response = self
            .agent
            .get(url)
            .call()
            .map_err(|err| map_ureq_error(url, err))?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        let content_type = header_string(&response, "content-type");
        let mut bytes = Vec::new();
        response
            .into_body()
            .into_reader()
            .read_to_end(&mut bytes)
            .map_err(|err| map_io_error(url, err))?;

        Ok(FetchedBody {
            content_type,
            bytes,
        })
    }
}

fn map_ureq_error(url: &str, err: ureq::Error) -> FetchError {
    match err {
        ureq::Error::Timeout(_) => FetchError::Timeout {
            url: url.to_string(),
        },
        ureq::Error::Io(io) => map_io_error(url, io),
        other => FetchError::Transport {
            url: url.to_string(),
            reason: other.to_string(),
        },
    }
}

fn map_io_error(url: &str, err: std::io::Error) -> FetchError {
    if err.kind() == std::io::ErrorKind::TimedOut || err.to_string().contains("timeout") {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Transport {
            url: url.to_string(),
            reason: err.to_string(),
        }
    }
}

fn header_string(response: &ureq::http::Response<ureq::Body>, key: &str) -> String {
    response
        .headers()
        .get(key)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase()
}

/// Destination directory for one post plus its sequential file counter.
#[derive(Debug)]
pub struct PostScope {
    post_id: String,
    dir: PathBuf,
    next_index: Mutex<usize>,
}

impl PostScope {
    pub fn new(download_root: &Path, post_id: &str) -> Self {
        Self {
            post_id: post_id.to_string(),
            dir: AppPaths::post_dir(download_root, post_id),
            next_index: Mutex::new(1),
        }
    }

    pub fn post_id(&self) -> &str {
        &self.post_id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stage the bytes under `.{staging_key}.part`, then claim the next item
    /// number and move them into place. A failed write does not use up a number.
    fn store(&self, staging_key: &str, ext: &str, bytes: &[u8]) -> std::io::Result<(PathBuf, u64)> {
        std::fs::create_dir_all(&self.dir)?;
        let tmp_path = self.dir.join(format!(".{staging_key}.part"));
        std::fs::write(&tmp_path, bytes)?;

        let mut next = self.next_index.lock().unwrap_or_else(|p| p.into_inner());
        let path = self.dir.join(format!("item_{}{ext}", *next));
        if let Err(err) = std::fs::rename(&tmp_path, &path) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(err);
        }
        *next += 1;
        drop(next);

        let size = std::fs::metadata(&path)
            .map(|m| m.len())
            .unwrap_or(bytes.len() as u64);
        Ok((path, size))
    }
}

#[derive(Debug, Clone)]
pub struct FetchPolicy {
    pub retries: u32,
    pub retry_backoff: Duration,
    pub min_image_bytes: u64,
    pub workers: usize,
}

impl FetchPolicy {
    pub fn from_config(config: &ScrapeConfig) -> Self {
        Self {
            retries: config.fetch_retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
            min_image_bytes: config.min_image_bytes,
            workers: config.fetch_workers.max(1),
        }
    }
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self::from_config(&ScrapeConfig::default())
    }
}

pub struct MediaFetcher<S: MediaSource> {
    source: S,
    policy: FetchPolicy,
}

impl<S: MediaSource> MediaFetcher<S> {
    pub fn new(source: S, policy: FetchPolicy) -> Self {
        Self { source, policy }
    }

    /// Download one candidate into the post directory. Failures and duplicates
    /// are reported as outcomes; nothing here aborts the run.
    pub fn fetch(
        &self,
        candidate: &MediaCandidate,
        scope: &PostScope,
        dedup: &Deduplicator,
    ) -> FetchOutcome {
        let body = match self.get_with_retry(&candidate.url) {
            Ok(body) => body,
            Err(err) => {
                tracing::warn!(
                    event = "media_fetch_failed",
                    post_id = scope.post_id(),
                    url = %url_for_log(&candidate.url),
                    error = %err,
                );
                return FetchOutcome::Failed(err);
            }
        };

        let size = body.bytes.len() as u64;
        if candidate.kind == MediaKind::Image && size < self.policy.min_image_bytes {
            tracing::info!(
                event = "media_too_small",
                post_id = scope.post_id(),
                url = %url_for_log(&candidate.url),
                bytes = size,
            );
            return FetchOutcome::TooSmall {
                url: candidate.url.clone(),
                size_bytes: size,
            };
        }

        let content_hash = sha256_hex(&body.bytes);
        if !dedup.admit_content(&content_hash) {
            tracing::info!(
                event = "media_duplicate",
                post_id = scope.post_id(),
                url = %url_for_log(&candidate.url),
                sha256 = %content_hash,
            );
            return FetchOutcome::Duplicate {
                url: candidate.url.clone(),
                content_hash,
            };
        }

        let ext = guess_extension(&candidate.url, &body.content_type, candidate.kind);
        let (out_path, size_bytes) = match scope.store(&content_hash, ext, &body.bytes) {
            Ok(stored) => stored,
            Err(err) => {
                dedup.release_content(&content_hash);
                let err = FetchError::Io {
                    url: candidate.url.clone(),
                    reason: err.to_string(),
                };
                tracing::warn!(
                    event = "media_write_failed",
                    post_id = scope.post_id(),
                    dir = %scope.dir().display(),
                    error = %err,
                );
                return FetchOutcome::Failed(err);
            }
        };

        tracing::info!(
            event = "media_downloaded",
            post_id = scope.post_id(),
            kind = candidate.kind.as_str(),
            path = %out_path.display(),
            bytes = size_bytes,
        );

        FetchOutcome::Downloaded(DownloadRecord {
            source_url: candidate.url.clone(),
            content_hash,
            local_path: out_path.to_string_lossy().to_string(),
            size_bytes,
            kind: candidate.kind,
        })
    }

    /// Fetch every candidate. Sequential unless the policy allows more than one
    /// worker; outcomes are returned in candidate order either way.
    pub fn fetch_all(
        &self,
        candidates: &[MediaCandidate],
        scope: &PostScope,
        dedup: &Deduplicator,
    ) -> Vec<FetchOutcome> {
        let workers = self.policy.workers.min(candidates.len());
        if workers <= 1 {
            return candidates
                .iter()
                .map(|candidate| self.fetch(candidate, scope, dedup))
                .collect();
        }

        let next = AtomicUsize::new(0);
        let slots: Mutex<Vec<Option<FetchOutcome>>> = Mutex::new(vec![None; candidates.len()]);
        thread::scope(|s| {
            for _ in 0..workers {
                s.spawn(|| loop {
                    let index = next.fetch_add(1, Ordering::SeqCst);
                    let Some(candidate) = candidates.get(index) else {
                        break;
                    };
                    let outcome = self.fetch(candidate, scope, dedup);
                    let mut guard = slots.lock().unwrap_or_else(|p| p.into_inner());
                    guard[index] = Some(outcome);
                });
            }
        });

        slots
            .into_inner()
            .unwrap_or_else(|p| p.into_inner())
            .into_iter()
            .flatten()
            .collect()
    }

    fn get_with_retry(&self, url: &str) -> std::result::Result<FetchedBody, FetchError> {
        let mut attempt = 0_u32;
        loop {
            match self.source.get(url) {
                Ok(body) => return Ok(body),
                Err(err) if err.is_retryable() && attempt < self.policy.retries => {
                    let delay = backoff_delay(self.policy.retry_backoff, attempt);
                    tracing::debug!(
                        event = "media_fetch_retry",
                        url = %url_for_log(url),
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                    );
                    attempt += 1;
                    if !delay.is_zero() {
                        thread::sleep(delay);
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// `base * 2^attempt`, saturating instead of overflowing.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2_u32.saturating_pow(attempt))
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn guess_extension(url: &str, content_type: &str, kind: MediaKind) -> &'static str {
    if let Ok(parsed) = Url::parse(url) {
        let path = parsed.path().to_ascii_lowercase();
        for ext in KNOWN_EXTS {
            if path.ends_with(ext) {
                return if *ext == ".jpeg" { ".jpg" } else { ext };
            }
        }
    }

    if content_type.contains("jpeg") {
        ".jpg"
    } else if content_type.contains("png") {
        ".png"
    } else if content_type.contains("gif") {
        ".gif"
    } else if content_type.contains("webp") {
        ".webp"
    } else if content_type.contains("heic") {
        ".heic"
    } else if content_type.contains("avif") {
        ".avif"
    } else if content_type.contains("quicktime") {
        ".mov"
    } else if content_type.contains("webm") {
        ".webm"
    } else if content_type.contains("mp4") {
        ".mp4"
    } else {
        kind.default_extension()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FakeSource {
        bodies: HashMap<String, std::result::Result<FetchedBody, FetchError>>,
        failures_first: HashMap<String, (usize, FetchError)>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeSource {
        fn new() -> Self {
            Self {
                bodies: HashMap::new(),
                failures_first: HashMap::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn serve(mut self, url: &str, content_type: &str, bytes: Vec<u8>) -> Self {
            self.bodies.insert(
                url.to_string(),
                Ok(FetchedBody {
                    content_type: content_type.to_string(),
                    bytes,
                }),
            );
            self
        }

        fn fail(mut self, url: &str, err: FetchError) -> Self {
            self.bodies.insert(url.to_string(), Err(err));
            self
        }

        /// Fail the first `times` requests for `url` with `err`, then serve normally.
        fn flaky(mut self, url: &str, times: usize, err: FetchError) -> Self {
            self.failures_first.insert(url.to_string(), (times, err));
            self
        }

        fn call_count(&self, url: &str) -> usize {
            self.calls
                .lock()
                .expect("lock")
                .iter()
                .filter(|u| u.as_str() == url)
                .count()
        }
    }

    impl MediaSource for FakeSource {
        fn get(&self, url: &str) -> std::result::Result<FetchedBody, FetchError> {
            let attempt = {
                let mut calls = self.calls.lock().expect("lock");
                calls.push(url.to_string());
                calls.iter().filter(|u| u.as_str() == url).count()
            };
            if let Some((times, err)) = self.failures_first.get(url) {
                if attempt <= *times {
                    return Err(err.clone());
                }
            }
            self.bodies.get(url).cloned().unwrap_or_else(|| {
                Err(FetchError::Status {
                    url: url.to_string(),
                    status: 404,
                })
            })
        }
    }

    fn image(url: &str) -> MediaCandidate {
        MediaCandidate::new(url, MediaKind::Image)
    }

    fn policy() -> FetchPolicy {
        FetchPolicy {
            retries: 0,
            retry_backoff: Duration::ZERO,
            min_image_bytes: 1_024,
            workers: 1,
        }
    }

    #[test]
    fn first_download_lands_as_item_1() {
        let dir = tempfile::tempdir().expect("tempdir");
        let url = "https://x.cdninstagram.com/a.jpg";
        let fetcher = MediaFetcher::new(
            FakeSource::new().serve(url, "image/jpeg", vec![1_u8; 4_096]),
            policy(),
        );
        let scope = PostScope::new(dir.path(), "Cabc123");
        let dedup = Deduplicator::new();

        let outcome = fetcher.fetch(&image(url), &scope, &dedup);
        let record = outcome.record().expect("downloaded").clone();
        let expected = dir.path().join("Cabc123").join("item_1.jpg");
        assert_eq!(record.local_path, expected.to_string_lossy());
        assert_eq!(record.size_bytes, 4_096);
        assert_eq!(record.content_hash, sha256_hex(&[1_u8; 4_096]));
        assert_eq!(std::fs::metadata(&expected).expect("meta").len(), 4_096);
    }

    #[test]
    fn same_bytes_at_another_url_are_discarded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let bytes = vec![9_u8; 2_048];
        let fetcher = MediaFetcher::new(
            FakeSource::new()
                .serve("https://x.cdninstagram.com/a.jpg", "image/jpeg", bytes.clone())
                .serve("https://x.cdninstagram.com/a-2.jpg", "image/jpeg", bytes),
            policy(),
        );
        let scope = PostScope::new(dir.path(), "p1");
        let dedup = Deduplicator::new();

        let outcomes = fetcher.fetch_all(
            &[
                image("https://x.cdninstagram.com/a.jpg"),
                image("https://x.cdninstagram.com/a-2.jpg"),
            ],
            &scope,
            &dedup,
        );
        assert!(matches!(outcomes[0], FetchOutcome::Downloaded(_)));
        assert!(matches!(outcomes[1], FetchOutcome::Duplicate { .. }));

        let files: Vec<_> = std::fs::read_dir(dir.path().join("p1"))
            .expect("read_dir")
            .flatten()
            .collect();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn timeout_is_reported_without_creating_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let url = "https://x.cdninstagram.com/slow.jpg";
        let fetcher = MediaFetcher::new(
            FakeSource::new().fail(
                url,
                FetchError::Timeout {
                    url: url.to_string(),
                },
            ),
            policy(),
        );
        let scope = PostScope::new(dir.path(), "p1");
        let dedup = Deduplicator::new();

        let outcome = fetcher.fetch(&image(url), &scope, &dedup);
        match outcome {
            FetchOutcome::Failed(err) => assert_eq!(err.url(), url),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(!dir.path().join("p1").exists());
        assert_eq!(dedup.content_hash_count(), 0);
    }

    #[test]
    fn retryable_failures_are_retried_up_to_the_limit() {
        let dir = tempfile::tempdir().expect("tempdir");
        let url = "https://x.cdninstagram.com/flaky.jpg";
        let fetcher = MediaFetcher::new(
            FakeSource::new().fail(
                url,
                FetchError::Status {
                    url: url.to_string(),
                    status: 503,
                },
            ),
            FetchPolicy {
                retries: 2,
                ..policy()
            },
        );
        let scope = PostScope::new(dir.path(), "p1");
        let outcome = fetcher.fetch(&image(url), &scope, &Deduplicator::new());
        assert!(matches!(outcome, FetchOutcome::Failed(FetchError::Status { status: 503, .. })));
        assert_eq!(fetcher.source.call_count(url), 3);
    }

    #[test]
    fn timeouts_are_retried_until_the_download_succeeds() {
        let dir = tempfile::tempdir().expect("tempdir");
        let url = "https://x.cdninstagram.com/slow-then-ok.jpg";
        let fetcher = MediaFetcher::new(
            FakeSource::new()
                .serve(url, "image/jpeg", vec![6_u8; 2_048])
                .flaky(
                    url,
                    2,
                    FetchError::Timeout {
                        url: url.to_string(),
                    },
                ),
            FetchPolicy {
                retries: 2,
                retry_backoff: Duration::from_millis(1),
                ..policy()
            },
        );
        let scope = PostScope::new(dir.path(), "p1");
        let outcome = fetcher.fetch(&image(url), &scope, &Deduplicator::new());
        let record = outcome.record().expect("downloaded");
        assert!(record.local_path.ends_with("item_1.jpg"), "{}", record.local_path);
        assert_eq!(fetcher.source.call_count(url), 3);
    }

    #[test]
    fn transport_errors_are_retried_until_the_download_succeeds() {
        let dir = tempfile::tempdir().expect("tempdir");
        let url = "https://x.cdninstagram.com/reset.mp4";
        let fetcher = MediaFetcher::new(
            FakeSource::new()
                .serve(url, "video/mp4", vec![2_u8; 512])
                .flaky(
                    url,
                    1,
                    FetchError::Transport {
                        url: url.to_string(),
                        reason: "connection reset".to_string(),
                    },
                ),
            FetchPolicy {
                retries: 3,
                ..policy()
            },
        );
        let scope = PostScope::new(dir.path(), "p1");
        let outcome = fetcher.fetch(
            &MediaCandidate::new(url, MediaKind::Video),
            &scope,
            &Deduplicator::new(),
        );
        assert!(matches!(outcome, FetchOutcome::Downloaded(_)), "{outcome:?}");
        assert_eq!(fetcher.source.call_count(url), 2);
    }

    #[test]
    fn timeout_retries_stop_at_the_limit() {
        let dir = tempfile::tempdir().expect("tempdir");
        let url = "https://x.cdninstagram.com/never.jpg";
        let fetcher = MediaFetcher::new(
            FakeSource::new()
                .serve(url, "image/jpeg", vec![6_u8; 2_048])
                .flaky(
                    url,
                    5,
                    FetchError::Timeout {
                        url: url.to_string(),
                    },
                ),
            FetchPolicy {
                retries: 1,
                ..policy()
            },
        );
        let scope = PostScope::new(dir.path(), "p1");
        let outcome = fetcher.fetch(&image(url), &scope, &Deduplicator::new());
        assert!(matches!(outcome, FetchOutcome::Failed(FetchError::Timeout { .. })));
        assert_eq!(fetcher.source.call_count(url), 2);
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let base = Duration::from_millis(500);
        assert_eq!(backoff_delay(base, 0), Duration::from_millis(500));
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(1_000));
        assert_eq!(backoff_delay(base, 2), Duration::from_millis(2_000));
        assert_eq!(backoff_delay(base, 3), Duration::from_millis(4_000));
        assert_eq!(backoff_delay(Duration::ZERO, 4), Duration::ZERO);
        assert_eq!(backoff_delay(Duration::MAX, 2), Duration::MAX);
    }

    #[test]
    fn failed_write_does_not_use_up_an_item_number() {
        let dir = tempfile::tempdir().expect("tempdir");
        let first = "https://x.cdninstagram.com/first.jpg";
        let second = "https://x.cdninstagram.com/second.jpg";
        let fetcher = MediaFetcher::new(
            FakeSource::new()
                .serve(first, "image/jpeg", vec![1_u8; 2_048])
                .serve(second, "image/jpeg", vec![2_u8; 2_048]),
            policy(),
        );
        let scope = PostScope::new(dir.path(), "p");
        let dedup = Deduplicator::new();

        // A non-empty directory in the way makes the rename fail.
        let blocker = scope.dir().join("item_1.jpg");
        std::fs::create_dir_all(blocker.join("x")).expect("mkdir");
        let outcome = fetcher.fetch(&image(first), &scope, &dedup);
        assert!(matches!(outcome, FetchOutcome::Failed(FetchError::Io { .. })), "{outcome:?}");
        assert_eq!(dedup.content_hash_count(), 0);
        std::fs::remove_dir_all(&blocker).expect("cleanup");

        let outcome = fetcher.fetch(&image(second), &scope, &dedup);
        let record = outcome.record().expect("downloaded");
        assert!(record.local_path.ends_with("item_1.jpg"), "{}", record.local_path);

        let outcome = fetcher.fetch(&image(first), &scope, &dedup);
        let record = outcome.record().expect("downloaded");
        assert!(record.local_path.ends_with("item_2.jpg"), "{}", record.local_path);

        let names: Vec<String> = std::fs::read_dir(scope.dir())
            .expect("read_dir")
            .flatten()
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names.len(), 2, "{names:?}");
    }

    #[test]
    fn client_errors_are_not_retried() {
        let dir = tempfile::tempdir().expect("tempdir");
        let url = "https://x.cdninstagram.com/gone.jpg";
        let fetcher = MediaFetcher::new(
            FakeSource::new(),
            FetchPolicy {
                retries: 3,
                ..policy()
            },
        );
        let scope = PostScope::new(dir.path(), "p1");
        let _ = fetcher.fetch(&image(url), &scope, &Deduplicator::new());
        assert_eq!(fetcher.source.call_count(url), 1);
    }

    #[test]
    fn tiny_images_are_rejected_after_download() {
        let dir = tempfile::tempdir().expect("tempdir");
        let url = "https://x.cdninstagram.com/pixel.gif";
        let fetcher = MediaFetcher::new(
            FakeSource::new().serve(url, "image/gif", vec![0_u8; 43]),
            policy(),
        );
        let scope = PostScope::new(dir.path(), "p1");
        let dedup = Deduplicator::new();
        let outcome = fetcher.fetch(&image(url), &scope, &dedup);
        assert_eq!(
            outcome,
            FetchOutcome::TooSmall {
                url: url.to_string(),
                size_bytes: 43
            }
        );
        assert_eq!(dedup.content_hash_count(), 0);
    }

    #[test]
    fn small_videos_are_kept() {
        let dir = tempfile::tempdir().expect("tempdir");
        let url = "https://x.cdninstagram.com/clip";
        let fetcher = MediaFetcher::new(
            FakeSource::new().serve(url, "video/mp4", vec![3_u8; 100]),
            policy(),
        );
        let scope = PostScope::new(dir.path(), "p1");
        let outcome = fetcher.fetch(
            &MediaCandidate::new(url, MediaKind::Video),
            &scope,
            &Deduplicator::new(),
        );
        let record = outcome.record().expect("downloaded");
        assert!(record.local_path.ends_with("item_1.mp4"), "{}", record.local_path);
    }

    #[test]
    fn worker_pool_writes_each_unique_payload_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut source = FakeSource::new();
        let mut candidates = Vec::new();
        for i in 0..12_u8 {
            let url = format!("https://x.cdninstagram.com/{i}.jpg");
            // Every pair of URLs serves identical bytes.
            source = source.serve(&url, "image/jpeg", vec![i / 2; 2_048]);
            candidates.push(image(&url));
        }
        let fetcher = MediaFetcher::new(
            source,
            FetchPolicy {
                workers: 4,
                ..policy()
            },
        );
        let scope = PostScope::new(dir.path(), "p1");
        let dedup = Deduplicator::new();

        let outcomes = fetcher.fetch_all(&candidates, &scope, &dedup);
        assert_eq!(outcomes.len(), 12);
        let downloaded: Vec<&DownloadRecord> =
            outcomes.iter().filter_map(FetchOutcome::record).collect();
        assert_eq!(downloaded.len(), 6);

        let mut on_disk = 0;
        for entry in std::fs::read_dir(dir.path().join("p1")).expect("read_dir").flatten() {
            let meta = entry.metadata().expect("meta");
            assert!(meta.len() > 0);
            on_disk += 1;
        }
        assert_eq!(on_disk, 6);
        for record in downloaded {
            let meta = std::fs::metadata(&record.local_path).expect("meta");
            assert_eq!(meta.len(), record.size_bytes);
        }
    }

    #[test]
    fn extension_prefers_url_then_content_type() {
        assert_eq!(
            guess_extension("https://x.cdninstagram.com/v/a.webp?x=1", "image/jpeg", MediaKind::Image),
            ".webp"
        );
        assert_eq!(
            guess_extension("https://x.cdninstagram.com/v/a.JPEG", "", MediaKind::Image),
            ".jpg"
        );
        assert_eq!(
            guess_extension("https://x.cdninstagram.com/v/blob", "image/png", MediaKind::Image),
            ".png"
        );
        assert_eq!(
            guess_extension("https://x.cdninstagram.com/v/blob", "", MediaKind::Video),
            ".mp4"
        );
    }
}
