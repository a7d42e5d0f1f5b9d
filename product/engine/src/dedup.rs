use crate::models::MediaCandidate;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct DedupState {
    seen_urls: HashSet<String>,
    seen_hashes: HashSet<String>,
}

#[derive(Debug, Default)]
pub struct Deduplicator {
    state: Mutex<DedupState>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, DedupState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Marks the candidate's URL as seen. Returns `false` when it was already seen.
    pub fn should_accept(&self, candidate: &MediaCandidate) -> bool {
        self.lock().seen_urls.insert(candidate.url.clone())
    }

    /// Marks a content hash as stored without checking it first.
    pub fn record_content_hash(&self, hash: &str) {
        self.lock().seen_hashes.insert(hash.to_string());
    }

    pub fn has_content_hash(&self, hash: &str) -> bool {
        self.lock().seen_hashes.contains(hash)
    }

    /// Atomic check-then-mark on the content hash. Returns `true` for the first caller only.
    pub fn admit_content(&self, hash: &str) -> bool {
        self.lock().seen_hashes.insert(hash.to_string())
    }

    /// Undo an admission whose file could not be written.
    pub fn release_content(&self, hash: &str) {
        self.lock().seen_hashes.remove(hash);
    }

    pub fn seen_url_count(&self) -> usize {
        self.lock().seen_urls.len()
    }

    pub fn content_hash_count(&self) -> usize {
        self.lock().seen_hashes.len()
    }

    pub fn reset(&self) {
        let mut state = self.lock();
        state.seen_urls.clear();
        state.seen_hashes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MediaKind;
    use std::sync::Arc;

    fn candidate(url: &str) -> MediaCandidate {
        MediaCandidate::new(url, MediaKind::Image)
    }

    #[test]
    fn each_distinct_url_is_accepted_exactly_once() {
        let dedup = Deduplicator::new();
        let observed = [
            "https://x.cdninstagram.com/a.jpg",
            "https://x.cdninstagram.com/b.jpg",
            "https://x.cdninstagram.com/a.jpg",
            "https://x.cdninstagram.com/A.jpg",
            "https://x.cdninstagram.com/b.jpg",
            "https://x.cdninstagram.com/a.jpg",
        ];
        let accepted: Vec<&str> = observed
            .iter()
            .copied()
            .filter(|url| dedup.should_accept(&candidate(url)))
            .collect();
        assert_eq!(
            accepted,
            vec![
                "https://x.cdninstagram.com/a.jpg",
                "https://x.cdninstagram.com/b.jpg",
                "https://x.cdninstagram.com/A.jpg",
            ]
        );
        assert_eq!(dedup.seen_url_count(), 3);
    }

    #[test]
    fn content_hash_admission_is_first_come() {
        let dedup = Deduplicator::new();
        assert!(dedup.admit_content("abc"));
        assert!(!dedup.admit_content("abc"));
        assert_eq!(dedup.content_hash_count(), 1);

        dedup.release_content("abc");
        assert_eq!(dedup.content_hash_count(), 0);
        assert!(dedup.admit_content("abc"));
        assert!(dedup.admit_content("def"));
        assert_eq!(dedup.content_hash_count(), 2);
    }

    #[test]
    fn recorded_hashes_are_reported_and_block_admission() {
        let dedup = Deduplicator::new();
        assert!(!dedup.has_content_hash("abc"));
        dedup.record_content_hash("abc");
        dedup.record_content_hash("abc");
        assert!(dedup.has_content_hash("abc"));
        assert_eq!(dedup.content_hash_count(), 1);
        assert!(!dedup.admit_content("abc"));

        assert!(dedup.admit_content("def"));
        assert!(dedup.has_content_hash("def"));
        dedup.release_content("def");
        assert!(!dedup.has_content_hash("def"));
    }

    #[test]
    fn concurrent_admission_lets_one_thread_win() {
        let dedup = Arc::new(Deduplicator::new());
        let winners: usize = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let dedup = Arc::clone(&dedup);
                    s.spawn(move || dedup.admit_content("same-bytes") as usize)
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().expect("join"))
                .sum()
        });
        assert_eq!(winners, 1);
    }

    #[test]
    fn reset_forgets_everything() {
        let dedup = Deduplicator::new();
        assert!(dedup.should_accept(&candidate("https://x.cdninstagram.com/a.jpg")));
        assert!(dedup.admit_content("abc"));
        dedup.reset();
        assert!(dedup.should_accept(&candidate("https://x.cdninstagram.com/a.jpg")));
        assert!(dedup.admit_content("abc"));
    }
}
