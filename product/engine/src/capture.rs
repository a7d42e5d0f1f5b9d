//! Non-blocking hand-off from the browser's network callback to the classifier.

use crate::classify::{classify, ClassifierRules};
use crate::dedup::Deduplicator;
use crate::models::{url_for_log, MediaCandidate};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkEvent {
    pub url: String,
    pub content_type: String,
}

/// Cloneable producer handed to the automation layer.
#[derive(Debug, Clone)]
pub struct ResponseSink {
    tx: SyncSender<NetworkEvent>,
    dropped: Arc<AtomicUsize>,
}

impl ResponseSink {
    /// Enqueue without blocking. Returns `false` if the event was dropped.
    pub fn offer(&self, url: &str, content_type: &str) -> bool {
        let event = NetworkEvent {
            url: url.to_string(),
            content_type: content_type.to_string(),
        };
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }
}

pub struct CaptureQueue {
    rx: Receiver<NetworkEvent>,
    dropped: Arc<AtomicUsize>,
}

pub fn capture_channel(capacity: usize) -> (ResponseSink, CaptureQueue) {
    let (tx, rx) = sync_channel(capacity.max(1));
    let dropped = Arc::new(AtomicUsize::new(0));
    (
        ResponseSink {
            tx,
            dropped: Arc::clone(&dropped),
        },
        CaptureQueue { rx, dropped },
    )
}

impl CaptureQueue {
    /// Classify every pending event and keep the candidates the deduplicator accepts,
    /// in observation order.
    pub fn drain(&self, rules: &ClassifierRules, dedup: &Deduplicator) -> Vec<MediaCandidate> {
        let mut accepted = Vec::new();
        for event in self.rx.try_iter() {
            let Some(candidate) = classify(&event.url, &event.content_type, rules) else {
                continue;
            };
            if !dedup.should_accept(&candidate) {
                tracing::trace!(event = "media_seen_again", url = %url_for_log(&candidate.url));
                continue;
            }
            tracing::info!(
                event = "media_captured",
                kind = candidate.kind.as_str(),
                url = %url_for_log(&candidate.url),
            );
            accepted.push(candidate);
        }
        accepted
    }

    /// Throw away events left over from a previous page. Returns how many were discarded.
    pub fn discard_pending(&self) -> usize {
        self.rx.try_iter().count()
    }

    pub fn dropped_events(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}
