use crate::models::PostStats;
use crate::Result;
use std::path::{Path, PathBuf};

/// Ordered, run-scoped log of per-post statistics persisted as a JSON array.
#[derive(Debug)]
pub struct StatsRecorder {
    path: PathBuf,
    entries: Vec<PostStats>,
    flush_each_record: bool,
}

impl StatsRecorder {
    pub fn new(path: PathBuf, flush_each_record: bool) -> Self {
        Self {
            path,
            entries: Vec::new(),
            flush_each_record,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &[PostStats] {
        &self.entries
    }

    /// Append one post. With per-record flushing enabled the whole log is
    /// rewritten immediately so a crash loses at most the post in flight.
    pub fn record(&mut self, stats: PostStats) -> Result<()> {
        self.entries.push(stats);
        if self.flush_each_record {
            self.flush()?;
        }
        Ok(())
    }

    /// Rewrite the stats file with the full sequence (pretty-printed, UTF-8).
    pub fn flush(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.entries)?;
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, format!("{json}\n"))?;
        std::fs::rename(&tmp_path, &self.path)?;
        tracing::debug!(
            event = "stats_flushed",
            path = %self.path.display(),
            posts = self.entries.len(),
        );
        Ok(())
    }
}

pub fn load_stats(path: &Path) -> Result<Vec<PostStats>> {
    let bytes = std::fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}
