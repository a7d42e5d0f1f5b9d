use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("failed to parse config at {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("browser automation failed: {0}")]
    Automation(String),

    #[error("login failed: {0}")]
    Login(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Per-candidate download failure. Never aborts a run; carried inside
/// `FetchOutcome::Failed` and logged with the offending URL.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("timed out fetching {url}")]
    Timeout { url: String },

    #[error("http status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("transport error for {url}: {reason}")]
    Transport { url: String, reason: String },

    #[error("failed to store {url}: {reason}")]
    Io { url: String, reason: String },
}

impl FetchError {
    pub fn url(&self) -> &str {
        match self {
            FetchError::Timeout { url }
            | FetchError::Status { url, .. }
            | FetchError::Transport { url, .. }
            | FetchError::Io { url, .. } => url,
        }
    }

    /// Timeouts, connection problems and 5xx responses may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout { .. } | FetchError::Transport { .. } => true,
            FetchError::Status { status, .. } => *status >= 500,
            FetchError::Io { .. } => false,
        }
    }
}
