// crates/tracker/src/error.rs
use thiserror::Error;

/// Errors surfaced by `JobTracker` control methods. Job outcomes are never
/// reported here; they only reach the caller through the callbacks.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Tracking session task panicked: {0}")]
    SessionPanicked(String),
}

impl From<tokio::task::JoinError> for TrackerError {
    fn from(err: tokio::task::JoinError) -> Self {
        TrackerError::SessionPanicked(err.to_string())
    }
}
