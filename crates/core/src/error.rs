// crates/core/src/error.rs
use thiserror::Error;

/// Errors that can occur when querying the job status endpoint
#[derive(Debug, Error)]
pub enum FetchError {
    /// The job expired or never existed. Terminal, never retried.
    #[error("{message}")]
    NotFound { message: String },

    #[error("Status endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Could not reach status endpoint: {0}")]
    Transport(String),

    #[error("Malformed status response: {0}")]
    Decode(String),
}

impl FetchError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Terminal errors become a failed snapshot immediately; everything
    /// else goes through transport retry.
    pub fn is_terminal(&self) -> bool {
        matches!(self, FetchError::NotFound { .. })
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Decode(err.to_string())
    }
}

/// Errors that can occur while assembling configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid base URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Invalid value for {var}: {value}")]
    InvalidNumber { var: &'static str, value: String },

    #[error("Unknown job family: {0} (expected quiz, flashcard or content)")]
    UnknownFamily(String),

    #[error("Could not build HTTP client: {0}")]
    Client(String),
}
