// crates/core/src/config.rs
//! Tracker timings and status-endpoint client settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::progress::ProgressMode;
use crate::schedule::BackoffPolicy;

/// Environment variable holding the API base URL.
pub const ENV_API_URL: &str = "JOBWATCH_API_URL";
/// Environment variable holding the bearer token.
pub const ENV_API_TOKEN: &str = "JOBWATCH_API_TOKEN";
/// Environment variable overriding the per-request timeout, in seconds.
pub const ENV_REQUEST_TIMEOUT: &str = "JOBWATCH_REQUEST_TIMEOUT_SECS";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Timing and behaviour of a tracking session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackerConfig {
    pub backoff: BackoffPolicy,
    /// Consecutive failed fetches tolerated before the job is failed.
    pub max_transport_attempts: u32,
    /// Wall-clock budget measured from the start of tracking.
    #[serde(with = "duration_ms", rename = "timeoutBudgetMs")]
    pub timeout_budget: Duration,
    #[serde(with = "duration_ms", rename = "progressTickMs")]
    pub progress_tick: Duration,
    pub progress_mode: ProgressMode,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            backoff: BackoffPolicy::default(),
            max_transport_attempts: 5,
            timeout_budget: Duration::from_millis(120_000),
            progress_tick: Duration::from_millis(500),
            progress_mode: ProgressMode::Simulated,
        }
    }
}

impl TrackerConfig {
    pub fn with_timeout_budget(mut self, budget: Duration) -> Self {
        self.timeout_budget = budget;
        self
    }

    pub fn with_progress_mode(mut self, mode: ProgressMode) -> Self {
        self.progress_mode = mode;
        self
    }
}

/// Where the status endpoint lives and how to authenticate against it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL without trailing slash, e.g. `https://api.example.com/api`.
    pub base_url: String,
    pub token: Option<String>,
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ConfigError> {
        let base_url = base_url.into();
        let parsed = reqwest::Url::parse(&base_url).map_err(|e| ConfigError::InvalidUrl {
            url: base_url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl {
                url: base_url,
                reason: format!("unsupported scheme {}", parsed.scheme()),
            });
        }
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.token = (!token.trim().is_empty()).then_some(token);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Build from `JOBWATCH_API_URL`, `JOBWATCH_API_TOKEN` and
    /// `JOBWATCH_REQUEST_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url =
            std::env::var(ENV_API_URL).map_err(|_| ConfigError::MissingVar(ENV_API_URL))?;
        let mut config = Self::new(base_url)?;
        if let Ok(token) = std::env::var(ENV_API_TOKEN) {
            config = config.with_token(token);
        }
        if let Ok(raw) = std::env::var(ENV_REQUEST_TIMEOUT) {
            let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidNumber {
                var: ENV_REQUEST_TIMEOUT,
                value: raw.clone(),
            })?;
            config = config.with_request_timeout(Duration::from_secs(secs));
        }
        Ok(config)
    }
}

/// Serde adapter storing a `Duration` as integer milliseconds.
pub mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
