// crates/core/src/types.rs
//! Data model for a tracked generation job.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Which generation pipeline a job belongs to. Selects the status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobFamily {
    Quiz,
    Flashcard,
    Content,
}

impl JobFamily {
    /// Path segment used by the status endpoint (`{family}/status/{job_id}`).
    pub fn as_path(&self) -> &'static str {
        match self {
            JobFamily::Quiz => "quiz",
            JobFamily::Flashcard => "flashcard",
            JobFamily::Content => "content",
        }
    }
}

impl fmt::Display for JobFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_path())
    }
}

impl FromStr for JobFamily {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quiz" | "quizzes" => Ok(JobFamily::Quiz),
            "flashcard" | "flashcards" => Ok(JobFamily::Flashcard),
            "content" => Ok(JobFamily::Content),
            other => Err(ConfigError::UnknownFamily(other.to_string())),
        }
    }
}

/// Backend-reported job status.
///
/// Queue states that are neither running nor finished (`delayed`, `paused`,
/// `prioritized`, `waiting-children`) are folded into `Waiting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[serde(alias = "delayed", alias = "paused", alias = "prioritized", alias = "waiting-children")]
    Waiting,
    Active,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Waiting => "waiting",
            JobStatus::Active => "active",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress as reported by the backend: either a bare number or an object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobProgress {
    Percent(f64),
    Detail {
        #[serde(default)]
        percent: Option<f64>,
        #[serde(default)]
        message: Option<String>,
    },
}

impl JobProgress {
    pub fn percent(&self) -> Option<f64> {
        match self {
            JobProgress::Percent(p) => Some(*p),
            JobProgress::Detail { percent, .. } => *percent,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            JobProgress::Percent(_) => None,
            JobProgress::Detail { message, .. } => message.as_deref(),
        }
    }
}

/// One observation of a job, as returned by the status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    #[serde(default, alias = "id")]
    pub job_id: String,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<JobProgress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobSnapshot {
    pub fn new(job_id: impl Into<String>, status: JobStatus) -> Self {
        Self {
            job_id: job_id.into(),
            status,
            progress: None,
            result: None,
            error: None,
        }
    }

    /// A completed snapshot carrying `result`.
    pub fn completed(job_id: impl Into<String>, result: serde_json::Value) -> Self {
        Self {
            result: Some(result),
            ..Self::new(job_id, JobStatus::Completed)
        }
    }

    /// A failure produced by this subsystem rather than by the backend
    /// (timeout, 404, exhausted transport retries).
    pub fn failed(job_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(job_id, JobStatus::Failed)
        }
    }

    pub fn with_progress(mut self, progress: JobProgress) -> Self {
        self.progress = Some(progress);
        self
    }
}

/// The job a tracking session is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub job_id: String,
    pub family: JobFamily,
    pub started_at: DateTime<Utc>,
}

impl JobHandle {
    pub fn new(job_id: impl Into<String>, family: JobFamily) -> Self {
        Self {
            job_id: job_id.into(),
            family,
            started_at: Utc::now(),
        }
    }
}

/// Per-session polling bookkeeping. A fresh session always starts from
/// `PollingState::default()`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollingState {
    /// Polls scheduled so far.
    pub attempt_count: u32,
    /// Status of the last snapshot seen by the dispatcher.
    pub previous_status: Option<JobStatus>,
    pub timed_out: bool,
    /// A terminal event has been delivered; nothing else may fire.
    pub settled: bool,
}

impl PollingState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Whether the session would still poll, ignoring the pause switch.
    pub fn is_polling(&self) -> bool {
        !self.timed_out
            && !self.settled
            && !self.previous_status.is_some_and(|s| s.is_terminal())
    }
}

/// The percentage shown to the user, always within `[0, 100]`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProjectedProgress {
    pub displayed_percent: f64,
}
