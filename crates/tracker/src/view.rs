// crates/tracker/src/view.rs
use chrono::{DateTime, Utc};
use jobwatch_core::{JobFamily, JobStatus};

/// What a presentation layer needs to render the current job.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackerView {
    pub job_id: Option<String>,
    pub family: Option<JobFamily>,
    /// When the caller handed the job over for tracking.
    pub started_at: Option<DateTime<Utc>>,
    /// Last status observed, `None` before the first snapshot.
    pub status: Option<JobStatus>,
    /// Projected progress in `[0, 100]`.
    pub displayed_percent: f64,
    /// Latest progress message from the backend, if it sends one.
    pub message: Option<String>,
    /// The session is still polling (ignores the pause switch).
    pub is_polling: bool,
    pub timed_out: bool,
}
