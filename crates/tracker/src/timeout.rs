// crates/tracker/src/timeout.rs
//! Wall-clock watchdog for one tracking session.

use std::pin::Pin;
use std::time::Duration;

use jobwatch_core::JobSnapshot;
use tokio::time::{Instant, Sleep};

/// Failure message raised when the budget runs out.
pub const TIMEOUT_MESSAGE: &str =
    "This is taking longer than expected. The job may still finish; please check back later.";

/// A single deferred failure, armed when tracking begins.
///
/// The deadline is fixed at construction and does not move with polls. Once
/// fired or disarmed it never fires again.
pub struct TimeoutGuard {
    sleep: Pin<Box<Sleep>>,
    deadline: Instant,
    armed: bool,
}

impl TimeoutGuard {
    pub fn start(budget: Duration) -> Self {
        let deadline = Instant::now() + budget;
        Self {
            sleep: Box::pin(tokio::time::sleep_until(deadline)),
            deadline,
            armed: true,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Resolves once the deadline has passed. Only meaningful while armed;
    /// callers gate on [`is_armed`](Self::is_armed).
    pub async fn expired(&mut self) {
        self.sleep.as_mut().await;
    }

    /// Consume the guard's single shot and produce the synthetic failure.
    pub fn fire(&mut self, job_id: &str) -> JobSnapshot {
        self.armed = false;
        JobSnapshot::failed(job_id, TIMEOUT_MESSAGE)
    }

    pub fn disarm(&mut self) {
        self.armed = false;
    }
}
