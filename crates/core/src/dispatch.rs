// crates/core/src/dispatch.rs
//! Exactly-once delivery of the terminal events.
//!
//! Every snapshot a session observes (polled, synthesized by the timeout, or
//! handed in by the caller) goes through [`dispatch`]. An event fires only on
//! a transition into a terminal status, and only if no terminal event has
//! fired yet for this session. The outcome therefore does not depend on the
//! order in which racing timers deliver their snapshots.

use serde_json::Value;

use crate::normalize::normalize_error;
use crate::types::{JobSnapshot, JobStatus, PollingState};

/// Message used when a failed snapshot carries no error text.
pub const DEFAULT_FAILURE_MESSAGE: &str = "Job failed";

/// A terminal event for the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    /// The job's result payload, passed through untouched (`Null` if absent).
    Completed(Value),
    /// A short, user-presentable failure message.
    Failed(String),
}

/// Compare `snapshot` against the remembered status and decide whether an
/// event fires. `previous_status` is updated unconditionally.
pub fn dispatch(state: &mut PollingState, snapshot: &JobSnapshot) -> Option<JobEvent> {
    let previous = state.previous_status.replace(snapshot.status);

    if state.settled {
        tracing::debug!(
            job_id = %snapshot.job_id,
            status = %snapshot.status,
            "snapshot after settlement ignored"
        );
        return None;
    }

    let event = match snapshot.status {
        JobStatus::Completed if previous != Some(JobStatus::Completed) => Some(
            JobEvent::Completed(snapshot.result.clone().unwrap_or(Value::Null)),
        ),
        JobStatus::Failed if previous != Some(JobStatus::Failed) => {
            Some(JobEvent::Failed(failure_message(snapshot)))
        }
        _ => None,
    };

    if event.is_some() {
        state.settled = true;
    } else if previous != Some(snapshot.status) {
        tracing::debug!(
            job_id = %snapshot.job_id,
            from = ?previous,
            to = %snapshot.status,
            "job status changed"
        );
    }
    event
}

fn failure_message(snapshot: &JobSnapshot) -> String {
    match snapshot.error.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => normalize_error(raw),
        _ => DEFAULT_FAILURE_MESSAGE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn run(snapshots: &[JobSnapshot]) -> Vec<JobEvent> {
        let mut state = PollingState::default();
        snapshots
            .iter()
            .filter_map(|s| dispatch(&mut state, s))
            .collect()
    }

    #[test]
    fn test_waiting_active_completed_fires_once() {
        let events = run(&[
            JobSnapshot::new("j1", JobStatus::Waiting),
            JobSnapshot::new("j1", JobStatus::Active),
            JobSnapshot::completed("j1", json!({"quizId": 7})),
        ]);
        assert_eq!(events, vec![JobEvent::Completed(json!({"quizId": 7}))]);
    }

    #[test]
    fn test_replayed_completed_does_not_refire() {
        let done = JobSnapshot::completed("j1", json!(1));
        let events = run(&[done.clone(), done.clone(), done]);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_replayed_failed_does_not_refire() {
        let failed = JobSnapshot::failed("j1", "boom");
        let events = run(&[failed.clone(), failed.clone(), failed]);
        assert_eq!(events, vec![JobEvent::Failed("boom".into())]);
    }

    #[test]
    fn test_never_both_completed_and_failed() {
        let timeout = JobSnapshot::failed("j1", "taking longer than expected");
        let late = JobSnapshot::completed("j1", json!({"late": true}));
        assert_eq!(
            run(&[JobSnapshot::new("j1", JobStatus::Active), timeout.clone(), late.clone()]),
            vec![JobEvent::Failed("taking longer than expected".into())]
        );
        assert_eq!(
            run(&[late, timeout]),
            vec![JobEvent::Completed(json!({"late": true}))]
        );
    }

    #[test]
    fn test_arbitrary_sequences_fire_at_most_one_event() {
        let statuses = [
            JobStatus::Waiting,
            JobStatus::Active,
            JobStatus::Completed,
            JobStatus::Failed,
        ];
        // Every sequence of length 4 over the four statuses.
        for n in 0..(4u32.pow(4)) {
            let seq: Vec<JobSnapshot> = (0..4)
                .map(|i| JobSnapshot::new("j", statuses[((n / 4u32.pow(i)) % 4) as usize]))
                .collect();
            let events = run(&seq);
            assert!(events.len() <= 1, "sequence {n} fired {events:?}");
            let first_terminal = seq.iter().find(|s| s.status.is_terminal());
            assert_eq!(events.len(), usize::from(first_terminal.is_some()));
        }
    }

    #[test]
    fn test_completed_without_result_is_null() {
        assert_eq!(
            run(&[JobSnapshot::new("j1", JobStatus::Completed)]),
            vec![JobEvent::Completed(Value::Null)]
        );
    }

    #[test]
    fn test_failed_without_error_uses_default() {
        assert_eq!(
            run(&[JobSnapshot::new("j1", JobStatus::Failed)]),
            vec![JobEvent::Failed(DEFAULT_FAILURE_MESSAGE.into())]
        );
        assert_eq!(
            run(&[JobSnapshot::failed("j1", "   ")]),
            vec![JobEvent::Failed(DEFAULT_FAILURE_MESSAGE.into())]
        );
    }

    #[test]
    fn test_failure_message_is_normalized() {
        let raw = format!("AI generation failed: Source text is empty. {}", "x".repeat(400));
        assert_eq!(
            run(&[JobSnapshot::failed("j1", raw)]),
            vec![JobEvent::Failed("AI generation failed: Source text is empty".into())]
        );
    }

    #[test]
    fn test_previous_status_tracks_last_snapshot() {
        let mut state = PollingState::default();
        dispatch(&mut state, &JobSnapshot::new("j1", JobStatus::Active));
        assert_eq!(state.previous_status, Some(JobStatus::Active));
        dispatch(&mut state, &JobSnapshot::failed("j1", "x"));
        dispatch(&mut state, &JobSnapshot::completed("j1", json!(null)));
        assert_eq!(state.previous_status, Some(JobStatus::Completed));
        assert!(state.settled);
    }
}
