// crates/core/src/schedule.rs
//! Poll cadence: bounded exponential backoff and the stop rule.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::duration_ms;
use crate::types::PollingState;

/// `min(base * multiplier^attempt, cap)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackoffPolicy {
    #[serde(with = "duration_ms", rename = "baseMs")]
    pub base: Duration,
    pub multiplier: u32,
    #[serde(with = "duration_ms", rename = "capMs")]
    pub cap: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(500),
            multiplier: 3,
            cap: Duration::from_millis(10_000),
        }
    }
}

impl BackoffPolicy {
    /// Delay before the poll numbered `attempt` (zero-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base
            .checked_mul(factor)
            .map_or(self.cap, |d| d.min(self.cap))
    }
}

/// What the session should do after the latest observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollDecision {
    Wait(Duration),
    Stop,
}

/// Decides when the status endpoint is queried next.
#[derive(Debug, Clone, Default)]
pub struct PollScheduler {
    policy: BackoffPolicy,
}

impl PollScheduler {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Schedule the next poll, or stop for good once the last observed status
    /// is terminal or the job timed out. Each scheduled poll bumps
    /// `attempt_count`.
    pub fn next(&self, state: &mut PollingState) -> PollDecision {
        if !state.is_polling() {
            return PollDecision::Stop;
        }
        let delay = self.policy.delay(state.attempt_count);
        state.attempt_count = state.attempt_count.saturating_add(1);
        PollDecision::Wait(delay)
    }
}

/// Outcome of recording a failed fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry(Duration),
    /// The attempt cap was reached; `attempts` fetches failed in a row.
    Exhausted { attempts: u32 },
}

/// Retry budget for fetches that never reached the backend. Uses the poll
/// backoff family keyed on consecutive failures.
#[derive(Debug, Clone)]
pub struct TransportRetry {
    policy: BackoffPolicy,
    max_attempts: u32,
    failures: u32,
}

impl TransportRetry {
    pub fn new(policy: BackoffPolicy, max_attempts: u32) -> Self {
        Self {
            policy,
            max_attempts: max_attempts.max(1),
            failures: 0,
        }
    }

    pub fn record_failure(&mut self) -> RetryDecision {
        self.failures += 1;
        if self.failures >= self.max_attempts {
            return RetryDecision::Exhausted {
                attempts: self.failures,
            };
        }
        RetryDecision::Retry(self.policy.delay(self.failures - 1))
    }

    /// A fetch got through; the budget starts over.
    pub fn reset(&mut self) {
        self.failures = 0;
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::JobStatus;
    use pretty_assertions::assert_eq;

    fn ms(d: Duration) -> u64 {
        d.as_millis() as u64
    }

    #[test]
    fn test_backoff_sequence() {
        let scheduler = PollScheduler::default();
        let mut state = PollingState::default();
        let mut delays = Vec::new();
        for _ in 0..5 {
            match scheduler.next(&mut state) {
                PollDecision::Wait(d) => delays.push(ms(d)),
                PollDecision::Stop => panic!("scheduler stopped early"),
            }
        }
        assert_eq!(delays, vec![500, 1500, 4500, 10_000, 10_000]);
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(state.attempt_count, 5);
    }

    #[test]
    fn test_backoff_saturates_at_cap() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay(40), policy.cap);
        assert_eq!(policy.delay(u32::MAX), policy.cap);
    }

    #[test]
    fn test_stops_on_terminal_status() {
        let scheduler = PollScheduler::default();
        for status in [JobStatus::Completed, JobStatus::Failed] {
            let mut state = PollingState {
                previous_status: Some(status),
                ..PollingState::default()
            };
            assert_eq!(scheduler.next(&mut state), PollDecision::Stop);
            assert_eq!(state.attempt_count, 0);
        }
    }

    #[test]
    fn test_continues_on_active_status() {
        let scheduler = PollScheduler::default();
        let mut state = PollingState {
            previous_status: Some(JobStatus::Active),
            ..PollingState::default()
        };
        assert_eq!(
            scheduler.next(&mut state),
            PollDecision::Wait(Duration::from_millis(500))
        );
    }

    #[test]
    fn test_stops_once_settled() {
        let scheduler = PollScheduler::default();
        let mut state = PollingState {
            previous_status: Some(JobStatus::Active),
            settled: true,
            ..PollingState::default()
        };
        assert_eq!(scheduler.next(&mut state), PollDecision::Stop);
    }

    #[test]
    fn test_stops_after_timeout() {
        let scheduler = PollScheduler::default();
        let mut state = PollingState {
            timed_out: true,
            ..PollingState::default()
        };
        assert_eq!(scheduler.next(&mut state), PollDecision::Stop);
    }

    #[test]
    fn test_transport_retry_exhausts_at_cap() {
        let mut retry = TransportRetry::new(BackoffPolicy::default(), 5);
        let mut decisions = Vec::new();
        for _ in 0..5 {
            decisions.push(retry.record_failure());
        }
        assert_eq!(
            decisions,
            vec![
                RetryDecision::Retry(Duration::from_millis(500)),
                RetryDecision::Retry(Duration::from_millis(1500)),
                RetryDecision::Retry(Duration::from_millis(4500)),
                RetryDecision::Retry(Duration::from_millis(10_000)),
                RetryDecision::Exhausted { attempts: 5 },
            ]
        );
    }

    #[test]
    fn test_transport_retry_reset() {
        let mut retry = TransportRetry::new(BackoffPolicy::default(), 5);
        retry.record_failure();
        retry.record_failure();
        retry.reset();
        assert_eq!(retry.failures(), 0);
        assert_eq!(
            retry.record_failure(),
            RetryDecision::Retry(Duration::from_millis(500))
        );
    }
}
