// crates/tracker/src/session.rs
//! One tracking session: owns every timer and all state scoped to a single
//! job. Polling, the timeout and progress ticks are multiplexed on one task,
//! so job state needs no locking; their relative order is still a race, which
//! the dispatcher's settle guard makes harmless.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use jobwatch_core::{
    dispatch, FetchError, JobEvent, JobHandle, JobSnapshot, PollDecision, PollScheduler,
    PollingState, ProgressMode, ProgressProjector, RetryDecision, StatusFetcher, TrackerConfig, TransportRetry,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, Sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::callbacks::JobCallbacks;
use crate::timeout::TimeoutGuard;
use crate::view::TrackerView;

/// Prefix of the failure raised when the status endpoint stays unreachable.
pub const TRANSPORT_FAILURE_MESSAGE: &str = "Unable to reach the job status service";

type FetchResult = Result<JobSnapshot, FetchError>;

/// Everything a session borrows from its tracker.
pub(crate) struct SessionContext {
    pub config: TrackerConfig,
    pub fetcher: Arc<dyn StatusFetcher>,
    pub callbacks: Arc<JobCallbacks>,
    pub view_tx: watch::Sender<TrackerView>,
    pub enabled_rx: watch::Receiver<bool>,
    pub cancel: CancellationToken,
}

pub(crate) struct Session {
    handle: JobHandle,
    ctx: SessionContext,
    state: PollingState,
    scheduler: PollScheduler,
    retry: TransportRetry,
    projector: ProgressProjector,
    message: Option<String>,
    polls: u32,
    started: Instant,
}

enum Step {
    Wait(Duration),
    Settled,
}

impl Session {
    pub(crate) fn new(handle: JobHandle, ctx: SessionContext) -> Self {
        let config = &ctx.config;
        Self {
            scheduler: PollScheduler::new(config.backoff),
            retry: TransportRetry::new(config.backoff, config.max_transport_attempts),
            projector: ProgressProjector::new(config.progress_mode),
            handle,
            ctx,
            state: PollingState::default(),
            message: None,
            polls: 0,
            started: Instant::now(),
        }
    }

    pub(crate) async fn run(mut self, initial: Option<JobSnapshot>) {
        info!(
            job_id = %self.handle.job_id,
            family = %self.handle.family,
            started_at = %self.handle.started_at.to_rfc3339(),
            timeout_ms = self.ctx.config.timeout_budget.as_millis() as u64,
            "tracking started"
        );
        let mut timeout = TimeoutGuard::start(self.ctx.config.timeout_budget);
        self.projector.activate();
        self.publish();

        if let Some(snapshot) = initial {
            debug!(job_id = %self.handle.job_id, status = %snapshot.status, "applying initial snapshot");
            if self.apply(snapshot) {
                self.finish("settled from initial snapshot");
                return;
            }
        }

        let (result_tx, mut result_rx) = mpsc::channel::<FetchResult>(1);
        let mut in_flight: Option<JoinHandle<()>> = None;
        let mut poll = PollTimer::new();
        if let Step::Wait(delay) = self.schedule() {
            poll.arm(delay);
        }

        let tick = self.ctx.config.progress_tick;
        let mut ticker = tokio::time::interval_at(Instant::now() + tick, tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut rng = StdRng::from_entropy();
        // Reported progress only moves when a snapshot arrives.
        let simulated = self.projector.mode() == ProgressMode::Simulated;

        let outcome = loop {
            let enabled = *self.ctx.enabled_rx.borrow_and_update();

            tokio::select! {
                biased;

                _ = self.ctx.cancel.cancelled() => break "cancelled",

                changed = self.ctx.enabled_rx.changed() => {
                    if changed.is_err() {
                        break "tracker dropped";
                    }
                    debug!(
                        job_id = %self.handle.job_id,
                        enabled = *self.ctx.enabled_rx.borrow(),
                        "tracking enabled state changed"
                    );
                }

                _ = timeout.expired(), if enabled && timeout.is_armed() => {
                    warn!(
                        job_id = %self.handle.job_id,
                        polls = self.polls,
                        "job exceeded its wall-clock budget"
                    );
                    self.state.timed_out = true;
                    let snapshot = timeout.fire(&self.handle.job_id);
                    self.apply(snapshot);
                    break "timed out";
                }

                Some(result) = result_rx.recv(), if enabled && in_flight.is_some() => {
                    in_flight = None;
                    match self.on_fetch(result) {
                        Step::Wait(delay) => poll.arm(delay),
                        Step::Settled => break "settled",
                    }
                }

                _ = poll.elapsed(), if enabled && poll.is_armed() && in_flight.is_none() => {
                    poll.disarm();
                    in_flight = Some(self.spawn_fetch(result_tx.clone()));
                }

                _ = ticker.tick(), if enabled && simulated && self.projector.is_ticking() => {
                    self.projector.tick(&mut rng);
                    self.publish();
                }
            }
        };

        if let Some(task) = in_flight.take() {
            task.abort();
        }
        timeout.disarm();
        self.finish(outcome);
    }

    fn spawn_fetch(&mut self, tx: mpsc::Sender<FetchResult>) -> JoinHandle<()> {
        self.polls += 1;
        debug!(
            job_id = %self.handle.job_id,
            poll = self.polls,
            attempt = self.state.attempt_count,
            "polling job status"
        );
        let fetcher = Arc::clone(&self.ctx.fetcher);
        let family = self.handle.family;
        let job_id = self.handle.job_id.clone();
        tokio::spawn(async move {
            let result = fetcher.fetch_status(family, &job_id).await;
            // The session may already be gone.
            let _ = tx.send(result).await;
        })
    }

    fn on_fetch(&mut self, result: FetchResult) -> Step {
        match result {
            Ok(snapshot) => {
                self.retry.reset();
                debug!(job_id = %self.handle.job_id, status = %snapshot.status, "status received");
                if self.apply(snapshot) {
                    return Step::Settled;
                }
                self.schedule()
            }
            Err(err) if err.is_terminal() => {
                info!(job_id = %self.handle.job_id, error = %err, "job unknown to backend");
                let snapshot = JobSnapshot::failed(&self.handle.job_id, err.to_string());
                self.apply(snapshot);
                Step::Settled
            }
            Err(err) => match self.retry.record_failure() {
                RetryDecision::Retry(delay) => {
                    warn!(
                        job_id = %self.handle.job_id,
                        attempt = self.retry.failures(),
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "status fetch failed, retrying"
                    );
                    Step::Wait(delay)
                }
                RetryDecision::Exhausted { attempts } => {
                    warn!(
                        job_id = %self.handle.job_id,
                        attempts,
                        error = %err,
                        "status endpoint unreachable, giving up"
                    );
                    let snapshot = JobSnapshot::failed(
                        &self.handle.job_id,
                        format!("{TRANSPORT_FAILURE_MESSAGE}: {err}"),
                    );
                    self.apply(snapshot);
                    Step::Settled
                }
            },
        }
    }

    fn schedule(&mut self) -> Step {
        match self.scheduler.next(&mut self.state) {
            PollDecision::Wait(delay) => Step::Wait(delay),
            PollDecision::Stop => Step::Settled,
        }
    }

    /// Feed one snapshot through progress projection and the dispatcher.
    /// Returns true once the session has nothing left to do.
    fn apply(&mut self, snapshot: JobSnapshot) -> bool {
        if let Some(progress) = &snapshot.progress {
            if let Some(percent) = progress.percent() {
                self.projector.report(percent);
            }
            if let Some(message) = progress.message() {
                self.message = Some(message.to_string());
            }
        }
        self.projector.observe(snapshot.status);

        let event = dispatch(&mut self.state, &snapshot);
        self.publish();

        if let Some(event) = event {
            match &event {
                JobEvent::Completed(_) => {
                    info!(job_id = %self.handle.job_id, polls = self.polls, "job completed")
                }
                JobEvent::Failed(message) => {
                    info!(job_id = %self.handle.job_id, polls = self.polls, %message, "job failed")
                }
            }
            self.ctx.callbacks.deliver(event);
        }
        !self.state.is_polling()
    }

    fn publish(&self) {
        self.ctx.view_tx.send_replace(TrackerView {
            job_id: Some(self.handle.job_id.clone()),
            family: Some(self.handle.family),
            started_at: Some(self.handle.started_at),
            status: self.state.previous_status,
            displayed_percent: self.projector.displayed(),
            message: self.message.clone(),
            is_polling: self.state.is_polling(),
            timed_out: self.state.timed_out,
        });
    }

    fn finish(&self, outcome: &str) {
        info!(
            job_id = %self.handle.job_id,
            outcome,
            polls = self.polls,
            transport_failures = self.retry.failures(),
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "tracking session ended"
        );
    }
}

/// Re-armable poll delay backed by a single `Sleep`.
struct PollTimer {
    sleep: Pin<Box<Sleep>>,
    armed: bool,
}

impl PollTimer {
    fn new() -> Self {
        Self {
            sleep: Box::pin(tokio::time::sleep(Duration::ZERO)),
            armed: false,
        }
    }

    fn arm(&mut self, delay: Duration) {
        self.sleep.as_mut().reset(Instant::now() + delay);
        self.armed = true;
    }

    fn disarm(&mut self) {
        self.armed = false;
    }

    fn is_armed(&self) -> bool {
        self.armed
    }

    async fn elapsed(&mut self) {
        self.sleep.as_mut().await;
    }
}
