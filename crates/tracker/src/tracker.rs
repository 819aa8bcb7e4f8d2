// crates/tracker/src/tracker.rs
//! Caller-facing handle that owns at most one tracking session.

use std::sync::Arc;

use jobwatch_core::{JobHandle, JobSnapshot, StatusFetcher, TrackerConfig};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::callbacks::JobCallbacks;
use crate::error::TrackerError;
use crate::session::{Session, SessionContext};
use crate::view::TrackerView;

struct ActiveSession {
    job_id: String,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Tracks one job at a time and turns its status into exactly one
/// `on_completed` or `on_failed` call.
///
/// Starting a new job stops the previous session first and waits for it to
/// exit, so no handler of the old job can run once the new one is tracked.
pub struct JobTracker {
    fetcher: Arc<dyn StatusFetcher>,
    config: TrackerConfig,
    callbacks: Arc<JobCallbacks>,
    enabled_tx: watch::Sender<bool>,
    view_tx: watch::Sender<TrackerView>,
    active: Option<ActiveSession>,
}

impl JobTracker {
    pub fn new(
        fetcher: Arc<dyn StatusFetcher>,
        config: TrackerConfig,
        callbacks: JobCallbacks,
    ) -> Self {
        let (enabled_tx, _) = watch::channel(true);
        let (view_tx, _) = watch::channel(TrackerView::default());
        Self {
            fetcher,
            config,
            callbacks: Arc::new(callbacks),
            enabled_tx,
            view_tx,
            active: None,
        }
    }

    /// Begin tracking `handle`, discarding any previous job.
    pub async fn start(&mut self, handle: JobHandle) -> Result<(), TrackerError> {
        self.launch(handle, None).await
    }

    /// Begin tracking with a snapshot the caller already holds (for example a
    /// generation request answered from cache). A terminal snapshot settles
    /// the session without a single poll.
    pub async fn start_with_initial(
        &mut self,
        handle: JobHandle,
        initial: JobSnapshot,
    ) -> Result<(), TrackerError> {
        self.launch(handle, Some(initial)).await
    }

    async fn launch(
        &mut self,
        handle: JobHandle,
        initial: Option<JobSnapshot>,
    ) -> Result<(), TrackerError> {
        if let Err(e) = self.stop().await {
            tracing::error!(error = %e, "previous tracking session ended abnormally");
        }

        let cancel = CancellationToken::new();
        self.view_tx.send_replace(TrackerView {
            job_id: Some(handle.job_id.clone()),
            family: Some(handle.family),
            started_at: Some(handle.started_at),
            is_polling: true,
            ..TrackerView::default()
        });

        let ctx = SessionContext {
            config: self.config.clone(),
            fetcher: Arc::clone(&self.fetcher),
            callbacks: Arc::clone(&self.callbacks),
            view_tx: self.view_tx.clone(),
            enabled_rx: self.enabled_tx.subscribe(),
            cancel: cancel.clone(),
        };
        let job_id = handle.job_id.clone();
        let task = tokio::spawn(Session::new(handle, ctx).run(initial));
        self.active = Some(ActiveSession {
            job_id,
            cancel,
            task,
        });
        Ok(())
    }

    /// Stop tracking: cancel pending polls, the timeout and progress ticks,
    /// and reset the view. Returns once the session task has exited.
    pub async fn stop(&mut self) -> Result<(), TrackerError> {
        let Some(active) = self.active.take() else {
            return Ok(());
        };
        active.cancel.cancel();
        let joined = active.task.await;
        self.view_tx.send_replace(TrackerView::default());
        tracing::debug!(job_id = %active.job_id, "tracking stopped");
        joined.map_err(TrackerError::from)
    }

    /// Wait until the current session ends on its own (terminal status,
    /// timeout, exhausted retries). The final view is kept. Does not return
    /// while tracking is paused and the job is unsettled.
    ///
    /// Cancel safe: if this future is dropped the session stays owned by the
    /// tracker, so `stop`, `start` and drop still cancel it.
    pub async fn settled(&mut self) -> Result<(), TrackerError> {
        let Some(active) = self.active.as_mut() else {
            return Ok(());
        };
        let joined = (&mut active.task).await;
        self.active = None;
        joined.map_err(TrackerError::from)
    }

    /// Pause (`false`) or resume (`true`) polling, timeout and progress
    /// activity without discarding state.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled_tx.send_replace(enabled);
    }

    pub fn is_enabled(&self) -> bool {
        *self.enabled_tx.borrow()
    }

    /// Enabled, a job is set, not timed out, and the last status is non-terminal.
    pub fn is_polling(&self) -> bool {
        self.is_enabled() && self.active.is_some() && self.view_tx.borrow().is_polling
    }

    pub fn current_job(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.job_id.as_str())
    }

    pub fn view(&self) -> TrackerView {
        self.view_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TrackerView> {
        self.view_tx.subscribe()
    }
}

impl Drop for JobTracker {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancel.cancel();
            active.task.abort();
        }
    }
}
