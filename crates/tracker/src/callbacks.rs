// crates/tracker/src/callbacks.rs
//! The two caller-facing events.

use jobwatch_core::JobEvent;
use serde_json::Value;

type CompletedFn = Box<dyn Fn(Value) + Send + Sync>;
type FailedFn = Box<dyn Fn(String) + Send + Sync>;

/// Optional `on_completed` / `on_failed` handlers.
///
/// Handlers run on the session task. They must not block; to start or stop
/// tracking from a handler, hand the request off to another task.
#[derive(Default)]
pub struct JobCallbacks {
    on_completed: Option<CompletedFn>,
    on_failed: Option<FailedFn>,
}

impl JobCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_completed(mut self, f: impl Fn(Value) + Send + Sync + 'static) -> Self {
        self.on_completed = Some(Box::new(f));
        self
    }

    pub fn on_failed(mut self, f: impl Fn(String) + Send + Sync + 'static) -> Self {
        self.on_failed = Some(Box::new(f));
        self
    }

    pub(crate) fn deliver(&self, event: JobEvent) {
        match event {
            JobEvent::Completed(result) => {
                if let Some(f) = &self.on_completed {
                    f(result);
                }
            }
            JobEvent::Failed(message) => {
                if let Some(f) = &self.on_failed {
                    f(message);
                }
            }
        }
    }
}

impl std::fmt::Debug for JobCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobCallbacks")
            .field("on_completed", &self.on_completed.is_some())
            .field("on_failed", &self.on_failed.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_deliver_routes_events() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (a, b) = (Arc::clone(&seen), Arc::clone(&seen));
        let callbacks = JobCallbacks::new()
            .on_completed(move |v| a.lock().unwrap().push(format!("done:{v}")))
            .on_failed(move |m| b.lock().unwrap().push(format!("fail:{m}")));

        callbacks.deliver(JobEvent::Completed(serde_json::json!(3)));
        callbacks.deliver(JobEvent::Failed("nope".into()));

        assert_eq!(*seen.lock().unwrap(), vec!["done:3", "fail:nope"]);
    }

    #[test]
    fn test_missing_handlers_are_noops() {
        let callbacks = JobCallbacks::default();
        callbacks.deliver(JobEvent::Completed(serde_json::Value::Null));
        callbacks.deliver(JobEvent::Failed("ignored".into()));
        assert_eq!(
            format!("{callbacks:?}"),
            "JobCallbacks { on_completed: false, on_failed: false }"
        );
    }
}
