// crates/tracker/src/lib.rs
//! Async job tracking on tokio.
//!
//! Provides:
//! - `JobTracker`: starts, switches, pauses and stops tracking of one job
//! - `JobCallbacks`: the `on_completed` / `on_failed` handlers
//! - `TimeoutGuard`: wall-clock budget for a session
//! - `TrackerView`: watch-channel view for presentation layers

pub mod callbacks;
pub mod error;
mod session;
pub mod timeout;
pub mod tracker;
pub mod view;

pub use callbacks::JobCallbacks;
pub use error::TrackerError;
pub use session::TRANSPORT_FAILURE_MESSAGE;
pub use timeout::{TimeoutGuard, TIMEOUT_MESSAGE};
pub use tracker::JobTracker;
pub use view::TrackerView;
