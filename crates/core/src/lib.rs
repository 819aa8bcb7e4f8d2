// crates/core/src/lib.rs
//! Client-side tracking of asynchronous generation jobs: data model, poll
//! cadence, exactly-once event dispatch, progress projection, error
//! normalization and status endpoint access.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod fetch;
pub mod normalize;
pub mod progress;
pub mod schedule;
pub mod types;

pub use config::*;
pub use dispatch::*;
pub use error::*;
pub use fetch::*;
pub use normalize::*;
pub use progress::*;
pub use schedule::*;
pub use types::*;
