// crates/core/src/progress.rs
//! Display progress for jobs whose backend reports coarse or no progress.
//!
//! In simulated mode the projector runs a decaying random walk toward
//! [`SIMULATED_CEILING`], so the indicator keeps moving but leaves headroom
//! for the real completion jump. It is cosmetic only and never feeds back
//! into event dispatch.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::types::{JobStatus, ProjectedProgress};

/// Shown as soon as tracking starts.
pub const PROGRESS_FLOOR: f64 = 10.0;
/// The walk approaches but never passes this value on its own.
pub const SIMULATED_CEILING: f64 = 95.0;
const MIN_STEP: f64 = 0.1;
const STEP_FRACTION: f64 = 0.05;

/// Where the displayed number comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressMode {
    /// Synthesize progress on each display tick.
    #[default]
    Simulated,
    /// Show the backend's numeric progress verbatim.
    Reported,
}

#[derive(Debug, Clone)]
pub struct ProgressProjector {
    mode: ProgressMode,
    progress: ProjectedProgress,
    ticking: bool,
}

impl ProgressProjector {
    pub fn new(mode: ProgressMode) -> Self {
        Self {
            mode,
            progress: ProjectedProgress::default(),
            ticking: false,
        }
    }

    pub fn mode(&self) -> ProgressMode {
        self.mode
    }

    pub fn displayed(&self) -> f64 {
        self.progress.displayed_percent
    }

    pub fn is_ticking(&self) -> bool {
        self.ticking
    }

    /// Tracking began: start ticking and show motion right away.
    pub fn activate(&mut self) {
        self.ticking = true;
        if self.mode == ProgressMode::Simulated {
            self.progress.displayed_percent = self.progress.displayed_percent.max(PROGRESS_FLOOR);
        }
    }

    /// Advance one display tick and return the new value. A no-op once a
    /// terminal status was observed, or in reported mode.
    pub fn tick<R: Rng>(&mut self, rng: &mut R) -> f64 {
        if self.ticking && self.mode == ProgressMode::Simulated {
            let current = self.progress.displayed_percent;
            let remaining = SIMULATED_CEILING - current;
            let increment = (remaining * STEP_FRACTION).max(MIN_STEP);
            let step = rng.gen_range(0.0..increment);
            self.progress.displayed_percent = (current + step).min(SIMULATED_CEILING).max(current);
        }
        self.progress.displayed_percent
    }

    /// A real progress value from the backend. Only used in reported mode,
    /// and ignored after a terminal status.
    pub fn report(&mut self, percent: f64) {
        if self.ticking && self.mode == ProgressMode::Reported && percent.is_finite() {
            self.progress.displayed_percent = percent.clamp(0.0, 100.0);
        }
    }

    /// Apply terminal overrides: completion jumps to 100, failure freezes.
    pub fn observe(&mut self, status: JobStatus) {
        match status {
            JobStatus::Completed => {
                self.progress.displayed_percent = 100.0;
                self.ticking = false;
            }
            JobStatus::Failed => self.ticking = false,
            JobStatus::Waiting | JobStatus::Active => {}
        }
    }

    pub fn reset(&mut self) {
        self.progress = ProjectedProgress::default();
        self.ticking = false;
    }
}
