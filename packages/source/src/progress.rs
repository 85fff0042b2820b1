//! Progress reporting for sync runs.
//!
//! The orchestrator reports through [`ProgressCallback`] so that the CLI can
//! render `indicatif` bars while the scheduler and tests stay silent.

use std::sync::Arc;

/// Receives step-level progress from one sync run.
///
/// Implementations must be `Send + Sync`; domains sync concurrently and each
/// run may hold its own handle.
pub trait ProgressCallback: Send + Sync {
    /// Number of fetch steps the run expects. Paginated and sol-based plans
    /// report a lower bound and may call this again once it grows.
    fn steps_planned(&self, total: u64);

    /// A fetch step is about to be issued.
    fn step_started(&self, label: &str);

    /// A fetch step finished (successfully or not).
    fn step_finished(&self);

    /// The run is over.
    fn finish(&self, summary: String);
}

/// Ignores every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn steps_planned(&self, _total: u64) {}
    fn step_started(&self, _label: &str) {}
    fn step_finished(&self) {}
    fn finish(&self, _summary: String) {}
}

#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
