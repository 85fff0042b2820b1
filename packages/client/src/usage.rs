//! Sink for per-call usage log entries.

use std::sync::{Mutex, PoisonError};

use astro_sync_domain_models::UsageLogEntry;

/// Receives one [`UsageLogEntry`] per outbound call.
///
/// Recording is fire-and-forget: implementations log their own failures
/// rather than surfacing them to the caller.
pub trait UsageRecorder: Send + Sync {
    fn record(&self, entry: UsageLogEntry);
}

/// Keeps entries in memory. Used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryUsageRecorder {
    entries: Mutex<Vec<UsageLogEntry>>,
}

impl MemoryUsageRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<UsageLogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl UsageRecorder for MemoryUsageRecorder {
    fn record(&self, entry: UsageLogEntry) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }
}
