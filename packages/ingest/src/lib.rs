#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Syncs space-data upstreams into the local `DuckDB` store.
//!
//! [`sync::sync_target`] performs one bounded run of one domain.
//! [`scheduler::SyncEngine`] adds per-domain mutual exclusion, retry with
//! backoff, concurrent cadence runs, and the long-running schedule loop.

pub mod retry;
pub mod scheduler;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

use std::collections::BTreeMap;
use std::sync::Arc;

use astro_sync_client::{ClientError, HttpUpstream, UpstreamClient, UsageRecorder};
use astro_sync_domain_models::Domain;
use astro_sync_source::SourceError;
use astro_sync_source::target::SyncTarget;

/// Environment variable holding a comma-separated domain filter.
pub const DOMAINS_ENV: &str = "ASTRO_SYNC_DOMAINS";

/// Errors that end a sync run or prevent one from starting.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// A target or upstream definition is unusable.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// An HTTP client could not be built.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// The target names an upstream that has no client.
    #[error("{domain}: no client configured for upstream {upstream:?}")]
    UnknownUpstream { domain: Domain, upstream: String },

    /// Every attempted upstream call of a run failed.
    #[error("{domain}: all {attempted} upstream call(s) failed, last error: {last_error}")]
    TotalFailure {
        domain: Domain,
        attempted: u64,
        last_error: String,
    },
}

impl SyncError {
    /// Whether running again could plausibly succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::TotalFailure { .. })
    }
}

/// Returns every configured target from the embedded registry.
#[must_use]
pub fn all_targets() -> Vec<SyncTarget> {
    astro_sync_source::registry::all_targets()
}

/// Returns the targets to sync, filtered by the `--domains` CLI flag or
/// the `ASTRO_SYNC_DOMAINS` environment variable. If neither is set, all
/// targets are returned.
#[must_use]
pub fn enabled_targets(cli_filter: Option<String>) -> Vec<SyncTarget> {
    let filter = cli_filter.or_else(|| std::env::var(DOMAINS_ENV).ok());
    filter_targets(all_targets(), filter.as_deref())
}

fn filter_targets(all: Vec<SyncTarget>, filter: Option<&str>) -> Vec<SyncTarget> {
    let Some(filter) = filter.filter(|f| !f.trim().is_empty()) else {
        return all;
    };

    let names: Vec<&str> = filter
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    let available = all
        .iter()
        .map(|t| t.domain.to_string())
        .collect::<Vec<_>>()
        .join(", ");

    let filtered: Vec<SyncTarget> = all
        .into_iter()
        .filter(|t| names.contains(&t.domain.as_ref()))
        .collect();

    if filtered.len() < names.len() {
        log::warn!("Domain filter {names:?} matched {} target(s). Available: {available}", filtered.len());
    }

    filtered
}

/// Builds one [`HttpUpstream`] per configured upstream, all reporting to
/// `recorder`.
///
/// # Errors
///
/// Returns [`SyncError`] if an upstream is missing its API key or its HTTP
/// client cannot be built.
pub fn build_upstreams(
    recorder: &Arc<dyn UsageRecorder>,
) -> Result<BTreeMap<String, Arc<dyn UpstreamClient>>, SyncError> {
    let mut upstreams: BTreeMap<String, Arc<dyn UpstreamClient>> = BTreeMap::new();
    for definition in astro_sync_source::registry::all_upstreams() {
        let config = definition.resolve()?;
        log::debug!("[{}] base URL {}", config.name, config.base_url);
        let client = HttpUpstream::new(config, Arc::clone(recorder))?;
        upstreams.insert(definition.name, Arc::new(client));
    }
    Ok(upstreams)
}
