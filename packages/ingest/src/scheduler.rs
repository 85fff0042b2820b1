//! Cadence runs, per-domain exclusion, and the periodic schedule.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::sync::{Arc, Mutex, PoisonError};

use astro_sync_client::UpstreamClient;
use astro_sync_database::RecordStore;
use astro_sync_domain_models::{Cadence, Domain, RunStatus, SyncRunResult};
use astro_sync_source::progress::{ProgressCallback, null_progress};
use astro_sync_source::target::{RunParams, SyncTarget};
use chrono::NaiveDate;
use futures::future::join_all;
use tokio::time::MissedTickBehavior;

use crate::SyncError;
use crate::retry::{RetryPolicy, with_retry};
use crate::sync::sync_target;

/// Domains with a run in flight.
#[derive(Debug, Default)]
pub struct DomainLocks {
    running: Mutex<BTreeSet<Domain>>,
}

impl DomainLocks {
    /// Marks `domain` as running, or returns `None` if it already is.
    pub fn try_acquire(&self, domain: Domain) -> Option<DomainGuard<'_>> {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        running.insert(domain).then(|| DomainGuard {
            locks: self,
            domain,
        })
    }

    #[must_use]
    pub fn is_running(&self, domain: Domain) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&domain)
    }
}

/// Releases a domain when dropped.
#[derive(Debug)]
pub struct DomainGuard<'a> {
    locks: &'a DomainLocks,
    domain: Domain,
}

impl Drop for DomainGuard<'_> {
    fn drop(&mut self) {
        self.locks
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.domain);
    }
}

/// What happened to one domain in a cadence or single run.
#[derive(Debug)]
pub enum DomainOutcome {
    Completed(SyncRunResult),
    /// Gave up after `attempts` attempts.
    Failed { error: SyncError, attempts: u32 },
    /// Another run of the domain was already in flight.
    Skipped,
}

impl DomainOutcome {
    #[must_use]
    pub const fn created(&self) -> u64 {
        match self {
            Self::Completed(result) => result.created,
            Self::Failed { .. } | Self::Skipped => 0,
        }
    }

    /// Whether the run failed outright or finished with failures.
    #[must_use]
    pub const fn has_failures(&self) -> bool {
        match self {
            Self::Completed(result) => matches!(result.status(), RunStatus::PartialFailure),
            Self::Failed { .. } => true,
            Self::Skipped => false,
        }
    }
}

/// Outcomes of one cadence run, keyed by domain.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub outcomes: BTreeMap<Domain, DomainOutcome>,
}

impl RunSummary {
    /// `{domain: created_count}` for every domain in the run.
    #[must_use]
    pub fn created(&self) -> BTreeMap<Domain, u64> {
        self.outcomes
            .iter()
            .map(|(domain, outcome)| (*domain, outcome.created()))
            .collect()
    }

    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.outcomes.values().any(DomainOutcome::has_failures)
    }

    /// One line per domain: created count plus a status flag.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (domain, outcome) in &self.outcomes {
            let status = match outcome {
                DomainOutcome::Completed(result) => format!(
                    "{} ({} updated, {} skipped, {} failed call(s), {} failed write(s))",
                    result.status(),
                    result.updated,
                    result.skipped,
                    result.fetch_failures,
                    result.persist_failures
                ),
                DomainOutcome::Failed { error, attempts } => {
                    format!("FAILED after {attempts} attempt(s): {error}")
                }
                DomainOutcome::Skipped => "skipped (already running)".to_string(),
            };
            let _ = writeln!(out, "{:<20} {:>6}  {status}", domain.as_ref(), outcome.created());
        }
        out
    }
}

/// Source of the current UTC date.
pub type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

/// Runs sync targets against shared upstream clients and a shared store.
pub struct SyncEngine {
    targets: Vec<SyncTarget>,
    upstreams: BTreeMap<String, Arc<dyn UpstreamClient>>,
    store: Arc<dyn RecordStore>,
    locks: DomainLocks,
    retry: RetryPolicy,
    clock: Clock,
}

impl SyncEngine {
    #[must_use]
    pub fn new(
        targets: Vec<SyncTarget>,
        upstreams: BTreeMap<String, Arc<dyn UpstreamClient>>,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            targets,
            upstreams,
            store,
            locks: DomainLocks::default(),
            retry: RetryPolicy::default(),
            clock: Arc::new(|| chrono::Utc::now().date_naive()),
        }
    }

    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: impl Fn() -> NaiveDate + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    #[must_use]
    pub fn targets(&self) -> &[SyncTarget] {
        &self.targets
    }

    #[must_use]
    pub fn target(&self, domain: Domain) -> Option<&SyncTarget> {
        self.targets.iter().find(|t| t.domain == domain)
    }

    /// Runs one domain with retry, unless it is already running.
    pub async fn run_domain(
        &self,
        target: &SyncTarget,
        params: RunParams,
        progress: Arc<dyn ProgressCallback>,
    ) -> DomainOutcome {
        let domain = target.domain;
        let Some(_guard) = self.locks.try_acquire(domain) else {
            log::info!("[{domain}] Already running, skipping this invocation");
            return DomainOutcome::Skipped;
        };

        let Some(client) = self.upstreams.get(&target.upstream) else {
            let error = SyncError::UnknownUpstream {
                domain,
                upstream: target.upstream.clone(),
            };
            log::error!("{error}");
            return DomainOutcome::Failed { error, attempts: 0 };
        };

        let client: &dyn UpstreamClient = client.as_ref();
        let store: &dyn RecordStore = self.store.as_ref();
        let progress: &dyn ProgressCallback = progress.as_ref();
        let clock = self.clock.as_ref();

        // Each attempt plans against the date it starts on.
        let (result, attempts) = with_retry(domain.as_ref(), &self.retry, move || {
            sync_target(client, store, target, params, clock(), progress)
        })
        .await;

        match result {
            Ok(result) => DomainOutcome::Completed(result),
            Err(error) => {
                log::error!("[{domain}] Giving up after {attempts} attempt(s): {error}");
                DomainOutcome::Failed { error, attempts }
            }
        }
    }

    /// Runs every target scheduled for `cadence` concurrently.
    pub async fn run_cadence<F>(&self, cadence: Cadence, progress: F) -> RunSummary
    where
        F: Fn(Domain) -> Arc<dyn ProgressCallback> + Send + Sync,
    {
        let scheduled: Vec<(&SyncTarget, RunParams)> = self
            .targets
            .iter()
            .filter_map(|t| t.params_for(cadence).map(|p| (t, p)))
            .collect();

        log::info!(
            "Starting {cadence} sync of {} domain(s): {}",
            scheduled.len(),
            scheduled
                .iter()
                .map(|(t, _)| t.domain.as_ref())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let runs = scheduled.iter().map(|(target, params)| {
            let progress = progress(target.domain);
            async move {
                let outcome = self.run_domain(target, *params, progress).await;
                (target.domain, outcome)
            }
        });

        let summary = RunSummary {
            outcomes: join_all(runs).await.into_iter().collect(),
        };
        log::info!(
            "Finished {cadence} sync: {} record(s) created{}",
            summary.created().values().sum::<u64>(),
            if summary.has_failures() {
                ", with failures"
            } else {
                ""
            }
        );
        summary
    }

    /// Ticks the daily and weekly cadences forever, dispatching each tick as
    /// its own task. Both cadences fire once at startup.
    pub async fn run_forever(self: Arc<Self>) {
        let mut weekly = tokio::time::interval(Cadence::Weekly.period());
        let mut daily = tokio::time::interval(Cadence::Daily.period());
        weekly.set_missed_tick_behavior(MissedTickBehavior::Delay);
        daily.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // Weekly first so that its wider windows win the startup race.
            let cadence = tokio::select! {
                biased;
                _ = weekly.tick() => Cadence::Weekly,
                _ = daily.tick() => Cadence::Daily,
            };

            let engine = Arc::clone(&self);
            tokio::spawn(async move {
                let summary = engine.run_cadence(cadence, |_| null_progress()).await;
                for line in summary.render().lines() {
                    log::info!("[{cadence}] {line}");
                }
            });
        }
    }
}
