//! One bounded sync run of one domain.
//!
//! A run walks its plan in order, one upstream call at a time, pausing
//! `delay_ms` between consecutive calls. A failed call is logged and
//! skipped; items that do not normalize are skipped; items that fail to
//! persist are counted. Only a run in which every call failed is an error.

use std::time::Duration;

use astro_sync_client::UpstreamClient;
use astro_sync_database::RecordStore;
use astro_sync_domain_models::{Domain, RunPhase, RunStatus, SyncRunResult};
use astro_sync_source::extract::{extract_items, tag_variant};
use astro_sync_source::normalize::{Normalized, normalize};
use astro_sync_source::plan::{FetchStep, Plan, plan};
use astro_sync_source::progress::ProgressCallback;
use astro_sync_source::target::{RunParams, SyncTarget};
use chrono::NaiveDate;
use serde_json::Value;
use tokio::time::Instant;

use crate::SyncError;

/// Runs `target` once with `params`, relative to `today`.
///
/// # Errors
///
/// Returns [`SyncError::Source`] if the plan cannot be built, or
/// [`SyncError::TotalFailure`] if at least one call was attempted and all
/// of them failed. Anything short of that is reported in the returned
/// [`SyncRunResult`].
pub async fn sync_target(
    client: &dyn UpstreamClient,
    store: &dyn RecordStore,
    target: &SyncTarget,
    params: RunParams,
    today: NaiveDate,
    progress: &dyn ProgressCallback,
) -> Result<SyncRunResult, SyncError> {
    let start = Instant::now();
    log::info!(
        "[{}] Syncing {} (span {}, limit {:?})",
        target.domain,
        target.name,
        params.span,
        params.limit
    );

    let mut run = Run::new(client, store, target, progress);
    run.item_cap = target.item_cap(params);

    match plan(target, params, today)? {
        Plan::Fixed(steps) => {
            run.set_planned(steps.len() as u64);
            for step in &steps {
                if let Some(body) = run.call(step).await {
                    run.ingest(step, &body);
                }
            }
        }
        Plan::Paged(paged) => {
            run.set_planned(paged.variants().len() as u64 * u64::from(paged.max_pages()));
            for variant in paged.variants() {
                for page in 0..paged.max_pages() {
                    let step = paged.step(variant.as_deref(), page)?;
                    let Some(body) = run.call(&step).await else {
                        break;
                    };
                    let count = run.ingest(&step, &body);
                    if !paged.has_more(&body, count) {
                        log::debug!("[{}] {}: last page", target.domain, step.label);
                        break;
                    }
                }
            }
        }
        Plan::Sols(sols) => {
            run.set_planned(sols.variants().len() as u64);
            for variant in sols.variants() {
                let manifest = sols.manifest_step(variant.as_deref())?;
                let Some(body) = run.call(&manifest).await else {
                    continue;
                };
                if let Some((domain, items)) = sols.manifest_records(&body) {
                    run.store_items(domain, &manifest, &items);
                }
                let Some(max_sol) = sols.max_sol(&body) else {
                    run.fail(&manifest, "manifest has no max_sol".to_string());
                    continue;
                };
                let steps = sols.sol_steps(variant.as_deref(), max_sol)?;
                run.set_planned(run.planned + steps.len() as u64);
                for step in &steps {
                    if let Some(body) = run.call(step).await {
                        run.ingest(step, &body);
                    }
                }
            }
        }
    }

    run.finish(start.elapsed())
}

/// Sleeps between consecutive calls, never before the first.
#[derive(Debug)]
struct Pacer {
    delay: Duration,
    first: bool,
}

impl Pacer {
    const fn new(delay: Duration) -> Self {
        Self { delay, first: true }
    }

    async fn wait(&mut self) {
        if self.first {
            self.first = false;
        } else if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

struct Run<'a> {
    client: &'a dyn UpstreamClient,
    store: &'a dyn RecordStore,
    target: &'a SyncTarget,
    progress: &'a dyn ProgressCallback,
    pacer: Pacer,
    phase: RunPhase,
    planned: u64,
    item_cap: Option<usize>,
    result: SyncRunResult,
    last_error: Option<String>,
}

impl<'a> Run<'a> {
    fn new(
        client: &'a dyn UpstreamClient,
        store: &'a dyn RecordStore,
        target: &'a SyncTarget,
        progress: &'a dyn ProgressCallback,
    ) -> Self {
        Self {
            client,
            store,
            target,
            progress,
            pacer: Pacer::new(target.delay()),
            phase: RunPhase::Idle,
            planned: 0,
            item_cap: None,
            result: SyncRunResult::new(target.domain),
            last_error: None,
        }
    }

    fn transition(&mut self, next: RunPhase) {
        if self.phase != next {
            log::trace!("[{}] {} -> {next}", self.target.domain, self.phase);
            self.phase = next;
        }
    }

    fn set_planned(&mut self, total: u64) {
        self.planned = total;
        self.progress.steps_planned(total);
    }

    /// Issues one call. `None` means the step failed and was counted.
    async fn call(&mut self, step: &FetchStep) -> Option<Value> {
        self.transition(RunPhase::Fetching);
        self.pacer.wait().await;
        self.result.steps += 1;
        self.progress.step_started(&step.label);
        log::debug!(
            "[{}] GET {}:{} {:?}",
            self.target.domain,
            self.client.name(),
            step.endpoint,
            step.query
        );

        let response = self.client.fetch(&step.endpoint, &step.query).await;
        self.progress.step_finished();

        match response.body {
            Some(body) => Some(body),
            None => {
                let error = response
                    .error
                    .unwrap_or_else(|| format!("HTTP {}", response.status));
                self.fail(step, error);
                None
            }
        }
    }

    fn fail(&mut self, step: &FetchStep, error: String) {
        log::warn!(
            "[{}] {} failed, skipping: {error}",
            self.target.domain,
            step.label
        );
        self.result.fetch_failures += 1;
        self.last_error = Some(error);
    }

    /// Normalizes and persists the items in `body`. Returns how many items
    /// were kept from the response.
    fn ingest(&mut self, step: &FetchStep, body: &Value) -> usize {
        let mut items = extract_items(body, self.target.records_path.as_deref());
        if let Some(cap) = self.item_cap
            && items.len() > cap
        {
            log::debug!(
                "[{}] {}: keeping {cap} of {} item(s)",
                self.target.domain,
                step.label,
                items.len()
            );
            items.truncate(cap);
        }
        if let (Some(field), Some(variant)) = (&self.target.variant_field, &step.variant) {
            tag_variant(&mut items, field, variant);
        }
        self.store_items(self.target.domain, step, &items);
        items.len()
    }

    /// Normalizes `items` as `domain` records and upserts them.
    fn store_items(&mut self, domain: Domain, step: &FetchStep, items: &[Value]) {
        self.transition(RunPhase::Normalizing);
        let mut records = Vec::with_capacity(items.len());
        for item in items {
            match normalize(domain, item) {
                Normalized::Malformed { reason } => {
                    log::warn!("[{domain}] {}: skipping item: {reason}", step.label);
                    self.result.skipped += 1;
                }
                normalized => {
                    if !normalized.defaulted().is_empty() {
                        log::debug!(
                            "[{domain}] defaulted {:?} for {:?}",
                            normalized.defaulted(),
                            normalized.record().map(|r| r.external_key.as_str())
                        );
                    }
                    records.extend(normalized.into_record());
                }
            }
        }

        self.transition(RunPhase::Persisting);
        for record in &records {
            match self.store.upsert(record) {
                Ok(true) => self.result.created += 1,
                Ok(false) => self.result.updated += 1,
                Err(e) => {
                    log::warn!(
                        "[{domain}] Failed to persist {}: {e}",
                        record.external_key
                    );
                    self.result.persist_failures += 1;
                }
            }
        }

        log::debug!(
            "[{domain}] {}: {} item(s), {} record(s)",
            step.label,
            items.len(),
            records.len()
        );
    }

    fn finish(mut self, elapsed: Duration) -> Result<SyncRunResult, SyncError> {
        let domain = self.target.domain;
        self.result.duration = elapsed;
        let status = self.result.status();
        self.transition(match status {
            RunStatus::Done => RunPhase::Done,
            RunStatus::PartialFailure => RunPhase::PartialFailure,
        });

        let r = &self.result;
        let summary = format!(
            "{} created, {} updated, {} skipped, {} failed call(s), {} failed write(s)",
            r.created, r.updated, r.skipped, r.fetch_failures, r.persist_failures
        );
        self.progress.finish(summary.clone());

        if r.steps > 0 && r.fetch_failures == r.steps {
            let last_error = self.last_error.unwrap_or_default();
            log::error!("[{domain}] All {} call(s) failed: {last_error}", r.steps);
            return Err(SyncError::TotalFailure {
                domain,
                attempted: r.steps,
                last_error,
            });
        }

        log::info!(
            "[{domain}] {status}: {summary} in {:.1}s",
            elapsed.as_secs_f64()
        );
        Ok(self.result)
    }
}
