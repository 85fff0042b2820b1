#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the space-data sync tool.

use std::str::FromStr;
use std::sync::Arc;

use astro_sync_cli_utils::SyncProgress;
use astro_sync_client::UsageRecorder;
use astro_sync_database::{RecordStore, Store};
use astro_sync_domain_models::{Cadence, Domain};
use astro_sync_ingest::scheduler::{RunSummary, SyncEngine};
use astro_sync_ingest::{all_targets, build_upstreams, enabled_targets};
use astro_sync_source::target::{RunParams, SyncTarget};
use clap::{Parser, Subcommand};
use strum::IntoEnumIterator;

#[derive(Parser)]
#[command(name = "astro_sync_ingest", about = "Space data sync tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured domains and how many records each has stored
    Domains,
    /// Run one domain once, retrying on total failure
    Sync {
        /// Domain identifier (e.g., "apod", "`near_earth_objects`")
        domain: String,
        /// Cadence whose run parameters to use
        #[arg(long, default_value = "daily")]
        cadence: Cadence,
        /// Override the span (days or sols) of the run
        #[arg(long)]
        span: Option<u32>,
        /// Override the item limit of the run
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Run every domain scheduled for a cadence, concurrently
    SyncAll {
        #[arg(long, default_value = "daily")]
        cadence: Cadence,
        /// Comma-separated list of domains to sync (overrides `ASTRO_SYNC_DOMAINS` env var)
        #[arg(long)]
        domains: Option<String>,
    },
    /// Run the daily and weekly schedules until interrupted
    Schedule {
        #[arg(long)]
        domains: Option<String>,
    },
    /// Show per-endpoint API usage and the most recent calls
    Usage {
        /// Number of recent calls to list
        #[arg(long, default_value = "20")]
        limit: u32,
    },
}

/// Run parameters for a one-off run of `target`. Weekly-only targets fall
/// back to their other cadence so they can still be run on demand.
fn one_off_params(
    target: &SyncTarget,
    cadence: Cadence,
    span: Option<u32>,
    limit: Option<u32>,
) -> RunParams {
    let other = match cadence {
        Cadence::Daily => Cadence::Weekly,
        Cadence::Weekly => Cadence::Daily,
    };
    let mut params = target
        .params_for(cadence)
        .or_else(|| target.params_for(other))
        .unwrap_or_default();
    if let Some(span) = span {
        params.span = span;
    }
    if limit.is_some() {
        params.limit = limit;
    }
    params
}

fn missing_target(targets: &[SyncTarget], domain: Domain) -> String {
    targets
        .iter()
        .find(|t| t.manifest_domain() == Some(domain))
        .map_or_else(
            || format!("No target configured for {domain}"),
            |writer| format!("{domain} is written by {} runs; sync that instead", writer.domain),
        )
}

fn print_summary(summary: &RunSummary) -> Result<(), Box<dyn std::error::Error>> {
    println!("{:<20} {:>6}  STATUS", "DOMAIN", "NEW");
    println!("{}", "-".repeat(60));
    print!("{}", summary.render());
    if summary.has_failures() {
        return Err("one or more domains failed".into());
    }
    Ok(())
}

fn build_engine(
    store: &Arc<Store>,
    targets: Vec<SyncTarget>,
) -> Result<SyncEngine, Box<dyn std::error::Error>> {
    let recorder: Arc<dyn UsageRecorder> = store.clone();
    let records: Arc<dyn RecordStore> = store.clone();
    Ok(SyncEngine::new(targets, build_upstreams(&recorder)?, records))
}

#[allow(clippy::too_many_lines)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = astro_sync_cli_utils::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Domains => {
            let store = Store::open_default()?;
            let counts = store.counts_by_domain()?;
            println!("{:<20} {:<8} {:<8} {:<8} {:>8}  NAME", "DOMAIN", "UPSTREAM", "DAILY", "WEEKLY", "STORED");
            println!("{}", "-".repeat(80));
            for target in all_targets() {
                let span = |cadence| {
                    target
                        .params_for(cadence)
                        .map_or_else(|| "-".to_string(), |p: RunParams| p.span.to_string())
                };
                println!(
                    "{:<20} {:<8} {:<8} {:<8} {:>8}  {}",
                    target.domain.as_ref(),
                    target.upstream,
                    span(Cadence::Daily),
                    span(Cadence::Weekly),
                    counts.get(target.domain.as_ref()).copied().unwrap_or(0),
                    target.name
                );
                if let Some(manifests) = target.manifest_domain() {
                    println!(
                        "{:<20} {:<8} {:<8} {:<8} {:>8}  (manifests from {})",
                        manifests.as_ref(),
                        target.upstream,
                        "-",
                        "-",
                        counts.get(manifests.as_ref()).copied().unwrap_or(0),
                        target.domain
                    );
                }
            }
        }
        Commands::Sync {
            domain,
            cadence,
            span,
            limit,
        } => {
            let domain = Domain::from_str(&domain).map_err(|_| {
                let available = Domain::iter()
                    .map(|d| d.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("Unknown domain: {domain}. Available: {available}")
            })?;
            let store = Arc::new(Store::open_default()?);
            let engine = build_engine(&store, all_targets())?;
            let target = engine.target(domain).ok_or_else(|| missing_target(engine.targets(), domain))?;
            let params = one_off_params(target, cadence, span, limit);

            let progress = SyncProgress::domain_bar(&multi, domain.as_ref());
            let outcome = engine.run_domain(target, params, progress).await;
            let summary = RunSummary {
                outcomes: std::iter::once((domain, outcome)).collect(),
            };
            print_summary(&summary)?;
        }
        Commands::SyncAll { cadence, domains } => {
            let store = Arc::new(Store::open_default()?);
            let engine = build_engine(&store, enabled_targets(domains))?;
            let summary = engine
                .run_cadence(cadence, |domain| {
                    SyncProgress::domain_bar(&multi, domain.as_ref())
                })
                .await;
            print_summary(&summary)?;
        }
        Commands::Schedule { domains } => {
            let store = Arc::new(Store::open_default()?);
            let engine = Arc::new(build_engine(&store, enabled_targets(domains))?);
            log::info!(
                "Scheduling {} domain(s); daily every {:?}, weekly every {:?}",
                engine.targets().len(),
                Cadence::Daily.period(),
                Cadence::Weekly.period()
            );
            tokio::select! {
                () = engine.run_forever() => {}
                result = tokio::signal::ctrl_c() => {
                    result?;
                    log::info!("Interrupted, stopping scheduler");
                }
            }
        }
        Commands::Usage { limit } => {
            let store = Store::open_default()?;
            println!("{:<40} {:>8} {:>8} {:>10}", "ENDPOINT", "CALLS", "ERRORS", "MEAN (s)");
            println!("{}", "-".repeat(70));
            for usage in store.usage_summary()? {
                println!(
                    "{:<40} {:>8} {:>8} {:>10.3}",
                    usage.endpoint, usage.calls, usage.errors, usage.mean_latency_secs
                );
            }

            println!();
            println!("Most recent {limit} call(s):");
            for entry in store.recent_usage(limit)? {
                println!(
                    "{}  {:<40} {:>3}  {:.3}s  {}",
                    entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    entry.endpoint,
                    entry.status_code,
                    entry.latency_secs,
                    entry.error.as_deref().unwrap_or("")
                );
            }
        }
    }

    Ok(())
}
