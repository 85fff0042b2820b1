#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal helpers for the `astro_sync` binary.
//!
//! [`init_logger`] installs `pretty_env_logger` behind
//! `indicatif-log-bridge`, so log lines do not tear the progress bars that
//! [`SyncProgress`] draws for each domain run.

use std::sync::Arc;
use std::time::Duration;

use astro_sync_source::progress::ProgressCallback;
use indicatif::{ProgressBar, ProgressStyle};

pub use indicatif::MultiProgress;

/// One `indicatif` bar per domain run.
pub struct SyncProgress {
    bar: ProgressBar,
    bar_style: ProgressStyle,
}

impl SyncProgress {
    /// Adds a bar for `domain` to `multi`. It spins until the run reports
    /// how many steps it planned.
    #[must_use]
    pub fn domain_bar(multi: &MultiProgress, domain: &str) -> Arc<dyn ProgressCallback> {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:>18} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_prefix(domain.to_string());

        let bar_style = ProgressStyle::with_template(
            "{prefix:>18} {wide_bar:.green/dim} {pos}/{len} {msg} [{elapsed_precise}]",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");

        Arc::new(Self { bar, bar_style })
    }
}

impl ProgressCallback for SyncProgress {
    fn steps_planned(&self, total: u64) {
        if self.bar.length() != Some(total) {
            self.bar.set_length(total);
            self.bar.set_style(self.bar_style.clone());
        }
    }

    fn step_started(&self, label: &str) {
        self.bar.set_message(label.to_string());
    }

    fn step_finished(&self) {
        self.bar.inc(1);
    }

    fn finish(&self, summary: String) {
        self.bar.finish_with_message(summary);
    }
}

/// Initializes the global logger wrapped in `indicatif-log-bridge`.
///
/// Returns the [`MultiProgress`] that all progress bars must be added to.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    // Already set when several tests initialize logging.
    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok();

    log::set_max_level(level);

    multi
}
