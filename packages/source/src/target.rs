//! Sync target definitions.
//!
//! A [`SyncTarget`] captures everything unique about one upstream data
//! domain in a serializable config struct: where to call, how to walk the
//! upstream (date windows, pages, sols, or a single shot), how long to wait
//! between calls, and how wide each cadence's run should be.

use std::collections::BTreeMap;
use std::time::Duration;

use astro_sync_domain_models::{Cadence, Domain};
use serde::Deserialize;

use crate::SourceError;

/// Parameters for one run of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RunParams {
    /// Calendar days (or sols) covered, counting today (or the latest sol).
    /// A run looking `n` days back has a span of `n + 1`.
    #[serde(default = "default_span")]
    pub span: u32,
    /// Upper bound on items requested, where the upstream supports one.
    #[serde(default)]
    pub limit: Option<u32>,
}

const fn default_span() -> u32 {
    1
}

impl Default for RunParams {
    fn default() -> Self {
        Self {
            span: default_span(),
            limit: None,
        }
    }
}

/// Per-cadence run parameters. A missing cadence means the target does not
/// run on that schedule.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Cadences {
    pub daily: Option<RunParams>,
    pub weekly: Option<RunParams>,
}

/// Direction a date range extends from today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// `span` days ending today.
    Past,
    /// `span` days starting today.
    Future,
}

/// Pagination style for [`WindowStrategy::Paginated`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pagination {
    /// `?offset=page*page_size`
    Offset,
    /// `?page=N`, starting at 1.
    Page,
}

/// How a run is split into upstream calls.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WindowStrategy {
    /// Calendar-day range split into fixed-size windows.
    DateRange {
        direction: Direction,
        /// Days per call. Omitted means the whole range in one call.
        window_days: Option<u32>,
        /// Query parameter receiving the window's first day.
        start_param: Option<String>,
        /// Query parameter receiving the window's last day.
        end_param: Option<String>,
    },
    /// Offset or page-number walk capped at `max_pages`.
    Paginated {
        pagination: Pagination,
        page_param: String,
        size_param: String,
        page_size: u32,
        max_pages: u32,
        /// Dot path to the next-page link; a null value ends the walk.
        next_path: Option<String>,
        /// Query parameter receiving `today - span` as a lower date bound.
        since_param: Option<String>,
    },
    /// Latest `span` sols per variant, read from a manifest.
    SolRange {
        manifest_endpoint: String,
        max_sol_path: String,
        sol_param: String,
        /// Dot path to the record inside the manifest response.
        #[serde(default)]
        manifest_path: Option<String>,
        /// Domain the manifest record is stored under. Omitted means the
        /// manifest is only read for its latest sol.
        #[serde(default)]
        manifest_domain: Option<Domain>,
    },
    /// One call per variant.
    Single {
        /// Query parameter receiving the run's limit.
        limit_param: Option<String>,
        /// Keep only the first `limit` items of each response. For
        /// upstreams that always return the whole collection.
        #[serde(default)]
        truncate: bool,
    },
}

/// A complete, config-driven upstream domain definition.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncTarget {
    pub domain: Domain,
    /// Human-readable name.
    pub name: String,
    /// Key into the upstream registry.
    pub upstream: String,
    /// Endpoint template. May contain `{variant}` and `{date}`.
    pub endpoint: String,
    /// Pause between consecutive calls of one run.
    pub delay_ms: u64,
    pub strategy: WindowStrategy,
    /// Dot path to the items inside a response. `*` flattens every value
    /// of an object or array. Omitted means the response itself (an array
    /// of items, or a single item).
    #[serde(default)]
    pub records_path: Option<String>,
    /// Values substituted for `{variant}`; one pass per variant.
    #[serde(default)]
    pub variants: Vec<String>,
    /// Item field that receives the variant when the upstream omits it.
    #[serde(default)]
    pub variant_field: Option<String>,
    /// Static query parameters. Values may contain `{limit}`.
    #[serde(default)]
    pub query: BTreeMap<String, String>,
    #[serde(default)]
    pub cadence: Cadences,
}

impl SyncTarget {
    #[must_use]
    pub const fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Run parameters for `cadence`, if the target runs on it.
    #[must_use]
    pub const fn params_for(&self, cadence: Cadence) -> Option<RunParams> {
        match cadence {
            Cadence::Daily => self.cadence.daily,
            Cadence::Weekly => self.cadence.weekly,
        }
    }

    /// Items kept per response, when the upstream cannot be asked for fewer.
    #[must_use]
    pub fn item_cap(&self, params: RunParams) -> Option<usize> {
        match self.strategy {
            WindowStrategy::Single { truncate: true, .. } => {
                params.limit.and_then(|l| usize::try_from(l).ok())
            }
            _ => None,
        }
    }

    /// Secondary domain written from the manifest of a sol-range target.
    #[must_use]
    pub const fn manifest_domain(&self) -> Option<Domain> {
        match self.strategy {
            WindowStrategy::SolRange {
                manifest_domain, ..
            } => manifest_domain,
            _ => None,
        }
    }

    /// Variants to iterate; a single `None` pass when there are none.
    #[must_use]
    pub fn variant_passes(&self) -> Vec<Option<&str>> {
        if self.variants.is_empty() {
            vec![None]
        } else {
            self.variants.iter().map(|v| Some(v.as_str())).collect()
        }
    }

    /// Checks that placeholders and variants agree.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Config`] if the endpoint uses `{variant}`
    /// without variants, or variants are listed without a `{variant}`
    /// placeholder anywhere in the definition.
    pub fn validate(&self) -> Result<(), SourceError> {
        let uses_variant = self.endpoint.contains("{variant}")
            || matches!(&self.strategy, WindowStrategy::SolRange { manifest_endpoint, .. }
                if manifest_endpoint.contains("{variant}"));

        if uses_variant && self.variants.is_empty() {
            return Err(SourceError::config(format!(
                "{}: endpoint uses {{variant}} but no variants are listed",
                self.domain
            )));
        }
        if !uses_variant && !self.variants.is_empty() {
            return Err(SourceError::config(format!(
                "{}: variants listed but endpoint has no {{variant}} placeholder",
                self.domain
            )));
        }
        if let WindowStrategy::Single {
            limit_param: Some(_),
            truncate: true,
        } = &self.strategy
        {
            return Err(SourceError::config(format!(
                "{}: truncate is for upstreams without a limit parameter",
                self.domain
            )));
        }
        if self.manifest_domain() == Some(self.domain) {
            return Err(SourceError::config(format!(
                "{}: manifest records need a domain of their own",
                self.domain
            )));
        }
        if self.endpoint.contains("{date}")
            && !matches!(self.strategy, WindowStrategy::DateRange { .. })
        {
            return Err(SourceError::config(format!(
                "{}: only date_range targets may use {{date}}",
                self.domain
            )));
        }
        if let WindowStrategy::Paginated {
            page_size,
            max_pages,
            ..
        } = &self.strategy
            && (*page_size == 0 || *max_pages == 0)
        {
            return Err(SourceError::config(format!(
                "{}: page_size and max_pages must be positive",
                self.domain
            )));
        }
        Ok(())
    }
}

/// Parses and validates a TOML target definition.
///
/// # Errors
///
/// Returns [`SourceError`] if the TOML is malformed or fails validation.
pub fn parse_target_toml(toml_str: &str) -> Result<SyncTarget, SourceError> {
    let target: SyncTarget = toml::from_str(toml_str)?;
    target.validate()?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DONKI: &str = r#"
        domain = "space_weather"
        name = "DONKI"
        upstream = "nasa"
        endpoint = "DONKI/{variant}"
        delay_ms = 300
        variants = ["CME", "FLR"]
        variant_field = "event_type"

        [strategy]
        type = "date_range"
        direction = "past"
        start_param = "startDate"
        end_param = "endDate"

        [cadence.daily]
        span = 7
    "#;

    #[test]
    fn parses_tagged_strategy_and_cadences() {
        let target = parse_target_toml(DONKI).unwrap();
        assert_eq!(target.domain, Domain::SpaceWeather);
        assert_eq!(target.delay(), Duration::from_millis(300));
        assert!(matches!(
            target.strategy,
            WindowStrategy::DateRange {
                direction: Direction::Past,
                window_days: None,
                ..
            }
        ));
        assert_eq!(
            target.params_for(Cadence::Daily),
            Some(RunParams {
                span: 7,
                limit: None
            })
        );
        assert_eq!(target.params_for(Cadence::Weekly), None);
        assert_eq!(target.variant_passes(), vec![Some("CME"), Some("FLR")]);
    }

    #[test]
    fn rejects_variant_placeholder_without_variants() {
        let toml_str = DONKI.replace(r#"variants = ["CME", "FLR"]"#, "");
        let err = parse_target_toml(&toml_str).unwrap_err();
        assert!(err.to_string().contains("no variants"));
    }

    const STARLINK: &str = r#"
        domain = "starlink"
        name = "Starlink"
        upstream = "spacex"
        endpoint = "v4/starlink"
        delay_ms = 500

        [strategy]
        type = "single"
        truncate = true

        [cadence.weekly]
        limit = 1000
    "#;

    #[test]
    fn truncating_targets_cap_items_at_the_run_limit() {
        let target = parse_target_toml(STARLINK).unwrap();
        let weekly = target.params_for(Cadence::Weekly).unwrap();
        assert_eq!(target.item_cap(weekly), Some(1000));
        assert_eq!(target.item_cap(RunParams::default()), None);

        let with_param = STARLINK.replace(
            "truncate = true",
            "truncate = true\n        limit_param = \"limit\"",
        );
        let err = parse_target_toml(&with_param).unwrap_err();
        assert!(err.to_string().contains("truncate"));
    }

    #[test]
    fn manifest_domain_must_differ_from_target_domain() {
        let toml_str = r#"
            domain = "mars_photos"
            name = "Rovers"
            upstream = "nasa"
            endpoint = "mars-photos/api/v1/rovers/{variant}/photos"
            delay_ms = 200
            variants = ["curiosity"]

            [strategy]
            type = "sol_range"
            manifest_endpoint = "mars-photos/api/v1/manifests/{variant}"
            max_sol_path = "photo_manifest.max_sol"
            sol_param = "sol"
            manifest_path = "photo_manifest"
            manifest_domain = "mars_rovers"
        "#;
        let target = parse_target_toml(toml_str).unwrap();
        assert_eq!(target.manifest_domain(), Some(Domain::MarsRovers));
        assert_eq!(target.item_cap(RunParams { span: 1, limit: Some(5) }), None);

        let same = toml_str.replace(r#"manifest_domain = "mars_rovers""#, r#"manifest_domain = "mars_photos""#);
        assert!(parse_target_toml(&same).is_err());
    }

    #[test]
    fn rejects_date_placeholder_outside_date_ranges() {
        let toml_str = r#"
            domain = "epic"
            name = "EPIC"
            upstream = "nasa"
            endpoint = "EPIC/api/natural/date/{date}"
            delay_ms = 300

            [strategy]
            type = "single"
        "#;
        assert!(parse_target_toml(toml_str).is_err());
    }
}
