//! Turns a target and run parameters into upstream calls.
//!
//! Date ranges and single-shot targets are fully known up front
//! ([`Plan::Fixed`]). Paginated walks and sol ranges depend on what the
//! upstream returns, so they are driven step by step by the caller through
//! [`PagedPlan`] and [`SolPlan`].

use std::collections::BTreeMap;

use astro_sync_domain_models::Domain;
use chrono::{Days, NaiveDate};
use serde_json::Value;

use crate::SourceError;
use crate::extract::{extract_items, resolve_path};
use crate::parsing::value_to_i64;
use crate::target::{Direction, Pagination, RunParams, SyncTarget, WindowStrategy};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// One upstream call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchStep {
    /// Rendered endpoint path.
    pub endpoint: String,
    pub query: Vec<(String, String)>,
    /// Variant this call belongs to, if the target has variants.
    pub variant: Option<String>,
    /// Short description for logs and progress.
    pub label: String,
}

/// Calls for one run.
#[derive(Debug, Clone)]
pub enum Plan {
    Fixed(Vec<FetchStep>),
    Paged(PagedPlan),
    Sols(SolPlan),
}

/// Builds the plan for one run of `target`.
///
/// # Errors
///
/// Returns [`SourceError::Config`] if a template placeholder cannot be
/// filled (e.g. `{limit}` without a limit) or the date range overflows.
pub fn plan(target: &SyncTarget, params: RunParams, today: NaiveDate) -> Result<Plan, SourceError> {
    let static_query = render_query(&target.query, params.limit)?;
    let variants: Vec<Option<String>> = target
        .variant_passes()
        .into_iter()
        .map(|v| v.map(str::to_owned))
        .collect();

    match &target.strategy {
        WindowStrategy::DateRange {
            direction,
            window_days,
            start_param,
            end_param,
        } => {
            let windows = date_windows(*direction, params.span, *window_days, today)?;
            let mut steps = Vec::with_capacity(variants.len() * windows.len());
            for variant in &variants {
                for (start, end) in &windows {
                    let mut query = static_query.clone();
                    if let Some(param) = start_param {
                        query.push((param.clone(), start.format(DATE_FORMAT).to_string()));
                    }
                    if let Some(param) = end_param {
                        query.push((param.clone(), end.format(DATE_FORMAT).to_string()));
                    }
                    steps.push(FetchStep {
                        endpoint: render_endpoint(&target.endpoint, variant.as_deref(), Some(*start))?,
                        query,
                        variant: variant.clone(),
                        label: window_label(variant.as_deref(), *start, *end),
                    });
                }
            }
            Ok(Plan::Fixed(steps))
        }
        WindowStrategy::Single { limit_param, .. } => {
            let mut query = static_query;
            if let (Some(param), Some(limit)) = (limit_param, params.limit) {
                query.push((param.clone(), limit.to_string()));
            }
            let steps = variants
                .iter()
                .map(|variant| {
                    Ok(FetchStep {
                        endpoint: render_endpoint(&target.endpoint, variant.as_deref(), None)?,
                        query: query.clone(),
                        variant: variant.clone(),
                        label: variant.clone().unwrap_or_else(|| target.endpoint.clone()),
                    })
                })
                .collect::<Result<Vec<_>, SourceError>>()?;
            Ok(Plan::Fixed(steps))
        }
        WindowStrategy::Paginated {
            pagination,
            page_param,
            size_param,
            page_size,
            max_pages,
            next_path,
            since_param,
        } => {
            let page_size = params.limit.map_or(*page_size, |l| l.clamp(1, *page_size));
            let max_pages = params.limit.map_or(*max_pages, |l| {
                l.div_ceil(page_size).clamp(1, *max_pages)
            });
            let since = match since_param {
                Some(param) => {
                    let date = today
                        .checked_sub_days(Days::new(u64::from(params.span.saturating_sub(1))))
                        .ok_or_else(|| SourceError::config("since date out of range"))?;
                    Some((param.clone(), date.format(DATE_FORMAT).to_string()))
                }
                None => None,
            };
            Ok(Plan::Paged(PagedPlan {
                endpoint: target.endpoint.clone(),
                variants,
                query: static_query,
                pagination: *pagination,
                page_param: page_param.clone(),
                size_param: size_param.clone(),
                page_size,
                max_pages,
                next_path: next_path.clone(),
                since,
            }))
        }
        WindowStrategy::SolRange {
            manifest_endpoint,
            max_sol_path,
            sol_param,
            manifest_path,
            manifest_domain,
        } => Ok(Plan::Sols(SolPlan {
            endpoint: target.endpoint.clone(),
            manifest_endpoint: manifest_endpoint.clone(),
            max_sol_path: max_sol_path.clone(),
            sol_param: sol_param.clone(),
            manifest_path: manifest_path.clone(),
            manifest_domain: *manifest_domain,
            span: params.span,
            variants,
            query: static_query,
        })),
    }
}

/// Offset or page-number walk.
#[derive(Debug, Clone)]
pub struct PagedPlan {
    endpoint: String,
    variants: Vec<Option<String>>,
    query: Vec<(String, String)>,
    pagination: Pagination,
    page_param: String,
    size_param: String,
    page_size: u32,
    max_pages: u32,
    next_path: Option<String>,
    since: Option<(String, String)>,
}

impl PagedPlan {
    #[must_use]
    pub fn variants(&self) -> &[Option<String>] {
        &self.variants
    }

    #[must_use]
    pub const fn max_pages(&self) -> u32 {
        self.max_pages
    }

    /// The call for zero-based `page` of `variant`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Config`] if the endpoint template cannot be
    /// rendered.
    pub fn step(&self, variant: Option<&str>, page: u32) -> Result<FetchStep, SourceError> {
        let position = match self.pagination {
            Pagination::Offset => u64::from(page) * u64::from(self.page_size),
            Pagination::Page => u64::from(page) + 1,
        };
        let mut query = self.query.clone();
        query.push((self.size_param.clone(), self.page_size.to_string()));
        query.push((self.page_param.clone(), position.to_string()));
        if let Some((param, date)) = &self.since {
            query.push((param.clone(), date.clone()));
        }
        Ok(FetchStep {
            endpoint: render_endpoint(&self.endpoint, variant, None)?,
            query,
            variant: variant.map(str::to_owned),
            label: format!("{} page {}", variant.unwrap_or(&self.endpoint), page + 1),
        })
    }

    /// Whether another page should be requested after one that returned
    /// `item_count` items.
    #[must_use]
    pub fn has_more(&self, body: &Value, item_count: usize) -> bool {
        if item_count < self.page_size as usize {
            return false;
        }
        self.next_path
            .as_deref()
            .is_none_or(|path| resolve_path(body, path).is_some_and(|next| !next.is_null()))
    }
}

/// Latest-sols walk driven by a per-variant manifest.
#[derive(Debug, Clone)]
pub struct SolPlan {
    endpoint: String,
    manifest_endpoint: String,
    max_sol_path: String,
    sol_param: String,
    manifest_path: Option<String>,
    manifest_domain: Option<Domain>,
    span: u32,
    variants: Vec<Option<String>>,
    query: Vec<(String, String)>,
}

impl SolPlan {
    #[must_use]
    pub fn variants(&self) -> &[Option<String>] {
        &self.variants
    }

    /// The manifest call for `variant`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Config`] if the manifest template cannot be
    /// rendered.
    pub fn manifest_step(&self, variant: Option<&str>) -> Result<FetchStep, SourceError> {
        Ok(FetchStep {
            endpoint: render_endpoint(&self.manifest_endpoint, variant, None)?,
            query: self.query.clone(),
            variant: variant.map(str::to_owned),
            label: format!("{} manifest", variant.unwrap_or("rover")),
        })
    }

    /// Reads the latest sol from a manifest response.
    #[must_use]
    pub fn max_sol(&self, manifest: &Value) -> Option<i64> {
        resolve_path(manifest, &self.max_sol_path).and_then(value_to_i64)
    }

    /// Items of a manifest response to store, with the domain they belong
    /// to. `None` when the target does not keep manifests.
    #[must_use]
    pub fn manifest_records(&self, manifest: &Value) -> Option<(Domain, Vec<Value>)> {
        self.manifest_domain
            .map(|domain| (domain, extract_items(manifest, self.manifest_path.as_deref())))
    }

    /// Calls for the latest `span` sols up to `max_sol`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Config`] if the endpoint template cannot be
    /// rendered.
    pub fn sol_steps(
        &self,
        variant: Option<&str>,
        max_sol: i64,
    ) -> Result<Vec<FetchStep>, SourceError> {
        if self.span == 0 || max_sol < 0 {
            return Ok(Vec::new());
        }
        let first = (max_sol - i64::from(self.span) + 1).max(0);
        let endpoint = render_endpoint(&self.endpoint, variant, None)?;

        Ok((first..=max_sol)
            .map(|sol| {
                let mut query = self.query.clone();
                query.push((self.sol_param.clone(), sol.to_string()));
                FetchStep {
                    endpoint: endpoint.clone(),
                    query,
                    variant: variant.map(str::to_owned),
                    label: format!("{} sol {sol}", variant.unwrap_or("rover")),
                }
            })
            .collect())
    }
}

/// Splits `span` calendar days into inclusive `(start, end)` windows of at
/// most `window_days` days, oldest first.
///
/// # Errors
///
/// Returns [`SourceError::Config`] if the range leaves chrono's date range.
pub fn date_windows(
    direction: Direction,
    span: u32,
    window_days: Option<u32>,
    today: NaiveDate,
) -> Result<Vec<(NaiveDate, NaiveDate)>, SourceError> {
    if span == 0 {
        return Ok(Vec::new());
    }
    let out_of_range = || SourceError::config(format!("{span}-day window out of range"));
    let extent = Days::new(u64::from(span - 1));

    let (first, last) = match direction {
        Direction::Past => (today.checked_sub_days(extent).ok_or_else(out_of_range)?, today),
        Direction::Future => (today, today.checked_add_days(extent).ok_or_else(out_of_range)?),
    };
    let size = u64::from(window_days.unwrap_or(span).max(1));

    let mut windows = Vec::new();
    let mut start = first;
    while start <= last {
        let end = start
            .checked_add_days(Days::new(size - 1))
            .map_or(last, |end| end.min(last));
        windows.push((start, end));
        match end.succ_opt() {
            Some(next) => start = next,
            None => break,
        }
    }
    Ok(windows)
}

fn render_endpoint(
    template: &str,
    variant: Option<&str>,
    date: Option<NaiveDate>,
) -> Result<String, SourceError> {
    let mut endpoint = template.to_owned();
    if let Some(variant) = variant {
        endpoint = endpoint.replace("{variant}", variant);
    }
    if let Some(date) = date {
        endpoint = endpoint.replace("{date}", &date.format(DATE_FORMAT).to_string());
    }
    if endpoint.contains('{') {
        return Err(SourceError::config(format!(
            "unresolved placeholder in endpoint '{endpoint}'"
        )));
    }
    Ok(endpoint)
}

fn render_query(
    query: &BTreeMap<String, String>,
    limit: Option<u32>,
) -> Result<Vec<(String, String)>, SourceError> {
    query
        .iter()
        .map(|(key, value)| {
            if !value.contains("{limit}") {
                return Ok((key.clone(), value.clone()));
            }
            let limit = limit.ok_or_else(|| {
                SourceError::config(format!("query parameter '{key}' needs a limit"))
            })?;
            Ok((key.clone(), value.replace("{limit}", &limit.to_string())))
        })
        .collect()
}

fn window_label(variant: Option<&str>, start: NaiveDate, end: NaiveDate) -> String {
    let range = if start == end {
        start.format(DATE_FORMAT).to_string()
    } else {
        format!("{}..{}", start.format(DATE_FORMAT), end.format(DATE_FORMAT))
    };
    match variant {
        Some(v) => format!("{v} {range}"),
        None => range,
    }
}
