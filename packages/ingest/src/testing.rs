//! Scripted upstream client and target fixtures for orchestrator tests.

use std::sync::Mutex;
use std::time::Duration;

use astro_sync_client::{FetchResponse, UpstreamClient};
use astro_sync_domain_models::Domain;
use astro_sync_source::target::{Cadences, Direction, RunParams, SyncTarget, WindowStrategy};
use async_trait::async_trait;
use serde_json::Value;

type Responder = dyn Fn(usize, &str, &[(String, String)]) -> FetchResponse + Send + Sync;

/// One call seen by a [`ScriptedClient`].
#[derive(Debug, Clone)]
pub struct Call {
    pub endpoint: String,
    pub query: Vec<(String, String)>,
    pub at: tokio::time::Instant,
}

/// Answers each call with a closure of `(call index, endpoint, query)`.
pub struct ScriptedClient {
    respond: Box<Responder>,
    latency: Duration,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedClient {
    pub fn new(
        respond: impl Fn(usize, &str, &[(String, String)]) -> FetchResponse + Send + Sync + 'static,
    ) -> Self {
        Self {
            respond: Box::new(respond),
            latency: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Fails every call with a 503.
    pub fn unavailable() -> Self {
        Self::new(|_, _, _| failed(503))
    }

    /// Sleeps for `latency` inside every call.
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl UpstreamClient for ScriptedClient {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn fetch(&self, endpoint: &str, query: &[(String, String)]) -> FetchResponse {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(Call {
                endpoint: endpoint.to_string(),
                query: query.to_vec(),
                at: tokio::time::Instant::now(),
            });
            calls.len() - 1
        };
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        (self.respond)(index, endpoint, query)
    }
}

pub fn ok(body: Value) -> FetchResponse {
    FetchResponse::ok(200, Duration::from_millis(5), body)
}

pub fn failed(status: u16) -> FetchResponse {
    FetchResponse::failed(status, Duration::from_millis(5), format!("HTTP {status}"))
}

pub fn param<'a>(query: &'a [(String, String)], key: &str) -> Option<&'a str> {
    query
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// A past-facing, one-day-per-call target on the `scripted` upstream.
pub fn daily_windows_target(domain: Domain, delay_ms: u64) -> SyncTarget {
    SyncTarget {
        domain,
        name: format!("{domain} (test)"),
        upstream: "scripted".to_string(),
        endpoint: "items".to_string(),
        delay_ms,
        strategy: WindowStrategy::DateRange {
            direction: Direction::Past,
            window_days: Some(1),
            start_param: Some("date".to_string()),
            end_param: None,
        },
        records_path: None,
        variants: Vec::new(),
        variant_field: None,
        query: std::collections::BTreeMap::new(),
        cadence: Cadences {
            daily: Some(RunParams {
                span: 2,
                limit: None,
            }),
            weekly: Some(RunParams {
                span: 7,
                limit: None,
            }),
        },
    }
}

/// An APOD item for `date`.
pub fn apod_item(date: &str, title: &str) -> Value {
    serde_json::json!({
        "date": date,
        "title": title,
        "url": format!("https://apod.test/{date}.jpg"),
        "explanation": "",
        "media_type": "image"
    })
}
