//! `reqwest`-backed [`UpstreamClient`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use astro_sync_domain_models::UsageLogEntry;
use async_trait::async_trait;
use chrono::Utc;

use crate::{ClientError, FetchResponse, UpstreamClient, UsageRecorder};

/// Default per-call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Auth key passed as a query parameter on every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthParam {
    /// Query parameter name (e.g. `api_key`).
    pub param: String,
    /// Key value.
    pub key: String,
}

/// Connection settings for one upstream.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Name used in logs and usage entries.
    pub name: String,
    /// Base URL that endpoints are appended to.
    pub base_url: String,
    /// Auth parameter, if the upstream needs one.
    pub auth: Option<AuthParam>,
    /// Per-call timeout.
    pub timeout: Duration,
    /// Whether endpoint paths must end in `/`.
    pub trailing_slash: bool,
    /// Extra HTTP headers sent with every request.
    pub headers: BTreeMap<String, String>,
}

impl UpstreamConfig {
    /// Creates a config with no auth, the default timeout, and no headers.
    #[must_use]
    pub fn new(name: &str, base_url: &str) -> Self {
        Self {
            name: name.to_owned(),
            base_url: base_url.to_owned(),
            auth: None,
            timeout: DEFAULT_TIMEOUT,
            trailing_slash: false,
            headers: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_auth(mut self, param: &str, key: &str) -> Self {
        self.auth = Some(AuthParam {
            param: param.to_owned(),
            key: key.to_owned(),
        });
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_trailing_slash(mut self, trailing_slash: bool) -> Self {
        self.trailing_slash = trailing_slash;
        self
    }

    #[must_use]
    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(key.to_owned(), value.to_owned());
        self
    }

    /// Joins `endpoint` onto the base URL.
    #[must_use]
    pub fn url_for(&self, endpoint: &str) -> String {
        let mut url = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        );
        if self.trailing_slash && !url.ends_with('/') {
            url.push('/');
        }
        url
    }
}

/// Production upstream client.
pub struct HttpUpstream {
    config: UpstreamConfig,
    http: reqwest::Client,
    recorder: Arc<dyn UsageRecorder>,
}

impl HttpUpstream {
    /// Builds a client for `config` that reports calls to `recorder`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if a configured header is invalid or the
    /// HTTP client cannot be built.
    pub fn new(
        config: UpstreamConfig,
        recorder: Arc<dyn UsageRecorder>,
    ) -> Result<Self, ClientError> {
        let http = build_client(&config)?;
        Ok(Self {
            config,
            http,
            recorder,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &UpstreamConfig {
        &self.config
    }

    async fn send(
        &self,
        url: &str,
        query: &[(String, String)],
    ) -> (u16, Option<serde_json::Value>, Option<String>) {
        let mut request = self.http.get(url).query(query);
        if let Some(auth) = &self.config.auth {
            request = request.query(&[(auth.param.as_str(), auth.key.as_str())]);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return (0, None, Some(describe(&e))),
        };

        let status = response.status();
        if !status.is_success() {
            return (status.as_u16(), None, Some(format!("HTTP {status}")));
        }

        match response.text().await {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(value) => (status.as_u16(), Some(value), None),
                Err(e) => (
                    status.as_u16(),
                    None,
                    Some(format!("invalid JSON ({} bytes): {e}", text.len())),
                ),
            },
            Err(e) => (status.as_u16(), None, Some(describe(&e))),
        }
    }
}

#[async_trait]
impl UpstreamClient for HttpUpstream {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn fetch(&self, endpoint: &str, query: &[(String, String)]) -> FetchResponse {
        let url = self.config.url_for(endpoint);
        log::debug!("[{}] GET {url} {query:?}", self.config.name);

        let timestamp = Utc::now();
        let started = Instant::now();
        let (status, body, error) = self.send(&url, query).await;
        let latency = started.elapsed();

        if let Some(e) = &error {
            log::warn!(
                "[{}] {endpoint} failed after {:.2}s: {e}",
                self.config.name,
                latency.as_secs_f64()
            );
        }

        self.recorder.record(UsageLogEntry {
            endpoint: format!("{}:{endpoint}", self.config.name),
            timestamp,
            latency_secs: latency.as_secs_f64(),
            status_code: status,
            error: error.clone(),
        });

        FetchResponse {
            status,
            latency,
            body,
            error,
        }
    }
}

/// Builds a [`reqwest::Client`] with the configured headers and timeout.
fn build_client(config: &UpstreamConfig) -> Result<reqwest::Client, ClientError> {
    let mut header_map = reqwest::header::HeaderMap::new();
    for (key, value) in &config.headers {
        let name = reqwest::header::HeaderName::from_bytes(key.as_bytes())
            .map_err(|e| ClientError::InvalidHeader(format!("'{key}': {e}")))?;
        let val = reqwest::header::HeaderValue::from_str(value)
            .map_err(|e| ClientError::InvalidHeader(format!("'{key}' value '{value}': {e}")))?;
        header_map.insert(name, val);
    }
    Ok(reqwest::Client::builder()
        .default_headers(header_map)
        .timeout(config.timeout)
        .build()?)
}

fn describe(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("timed out: {e}")
    } else if e.is_connect() {
        format!("connection failed: {e}")
    } else {
        e.to_string()
    }
}
