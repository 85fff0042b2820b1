#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Outbound HTTP adapter for upstream space-data APIs.
//!
//! [`UpstreamClient`] is the seam the sync orchestrator talks to. The
//! production implementation, [`HttpUpstream`], attaches auth parameters,
//! enforces a per-call timeout, and reports every call to a
//! [`UsageRecorder`]. It never retries and never returns an error for a
//! failed call: failures come back as a [`FetchResponse`] with no body.

pub mod http;
pub mod usage;

use std::time::Duration;

use async_trait::async_trait;

pub use http::{AuthParam, HttpUpstream, UpstreamConfig};
pub use usage::{MemoryUsageRecorder, UsageRecorder};

/// Errors raised while constructing a client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The underlying HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// A configured header name or value is invalid.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),
}

/// Result of one upstream call.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResponse {
    /// HTTP status code, `0` if the call never returned.
    pub status: u16,
    /// Wall-clock time spent on the call.
    pub latency: Duration,
    /// Decoded JSON body. `None` for any failure.
    pub body: Option<serde_json::Value>,
    /// Short description of what went wrong, if anything did.
    pub error: Option<String>,
}

impl FetchResponse {
    /// A successful response carrying `body`.
    #[must_use]
    pub const fn ok(status: u16, latency: Duration, body: serde_json::Value) -> Self {
        Self {
            status,
            latency,
            body: Some(body),
            error: None,
        }
    }

    /// A failed response.
    #[must_use]
    pub fn failed(status: u16, latency: Duration, error: impl Into<String>) -> Self {
        Self {
            status,
            latency,
            body: None,
            error: Some(error.into()),
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.body.is_some()
    }
}

/// A named upstream API that can be queried for JSON.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// Upstream name as configured (e.g. `"nasa"`).
    fn name(&self) -> &str;

    /// Issues one GET for `endpoint` with the given query parameters.
    ///
    /// Implementations must not retry and must not fail: transport and
    /// decode problems are reported through the returned [`FetchResponse`].
    async fn fetch(&self, endpoint: &str, query: &[(String, String)]) -> FetchResponse;
}
