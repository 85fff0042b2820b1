#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `DuckDB` persistence for synchronized records and API usage.
//!
//! A single [`Store`] owns one `DuckDB` connection behind a mutex. It
//! implements [`RecordStore`] (the upsert persister used by sync runs) and
//! [`astro_sync_client::UsageRecorder`] (one `api_usage_log` row per
//! outbound call).

pub mod paths;
pub mod store;
pub mod usage;

use astro_sync_domain_models::{CanonicalRecord, Domain};

pub use store::Store;
pub use usage::EndpointUsage;

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// `DuckDB` error.
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    /// I/O error (e.g., creating the data directory).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored fields could not be encoded or decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}

/// Keyed storage for canonical records.
///
/// Records are identified by `(domain, external_key)`. Writes are
/// last-write-wins: re-observing a key overwrites its fields in place.
pub trait RecordStore: Send + Sync {
    /// Inserts or overwrites `record`. Returns `true` if the key was new.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the record cannot be encoded or written.
    fn upsert(&self, record: &CanonicalRecord) -> Result<bool, DbError>;

    /// Re-fetches a stored record.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails or the stored fields no
    /// longer decode.
    fn get(&self, domain: Domain, external_key: &str)
    -> Result<Option<CanonicalRecord>, DbError>;

    /// Number of records stored for `domain`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    fn count(&self, domain: Domain) -> Result<u64, DbError>;
}

/// Formats a timestamp the way `DuckDB` accepts it for `TIMESTAMP` columns.
pub(crate) fn format_timestamp(dt: &chrono::DateTime<chrono::Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

/// Parses a `DuckDB` timestamp text representation into a UTC `DateTime`.
///
/// `::TEXT` casts drop the fractional part when it is zero and may carry an
/// offset for `TIMESTAMPTZ` columns, so each shape is tried in turn.
pub(crate) fn parse_timestamp(s: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    use chrono::{DateTime, NaiveDateTime, Utc};

    for format in ["%Y-%m-%d %H:%M:%S%#z", "%Y-%m-%d %H:%M:%S%.f%#z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }

    log::warn!("Failed to parse timestamp: {s:?}");
    None
}
