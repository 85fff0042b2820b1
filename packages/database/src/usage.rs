//! The `api_usage_log` table.

use astro_sync_client::UsageRecorder;
use astro_sync_domain_models::UsageLogEntry;

use crate::store::to_u64;
use crate::{DbError, Store, format_timestamp, parse_timestamp};

/// Aggregated calls for one endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointUsage {
    pub endpoint: String,
    pub calls: u64,
    /// Calls that never returned, returned non-2xx, or carried an error.
    pub errors: u64,
    pub mean_latency_secs: f64,
}

impl Store {
    /// Appends one usage entry.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the insert fails.
    pub fn insert_usage(&self, entry: &UsageLogEntry) -> Result<(), DbError> {
        self.conn().execute(
            "INSERT INTO api_usage_log (endpoint, called_at, latency_secs, status_code, error)
             VALUES (?, ?, ?, ?, ?)",
            duckdb::params![
                entry.endpoint,
                format_timestamp(&entry.timestamp),
                entry.latency_secs,
                i32::from(entry.status_code),
                entry.error.as_deref(),
            ],
        )?;
        Ok(())
    }

    /// The most recent `limit` entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails or a row does not convert.
    pub fn recent_usage(&self, limit: u32) -> Result<Vec<UsageLogEntry>, DbError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT endpoint, called_at::TEXT, latency_secs, status_code, error
             FROM api_usage_log ORDER BY id DESC LIMIT ?",
        )?;
        let mut rows = stmt.query([i64::from(limit)])?;

        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            let called_at: String = row.get(1)?;
            let status_code: i32 = row.get(3)?;
            entries.push(UsageLogEntry {
                endpoint: row.get(0)?,
                timestamp: parse_timestamp(&called_at).ok_or_else(|| DbError::Conversion {
                    message: format!("bad called_at {called_at:?}"),
                })?,
                latency_secs: row.get(2)?,
                status_code: u16::try_from(status_code).map_err(|_| DbError::Conversion {
                    message: format!("bad status code {status_code}"),
                })?,
                error: row.get(4)?,
            });
        }
        Ok(entries)
    }

    /// Per-endpoint call counts, error counts, and mean latency.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    pub fn usage_summary(&self) -> Result<Vec<EndpointUsage>, DbError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT endpoint,
                    COUNT(*),
                    COUNT(*) FILTER (
                        WHERE error IS NOT NULL OR status_code < 200 OR status_code >= 300
                    ),
                    AVG(latency_secs)
             FROM api_usage_log
             GROUP BY endpoint
             ORDER BY endpoint",
        )?;
        let mut rows = stmt.query([])?;

        let mut summary = Vec::new();
        while let Some(row) = rows.next()? {
            let calls: i64 = row.get(1)?;
            let errors: i64 = row.get(2)?;
            summary.push(EndpointUsage {
                endpoint: row.get(0)?,
                calls: to_u64(calls)?,
                errors: to_u64(errors)?,
                mean_latency_secs: row.get(3)?,
            });
        }
        Ok(summary)
    }
}

impl UsageRecorder for Store {
    fn record(&self, entry: UsageLogEntry) {
        if let Err(e) = self.insert_usage(&entry) {
            log::warn!(
                "[usage] Failed to record call to {} (status {}): {e}",
                entry.endpoint,
                entry.status_code
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn entry(endpoint: &str, status_code: u16, latency_secs: f64) -> UsageLogEntry {
        UsageLogEntry {
            endpoint: endpoint.to_string(),
            timestamp: Utc::now(),
            latency_secs,
            status_code,
            error: (status_code == 0).then(|| "connection failed: refused".to_string()),
        }
    }

    #[test]
    fn recorded_entries_come_back_newest_first() {
        let store = Store::open_in_memory().unwrap();
        store.record(entry("nasa:planetary/apod", 200, 0.25));
        store.record(entry("nasa:planetary/apod", 0, 30.0));

        let recent = store.recent_usage(10).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].status_code, 0);
        assert_eq!(
            recent[0].error.as_deref(),
            Some("connection failed: refused")
        );
        assert!(recent[1].succeeded());

        assert_eq!(store.recent_usage(1).unwrap().len(), 1);
    }

    #[test]
    fn summary_groups_by_endpoint() {
        let store = Store::open_in_memory().unwrap();
        store.record(entry("nasa:planetary/apod", 200, 0.2));
        store.record(entry("nasa:planetary/apod", 429, 0.4));
        store.record(entry("spacex:v5/launches", 200, 1.0));

        let summary = store.usage_summary().unwrap();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].endpoint, "nasa:planetary/apod");
        assert_eq!(summary[0].calls, 2);
        assert_eq!(summary[0].errors, 1);
        assert!((summary[0].mean_latency_secs - 0.3).abs() < 1e-9);
        assert_eq!(summary[1].errors, 0);
    }
}
