//! The `records` table and the [`Store`] connection wrapper.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use astro_sync_domain_models::{CanonicalRecord, Domain, DomainFields};
use duckdb::Connection;

use crate::{DbError, RecordStore, format_timestamp, parse_timestamp};

/// A `DuckDB` connection shared by every sync task.
///
/// `duckdb::Connection` is `Send` but not `Sync`, so it sits behind a
/// `Mutex`. Each upsert holds the lock for its whole read-then-write, which
/// makes a single-record upsert atomic without a run-wide transaction.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Opens (or creates) the database at `path` and ensures the schema.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the directory, connection, or schema cannot
    /// be created.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            crate::paths::ensure_dir(parent)?;
        }
        log::debug!("Opening DuckDB at {}", path.display());
        Self::init(Connection::open(path)?)
    }

    /// Opens the database at `ASTRO_SYNC_DB` or the default path.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the database cannot be opened.
    pub fn open_default() -> Result<Self, DbError> {
        Self::open(&crate::paths::db_path_from_env())
    }

    /// Opens a throwaway in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the schema cannot be created.
    pub fn open_in_memory() -> Result<Self, DbError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, DbError> {
        create_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record counts for every domain that has at least one record.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    pub fn counts_by_domain(&self) -> Result<BTreeMap<String, u64>, DbError> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT domain, COUNT(*) FROM records GROUP BY domain ORDER BY domain")?;
        let mut rows = stmt.query([])?;

        let mut counts = BTreeMap::new();
        while let Some(row) = rows.next()? {
            let domain: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            counts.insert(domain, to_u64(count)?);
        }
        Ok(counts)
    }
}

fn create_schema(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS records (
            domain TEXT NOT NULL,
            external_key TEXT NOT NULL,
            reported_at TIMESTAMP,
            fields TEXT NOT NULL,
            first_seen_at TIMESTAMP NOT NULL,
            last_seen_at TIMESTAMP NOT NULL,
            PRIMARY KEY (domain, external_key)
        );

        CREATE SEQUENCE IF NOT EXISTS api_usage_log_id_seq;

        CREATE TABLE IF NOT EXISTS api_usage_log (
            id BIGINT PRIMARY KEY DEFAULT nextval('api_usage_log_id_seq'),
            endpoint TEXT NOT NULL,
            called_at TIMESTAMP NOT NULL,
            latency_secs DOUBLE NOT NULL,
            status_code INTEGER NOT NULL,
            error TEXT
        );",
    )?;
    Ok(())
}

pub(crate) fn to_u64(count: i64) -> Result<u64, DbError> {
    u64::try_from(count).map_err(|_| DbError::Conversion {
        message: format!("negative count {count}"),
    })
}

impl RecordStore for Store {
    fn upsert(&self, record: &CanonicalRecord) -> Result<bool, DbError> {
        let fields = serde_json::to_string(&record.fields)?;
        let reported_at = record.reported_at.as_ref().map(format_timestamp);
        let now = format_timestamp(&chrono::Utc::now());

        let conn = self.conn();
        let existing: i64 = conn
            .prepare("SELECT COUNT(*) FROM records WHERE domain = ? AND external_key = ?")?
            .query_row(
                duckdb::params![record.domain.as_ref(), record.external_key],
                |row| row.get(0),
            )?;

        conn.execute(
            "INSERT INTO records
                (domain, external_key, reported_at, fields, first_seen_at, last_seen_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT (domain, external_key) DO UPDATE SET
                reported_at = EXCLUDED.reported_at,
                fields = EXCLUDED.fields,
                last_seen_at = EXCLUDED.last_seen_at",
            duckdb::params![
                record.domain.as_ref(),
                record.external_key,
                reported_at,
                fields,
                now,
                now,
            ],
        )?;

        Ok(existing == 0)
    }

    fn get(
        &self,
        domain: Domain,
        external_key: &str,
    ) -> Result<Option<CanonicalRecord>, DbError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT reported_at::TEXT, fields FROM records
             WHERE domain = ? AND external_key = ?",
        )?;
        let result = stmt.query_row(duckdb::params![domain.as_ref(), external_key], |row| {
            Ok((row.get::<_, Option<String>>(0)?, row.get::<_, String>(1)?))
        });

        let (reported_at, fields) = match result {
            Ok(row) => row,
            Err(duckdb::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(DbError::DuckDb(e)),
        };

        let fields: DomainFields = serde_json::from_str(&fields)?;
        if fields.domain() != domain {
            return Err(DbError::Conversion {
                message: format!(
                    "{domain}/{external_key} holds {} fields",
                    fields.domain()
                ),
            });
        }

        Ok(Some(CanonicalRecord::new(
            external_key,
            reported_at.as_deref().and_then(parse_timestamp),
            fields,
        )))
    }

    fn count(&self, domain: Domain) -> Result<u64, DbError> {
        let conn = self.conn();
        let count: i64 = conn
            .prepare("SELECT COUNT(*) FROM records WHERE domain = ?")?
            .query_row([domain.as_ref()], |row| row.get(0))?;
        to_u64(count)
    }
}

#[cfg(test)]
mod tests {
    use astro_sync_domain_models::{ApodFields, NeoFields};
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::*;

    fn apod(title: &str) -> CanonicalRecord {
        CanonicalRecord::new(
            "apod_20240501",
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()),
            DomainFields::Apod(ApodFields {
                date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
                title: title.to_string(),
                explanation: String::new(),
                url: "http://x".to_string(),
                hdurl: None,
                media_type: "image".to_string(),
                copyright: None,
            }),
        )
    }

    #[test]
    fn first_upsert_creates_then_overwrites_in_place() {
        let store = Store::open_in_memory().unwrap();

        assert!(store.upsert(&apod("T")).unwrap());
        assert!(!store.upsert(&apod("Renamed")).unwrap());

        assert_eq!(store.count(Domain::Apod).unwrap(), 1);
        let stored = store.get(Domain::Apod, "apod_20240501").unwrap().unwrap();
        assert_eq!(stored, apod("Renamed"));
    }

    #[test]
    fn keys_are_scoped_per_domain() {
        let store = Store::open_in_memory().unwrap();
        store.upsert(&apod("T")).unwrap();

        let neo = CanonicalRecord::new(
            "apod_20240501",
            None,
            DomainFields::NearEarthObject(NeoFields {
                name: "(2024 AB)".to_string(),
                designation: "2024 AB".to_string(),
                is_potentially_hazardous: false,
                diameter_min_km: 0.1,
                diameter_max_km: 0.25,
                absolute_magnitude: 22.1,
                is_sentry_object: false,
                close_approaches: Vec::new(),
            }),
        );
        assert!(store.upsert(&neo).unwrap());

        assert_eq!(store.count(Domain::Apod).unwrap(), 1);
        assert_eq!(store.count(Domain::NearEarthObjects).unwrap(), 1);
        assert_eq!(
            store.get(Domain::NearEarthObjects, "apod_20240501").unwrap(),
            Some(neo)
        );

        let counts = store.counts_by_domain().unwrap();
        assert_eq!(counts.get("apod"), Some(&1));
        assert_eq!(counts.get("near_earth_objects"), Some(&1));
    }

    #[test]
    fn missing_record_is_none() {
        let store = Store::open_in_memory().unwrap();
        assert!(store.get(Domain::Launches, "nope").unwrap().is_none());
        assert_eq!(store.count(Domain::Launches).unwrap(), 0);
    }

    #[test]
    fn reopening_a_file_keeps_records() {
        let dir = std::env::temp_dir().join(format!("astro_sync_store_{}", std::process::id()));
        let path = dir.join("nested").join("records.duckdb");

        {
            let store = Store::open(&path).unwrap();
            store.upsert(&apod("T")).unwrap();
        }
        let store = Store::open(&path).unwrap();
        assert!(!store.upsert(&apod("T")).unwrap());
        assert_eq!(store.count(Domain::Apod).unwrap(), 1);

        drop(store);
        std::fs::remove_dir_all(&dir).ok();
    }
}
