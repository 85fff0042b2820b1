//! Location of the `DuckDB` file.

use std::path::{Path, PathBuf};

/// Environment variable overriding the database path.
pub const DB_ENV: &str = "ASTRO_SYNC_DB";

/// Default database path, relative to the working directory.
pub const DEFAULT_DB_PATH: &str = "data/astro_sync.duckdb";

/// Database path from `ASTRO_SYNC_DB`, falling back to
/// [`DEFAULT_DB_PATH`].
#[must_use]
pub fn db_path_from_env() -> PathBuf {
    db_path_with(|key| std::env::var(key).ok())
}

pub(crate) fn db_path_with(lookup: impl Fn(&str) -> Option<String>) -> PathBuf {
    lookup(DB_ENV)
        .filter(|p| !p.trim().is_empty())
        .map_or_else(|| PathBuf::from(DEFAULT_DB_PATH), PathBuf::from)
}

/// Ensures a directory exists, creating it if necessary.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.as_os_str().is_empty() && !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}
