//! SQLite manifest of stored pages

use crate::storage::schema::initialize_schema;
use crate::storage::traits::StorageResult;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// One stored page as recorded in the manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub tenant: String,
    /// Normalized URL the page was stored under
    pub url_key: String,
    pub url: String,
    pub path: String,
    pub content_hash: String,
    pub size: u64,
    /// RFC 3339 timestamp of the last write
    pub crawled_at: String,
}

/// Manifest backed by a single SQLite connection
///
/// Writes are short and serialized behind a mutex.
pub struct SqliteManifest {
    conn: Mutex<Connection>,
}

impl SqliteManifest {
    /// Opens or creates the manifest at `path`
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory manifest (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Inserts or replaces the row for `(tenant, url_key)`
    pub fn record(&self, entry: &ManifestEntry) -> StorageResult<()> {
        self.lock().execute(
            "INSERT INTO pages (tenant, url_key, url, path, content_hash, size, crawled_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(tenant, url_key) DO UPDATE SET
                url = excluded.url,
                path = excluded.path,
                content_hash = excluded.content_hash,
                size = excluded.size,
                crawled_at = excluded.crawled_at",
            params![
                entry.tenant,
                entry.url_key,
                entry.url,
                entry.path,
                entry.content_hash,
                entry.size as i64,
                entry.crawled_at,
            ],
        )?;
        Ok(())
    }

    pub fn get(&self, tenant: &str, url_key: &str) -> StorageResult<Option<ManifestEntry>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT tenant, url_key, url, path, content_hash, size, crawled_at
             FROM pages WHERE tenant = ?1 AND url_key = ?2",
        )?;
        let entry = stmt
            .query_row(params![tenant, url_key], row_to_entry)
            .optional()?;
        Ok(entry)
    }

    /// All pages stored for `tenant`, ordered by URL key
    pub fn list(&self, tenant: &str) -> StorageResult<Vec<ManifestEntry>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT tenant, url_key, url, path, content_hash, size, crawled_at
             FROM pages WHERE tenant = ?1 ORDER BY url_key",
        )?;
        let entries = stmt
            .query_map(params![tenant], row_to_entry)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn count(&self, tenant: &str) -> StorageResult<u64> {
        let count: i64 = self.lock().query_row(
            "SELECT COUNT(*) FROM pages WHERE tenant = ?1",
            params![tenant],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Tenants with at least one stored page
    pub fn tenants(&self) -> StorageResult<Vec<String>> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT DISTINCT tenant FROM pages ORDER BY tenant")?;
        let tenants = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(tenants)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<ManifestEntry> {
    Ok(ManifestEntry {
        tenant: row.get(0)?,
        url_key: row.get(1)?,
        url: row.get(2)?,
        path: row.get(3)?,
        content_hash: row.get(4)?,
        size: row.get::<_, i64>(5)? as u64,
        crawled_at: row.get(6)?,
    })
}
