//! Manifest database schema
//!
//! The manifest indexes stored pages; the HTML itself lives on disk next to it.

/// SQL schema for the manifest
pub const SCHEMA_SQL: &str = r#"
-- One row per stored page; re-crawls of the same URL replace the row
CREATE TABLE IF NOT EXISTS pages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant TEXT NOT NULL,
    url_key TEXT NOT NULL,
    url TEXT NOT NULL,
    path TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    size INTEGER NOT NULL,
    crawled_at TEXT NOT NULL,
    UNIQUE(tenant, url_key)
);

CREATE INDEX IF NOT EXISTS idx_pages_tenant ON pages(tenant);
CREATE INDEX IF NOT EXISTS idx_pages_hash ON pages(tenant, content_hash);
"#;

/// Initializes the manifest schema
///
/// Safe to call on an existing database.
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.pragma_update(None, "user_version", schema_version())?;
    Ok(())
}

/// Current manifest schema version, stored in `PRAGMA user_version`
pub fn schema_version() -> u32 {
    1
}
