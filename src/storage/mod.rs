//! Tenant-scoped page storage
//!
//! This module handles persisting rendered pages:
//! - the [`PageStore`] trait the crawler writes through
//! - [`FsPageStore`], one HTML file per page under a per-tenant directory
//! - a SQLite manifest indexing what has been stored

mod fs;
mod schema;
mod sqlite;
mod traits;

pub use fs::{content_hash, tenant_dir_name, FsPageStore, MANIFEST_FILE};
pub use schema::schema_version;
pub use sqlite::{ManifestEntry, SqliteManifest};
pub use traits::{ContentRef, PageStore, StorageError, StorageResult, StoredContent};
