//! Filesystem page store
//!
//! Layout under the configured root:
//!
//! ```text
//! <root>/manifest.db
//! <root>/<tenant-dir>/<url-slug>-<hash>.html
//! ```
//!
//! File names derive from the normalized URL, so storing the same page twice
//! overwrites the earlier copy instead of accumulating duplicates. Writes go
//! to a temporary file first and are renamed into place, so readers never see
//! a partially written page.

use crate::storage::sqlite::{ManifestEntry, SqliteManifest};
use crate::storage::traits::{ContentRef, PageStore, StorageError, StorageResult, StoredContent};
use crate::url::normalize_url;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Manifest file name inside the store root
pub const MANIFEST_FILE: &str = "manifest.db";

/// Longest URL slug kept in a file name
const MAX_SLUG_LEN: usize = 80;

/// Page store writing one HTML file per page
pub struct FsPageStore {
    root: PathBuf,
    manifest: SqliteManifest,
    temp_counter: AtomicU64,
}

impl FsPageStore {
    /// Opens or creates a store rooted at `root`
    ///
    /// # Returns
    ///
    /// * `Ok(FsPageStore)` - Root directory and manifest are ready
    /// * `Err(StorageError)` - The directory or manifest could not be created
    pub fn open(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        let manifest = SqliteManifest::open(&root.join(MANIFEST_FILE))?;

        tracing::debug!("Opened page store at {}", root.display());

        Ok(Self {
            root,
            manifest,
            temp_counter: AtomicU64::new(0),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding `tenant`'s pages
    pub fn tenant_dir(&self, tenant: &str) -> StorageResult<PathBuf> {
        Ok(self.root.join(tenant_dir_name(tenant)?))
    }

    /// Manifest rows for every page stored under `tenant`
    pub fn list_pages(&self, tenant: &str) -> StorageResult<Vec<ManifestEntry>> {
        self.manifest.list(tenant)
    }

    /// Tenants with stored pages
    pub fn tenants(&self) -> StorageResult<Vec<String>> {
        self.manifest.tenants()
    }

    fn temp_path(&self, dir: &Path, file_name: &str) -> PathBuf {
        let n = self.temp_counter.fetch_add(1, Ordering::Relaxed);
        dir.join(format!(".{file_name}.{}.{n}.tmp", std::process::id()))
    }
}

impl PageStore for FsPageStore {
    async fn prepare_tenant(&self, tenant: &str) -> StorageResult<()> {
        let dir = self.tenant_dir(tenant)?;
        tokio::fs::create_dir_all(&dir).await?;
        Ok(())
    }

    async fn persist(&self, tenant: &str, url: &str, html: &str) -> StorageResult<StoredContent> {
        let dir = self.tenant_dir(tenant)?;
        tokio::fs::create_dir_all(&dir).await?;

        let url_key = page_key(url);
        let file_name = page_file_name(&url_key);
        let path = dir.join(&file_name);
        let temp = self.temp_path(&dir, &file_name);

        tokio::fs::write(&temp, html.as_bytes()).await?;
        if let Err(e) = tokio::fs::rename(&temp, &path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e.into());
        }

        let stored = StoredContent {
            content_ref: ContentRef::new(path.clone()),
            content_hash: content_hash(html.as_bytes()),
            size: html.len() as u64,
        };

        let entry = ManifestEntry {
            tenant: tenant.to_string(),
            url_key,
            url: url.to_string(),
            path: stored.content_ref.to_string(),
            content_hash: stored.content_hash.clone(),
            size: stored.size,
            crawled_at: Utc::now().to_rfc3339(),
        };
        // A page missing from the manifest must not be left on disk.
        if let Err(e) = self.manifest.record(&entry) {
            let _ = tokio::fs::remove_file(&path).await;
            return Err(e);
        }

        tracing::trace!("Stored {} ({} bytes) at {}", url, stored.size, stored.content_ref);

        Ok(stored)
    }

    async fn read(&self, content_ref: &ContentRef) -> StorageResult<String> {
        match tokio::fs::read_to_string(content_ref.path()).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::UnknownReference(content_ref.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Hex SHA-256 of `bytes`
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Directory name for a tenant
///
/// Tenants made only of lowercase ASCII letters, digits, `-` and `_` map to
/// themselves. Anything else is slugged and suffixed with a hash of the
/// tenant name, so distinct tenants never share a directory, including on
/// case-insensitive filesystems.
pub fn tenant_dir_name(tenant: &str) -> StorageResult<String> {
    if tenant.trim().is_empty() {
        return Err(StorageError::InvalidTenant(tenant.to_string()));
    }

    let slug: String = tenant
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();

    if slug == tenant {
        Ok(slug)
    } else {
        let digest = content_hash(tenant.as_bytes());
        Ok(format!("{}-{}", truncate(&slug, MAX_SLUG_LEN), &digest[..12]))
    }
}

/// Key a page is stored under: its normalized URL when it has one
fn page_key(url: &str) -> String {
    normalize_url(url)
        .map(|key| key.to_string())
        .unwrap_or_else(|_| url.to_string())
}

/// File name for a page key: readable slug plus a hash for uniqueness
fn page_file_name(url_key: &str) -> String {
    let without_scheme = url_key
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(url_key);

    let mut slug = String::with_capacity(without_scheme.len());
    for c in without_scheme.chars() {
        if c.is_ascii_alphanumeric() || c == '.' {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = truncate(slug.trim_matches(|c| c == '-' || c == '.'), MAX_SLUG_LEN);
    let slug = if slug.is_empty() { "page" } else { slug };

    let digest = content_hash(url_key.as_bytes());
    format!("{}-{}.html", slug, &digest[..16])
}

// Slugs are ASCII, so byte slicing is safe.
fn truncate(s: &str, max: usize) -> &str {
    if s.len() > max {
        &s[..max]
    } else {
        s
    }
}
