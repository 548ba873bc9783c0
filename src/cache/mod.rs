//! Disk-backed render cache
//!
//! Maps a request [`Fingerprint`] to the PNG bytes previously served for it.
//! Entries live in a process-scoped directory that is created on startup and
//! removed when the last [`CacheStore`] handle is dropped, so nothing survives
//! a restart.
//!
//! The store is strictly best-effort:
//!
//! - **Lookups** degrade to a miss on any read failure
//! - **Stores** are skipped once the directory reaches its byte quota
//! - **Write failures** are logged and swallowed
//!
//! Concurrent stores of the same fingerprint are not coordinated; each write
//! lands in a temporary sibling file and is renamed into place, so readers see
//! either the old entry, the new entry, or no entry.
//!
//! The directory is owned by this process and starts empty, so the quota is
//! checked against a running byte counter maintained by [`CacheStore::store`]
//! rather than by listing the directory. [`CacheStore::stats`] still scans.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use mandelbrot_server::cache::CacheStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let cache = CacheStore::builder()
//!     .parent_directory("/var/cache/mandelbrot")
//!     .quota_bytes(1024 * 1024 * 1024)
//!     .build()?;
//! println!("caching into {:?}", cache.directory());
//! # Ok(())
//! # }
//! ```

use bytes::Bytes;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tempfile::TempDir;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::config::CacheConfig;
use crate::config::defaults::{
    DEFAULT_CACHE_PARENT, DEFAULT_CACHE_PREFIX, DEFAULT_CACHE_QUOTA_BYTES,
};
use crate::errors::{CacheError, CacheResult};
use crate::models::Fingerprint;
use crate::utils::human_format::format_bytes;

/// Result of a best-effort cache write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    Stored,
    QuotaExceeded,
    Failed,
}

/// Point-in-time view of the cache directory
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub directory: PathBuf,
    pub entries: usize,
    pub bytes_used: u64,
    pub quota_bytes: u64,
}

/// Process-scoped, quota-guarded store of encoded renders
#[derive(Clone, Debug)]
pub struct CacheStore {
    dir: Arc<TempDir>,
    quota_bytes: u64,
    /// Bytes of finished entries written through this store and its clones
    used_bytes: Arc<AtomicU64>,
}

impl CacheStore {
    /// Create a new builder for configuring the store.
    #[must_use]
    pub fn builder() -> CacheStoreBuilder {
        CacheStoreBuilder::new()
    }

    /// Build a store from the `[cache]` configuration section.
    ///
    /// # Errors
    /// Returns an error if the cache directory cannot be created.
    pub fn from_config(config: &CacheConfig) -> CacheResult<Self> {
        Self::builder()
            .parent_directory(&config.parent_dir)
            .prefix(&config.prefix)
            .quota_bytes(config.quota_bytes)
            .build()
    }

    /// The directory holding the cache entries
    pub fn directory(&self) -> &Path {
        self.dir.path()
    }

    pub fn quota_bytes(&self) -> u64 {
        self.quota_bytes
    }

    /// Full path of the entry for a fingerprint
    pub fn entry_path(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.directory().join(fingerprint.file_name())
    }

    /// Read the cached bytes for a fingerprint.
    ///
    /// Missing entries and read failures are both reported as `None`; the
    /// latter are logged.
    pub async fn lookup(&self, fingerprint: &Fingerprint) -> Option<Bytes> {
        let path = self.entry_path(fingerprint);
        match fs::read(&path).await {
            Ok(content) => {
                debug!(fingerprint = %fingerprint, bytes = content.len(), "Cache hit");
                Some(Bytes::from(content))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(fingerprint = %fingerprint, "Cache miss");
                None
            }
            Err(source) => {
                let error = CacheError::Read { path, source };
                warn!(fingerprint = %fingerprint, "{}", error);
                None
            }
        }
    }

    /// Persist encoded bytes for a fingerprint unless the quota is reached.
    ///
    /// Never fails; the outcome is returned for observability.
    pub async fn store(&self, fingerprint: &Fingerprint, content: &[u8]) -> StoreOutcome {
        let used = self.used_bytes();
        if used >= self.quota_bytes {
            let error = CacheError::QuotaExceeded {
                used,
                quota: self.quota_bytes,
            };
            warn!(
                fingerprint = %fingerprint,
                used = %format_bytes(used),
                quota = %format_bytes(self.quota_bytes),
                "Not enough disk space to cache image: {}",
                error
            );
            return StoreOutcome::QuotaExceeded;
        }

        match self.write_entry(fingerprint, content).await {
            Ok(replaced) => {
                self.account(content.len() as u64, replaced);
                debug!(fingerprint = %fingerprint, bytes = content.len(), "Cached image");
                StoreOutcome::Stored
            }
            Err(error) => {
                warn!(fingerprint = %fingerprint, "{}", error);
                StoreOutcome::Failed
            }
        }
    }

    /// Whether an entry exists for the fingerprint
    pub async fn contains(&self, fingerprint: &Fingerprint) -> bool {
        fs::try_exists(self.entry_path(fingerprint))
            .await
            .unwrap_or(false)
    }

    /// Bytes currently counted against the quota
    pub fn used_bytes(&self) -> u64 {
        self.used_bytes.load(Ordering::SeqCst)
    }

    fn account(&self, written: u64, replaced: u64) {
        self.used_bytes.fetch_add(written, Ordering::SeqCst);
        // Racing overwrites of one entry may both report the old size
        let _ = self
            .used_bytes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                Some(used.saturating_sub(replaced))
            });
    }

    /// Entry count and disk usage, from a directory scan.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be listed.
    pub async fn stats(&self) -> CacheResult<CacheStats> {
        let (entries, bytes_used) = self.scan().await?;
        Ok(CacheStats {
            directory: self.directory().to_path_buf(),
            entries,
            bytes_used,
            quota_bytes: self.quota_bytes,
        })
    }

    /// Count finished entries and sum the size of every regular file.
    async fn scan(&self) -> CacheResult<(usize, u64)> {
        let dir = self.directory();
        let usage_error = |source| CacheError::Usage {
            path: dir.to_path_buf(),
            source,
        };

        let mut entries = fs::read_dir(dir).await.map_err(usage_error)?;
        let mut count = 0;
        let mut total = 0;

        while let Some(entry) = entries.next_entry().await.map_err(usage_error)? {
            // Entries can vanish between listing and stat when a rename races us
            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }
            total += metadata.len();
            if entry.path().extension().is_some_and(|ext| ext == "png") {
                count += 1;
            }
        }

        Ok((count, total))
    }

    /// Write an entry, returning the size of the entry it replaced (0 if none)
    async fn write_entry(&self, fingerprint: &Fingerprint, content: &[u8]) -> CacheResult<u64> {
        let path = self.entry_path(fingerprint);
        let staging = self
            .directory()
            .join(format!(".{}.{}.tmp", fingerprint, uuid::Uuid::new_v4()));

        if let Err(source) = fs::write(&staging, content).await {
            let _ = fs::remove_file(&staging).await;
            return Err(CacheError::Write {
                path: staging,
                source,
            });
        }

        let replaced = match fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => metadata.len(),
            _ => 0,
        };

        if let Err(source) = fs::rename(&staging, &path).await {
            let _ = fs::remove_file(&staging).await;
            return Err(CacheError::Write { path, source });
        }

        Ok(replaced)
    }
}

/// Builder for configuring a `CacheStore`.
pub struct CacheStoreBuilder {
    parent_directory: PathBuf,
    prefix: String,
    quota_bytes: u64,
}

impl CacheStoreBuilder {
    fn new() -> Self {
        Self {
            parent_directory: PathBuf::from(DEFAULT_CACHE_PARENT),
            prefix: DEFAULT_CACHE_PREFIX.to_string(),
            quota_bytes: DEFAULT_CACHE_QUOTA_BYTES,
        }
    }

    /// Directory under which the cache directory is created.
    #[must_use]
    pub fn parent_directory<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.parent_directory = path.into();
        self
    }

    /// Name prefix of the cache directory.
    #[must_use]
    pub fn prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Byte ceiling above which cache writes are skipped.
    #[must_use]
    pub fn quota_bytes(mut self, quota_bytes: u64) -> Self {
        self.quota_bytes = quota_bytes;
        self
    }

    /// Create the cache directory and build the `CacheStore`.
    ///
    /// # Errors
    /// Returns an error if the parent directory cannot be created or the cache
    /// directory cannot be created inside it.
    pub fn build(self) -> CacheResult<CacheStore> {
        let creation_error = |source| CacheError::DirectoryCreation {
            path: self.parent_directory.clone(),
            source,
        };

        std::fs::create_dir_all(&self.parent_directory).map_err(creation_error)?;
        let dir = tempfile::Builder::new()
            .prefix(&self.prefix)
            .tempdir_in(&self.parent_directory)
            .map_err(creation_error)?;

        info!(
            "Cache store initialized - dir: {:?}, quota: {}",
            dir.path(),
            format_bytes(self.quota_bytes)
        );

        Ok(CacheStore {
            dir: Arc::new(dir),
            quota_bytes: self.quota_bytes,
            used_bytes: Arc::new(AtomicU64::new(0)),
        })
    }
}
