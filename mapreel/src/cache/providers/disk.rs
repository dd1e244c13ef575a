//! On-disk pool storage.
//!
//! Layout under the storage root:
//!
//! ```text
//! {root}/
//! └── {sha256(pool name)[..16]}/
//!     ├── pool.json                 name and creation time
//!     └── entries/
//!         └── {sha256(key)}.entry   bincode-encoded key + response
//! ```
//!
//! Entries are written to a temporary file and renamed into place, so a
//! reader never sees a half-written entry and concurrent writers of the same
//! key resolve to last-write-wins.
//!
//! Bounded pools evict the entries with the oldest modification time until
//! the pool fits its bound again.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::{debug, warn};

use crate::cache::traits::{BoxFuture, GcResult, Pool, PoolLimits, PoolStorage, StorageError};
use crate::net::Response;

const META_FILE: &str = "pool.json";
const ENTRIES_DIR: &str = "entries";
const ENTRY_EXT: &str = "entry";

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Metadata file stored in each pool directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PoolMeta {
    name: String,
    created_at: DateTime<Utc>,
}

/// Serialized form of one entry.
#[derive(Debug, Serialize, Deserialize)]
struct DiskEntry {
    key: String,
    response: Response,
}

fn hex_digest(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

fn saturating_sub(counter: &AtomicU64, n: u64) {
    let _ = counter.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
        Some(v.saturating_sub(n))
    });
}

fn pool_dir_name(name: &str) -> String {
    hex_digest(name)[..16].to_string()
}

fn entry_file(pool_dir: &Path, key: &str) -> PathBuf {
    pool_dir
        .join(ENTRIES_DIR)
        .join(format!("{}.{}", hex_digest(key), ENTRY_EXT))
}

/// One pool stored in its own directory.
pub struct DiskPool {
    name: String,
    dir: PathBuf,
    limits: PoolLimits,
    size_bytes: AtomicU64,
    entry_count: AtomicU64,
}

impl DiskPool {
    fn entries_dir(&self) -> PathBuf {
        self.dir.join(ENTRIES_DIR)
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        entry_file(&self.dir, key)
    }

    /// Opens an existing pool directory and scans its usage.
    async fn load(name: String, dir: PathBuf, limits: PoolLimits) -> Result<Self, StorageError> {
        let pool = Self {
            name,
            dir,
            limits,
            size_bytes: AtomicU64::new(0),
            entry_count: AtomicU64::new(0),
        };
        let entries = pool.scan().await?;
        pool.size_bytes
            .store(entries.iter().map(|e| e.1).sum(), Ordering::Relaxed);
        pool.entry_count
            .store(entries.len() as u64, Ordering::Relaxed);
        Ok(pool)
    }

    async fn ensure_exists(&self) -> Result<(), StorageError> {
        match fs::metadata(self.entries_dir()).await {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::PoolGone(self.name.clone())),
            Err(e) => Err(e.into()),
        }
    }

    /// Lists entry files with their size and modification time.
    async fn scan(&self) -> Result<Vec<(PathBuf, u64, SystemTime)>, StorageError> {
        let mut out = Vec::new();
        let mut dir = match fs::read_dir(self.entries_dir()).await {
            Ok(d) => d,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::PoolGone(self.name.clone()))
            }
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXT) {
                continue;
            }
            let meta = match entry.metadata().await {
                Ok(m) => m,
                // Removed by a concurrent delete or eviction
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            out.push((path, meta.len(), modified));
        }
        Ok(out)
    }

    async fn read_entry(path: &Path) -> Result<Option<DiskEntry>, StorageError> {
        let bytes = match fs::read(path).await {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        bincode::deserialize(&bytes)
            .map(Some)
            .map_err(|e| StorageError::Codec(format!("{}: {}", path.display(), e)))
    }

    /// Reads the response stored for `key` at `path`, if any.
    async fn read_response(path: &Path, key: &str) -> Result<Option<Response>, StorageError> {
        match Self::read_entry(path).await? {
            // Hash collisions are astronomically unlikely, but never serve another key
            Some(entry) if entry.key == key => Ok(Some(entry.response)),
            _ => Ok(None),
        }
    }

    async fn remove_file(&self, path: &Path) -> Result<Option<u64>, StorageError> {
        let len = match fs::metadata(path).await {
            Ok(m) => m.len(),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match fs::remove_file(path).await {
            Ok(()) => {
                saturating_sub(&self.size_bytes, len);
                saturating_sub(&self.entry_count, 1);
                Ok(Some(len))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Evicts oldest entries until the pool fits its bound.
    async fn enforce_limit(&self) -> Result<GcResult, StorageError> {
        let start = std::time::Instant::now();
        let mut result = GcResult::default();

        let Some(max) = self.limits.max_size_bytes else {
            return Ok(result);
        };
        if self.size_bytes.load(Ordering::Relaxed) <= max {
            return Ok(result);
        }

        let mut entries = self.scan().await?;
        entries.sort_by_key(|e| e.2);
        let mut total: u64 = entries.iter().map(|e| e.1).sum();

        for (path, len, _) in entries {
            if total <= max {
                break;
            }
            if self.remove_file(&path).await?.is_some() {
                result.entries_removed += 1;
                result.bytes_freed += len;
            }
            total = total.saturating_sub(len);
        }

        result.duration_ms = start.elapsed().as_millis() as u64;
        debug!(pool = %self.name, %result, "Evicted entries over bound");
        Ok(result)
    }
}

impl Pool for DiskPool {
    fn name(&self) -> &str {
        &self.name
    }

    fn put(&self, key: &str, response: Response) -> BoxFuture<'_, Result<(), StorageError>> {
        let key = key.to_string();
        Box::pin(async move {
            self.ensure_exists().await?;

            let path = self.entry_path(&key);
            let encoded = bincode::serialize(&DiskEntry { key, response })
                .map_err(|e| StorageError::Codec(e.to_string()))?;
            let new_len = encoded.len() as u64;

            let nanos = SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or(0);
            let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
            let tmp = path.with_extension(format!("tmp{}-{}", nanos, seq));
            fs::write(&tmp, &encoded).await?;

            let old_len = fs::metadata(&path).await.ok().map(|m| m.len());
            if let Err(e) = fs::rename(&tmp, &path).await {
                let _ = fs::remove_file(&tmp).await;
                return Err(e.into());
            }

            match old_len {
                Some(old) => {
                    self.size_bytes.fetch_add(new_len, Ordering::Relaxed);
                    saturating_sub(&self.size_bytes, old);
                }
                None => {
                    self.size_bytes.fetch_add(new_len, Ordering::Relaxed);
                    self.entry_count.fetch_add(1, Ordering::Relaxed);
                }
            }

            self.enforce_limit().await?;
            Ok(())
        })
    }

    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<Response>, StorageError>> {
        let path = self.entry_path(key);
        let key = key.to_string();
        Box::pin(async move { Self::read_response(&path, &key).await })
    }

    fn delete(&self, key: &str) -> BoxFuture<'_, Result<bool, StorageError>> {
        let path = self.entry_path(key);
        Box::pin(async move { Ok(self.remove_file(&path).await?.is_some()) })
    }

    fn keys(&self) -> BoxFuture<'_, Result<Vec<String>, StorageError>> {
        Box::pin(async move {
            let mut keys = Vec::new();
            for (path, _, _) in self.scan().await? {
                match Self::read_entry(&path).await {
                    Ok(Some(entry)) => keys.push(entry.key),
                    Ok(None) => {}
                    Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable entry"),
                }
            }
            keys.sort();
            Ok(keys)
        })
    }

    fn size_bytes(&self) -> u64 {
        self.size_bytes.load(Ordering::Relaxed)
    }

    fn entry_count(&self) -> u64 {
        self.entry_count.load(Ordering::Relaxed)
    }

    fn gc(&self) -> BoxFuture<'_, Result<GcResult, StorageError>> {
        Box::pin(async move {
            // Resync counters with what is actually on disk
            let entries = self.scan().await?;
            self.size_bytes
                .store(entries.iter().map(|e| e.1).sum(), Ordering::Relaxed);
            self.entry_count
                .store(entries.len() as u64, Ordering::Relaxed);
            self.enforce_limit().await
        })
    }
}

/// Pool storage rooted at a directory.
pub struct DiskStorage {
    root: PathBuf,
}

impl DiskStorage {
    /// Create storage rooted at `root`, creating the directory if needed.
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn read_meta(dir: &Path) -> Result<Option<PoolMeta>, StorageError> {
        let bytes = match fs::read(dir.join(META_FILE)).await {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StorageError::Codec(format!("{}: {}", dir.display(), e)))
    }

    /// Pool directories with their metadata, in creation order.
    async fn all_meta(&self) -> Result<Vec<(PathBuf, PoolMeta)>, StorageError> {
        let mut metas = Vec::new();
        let mut dir = fs::read_dir(&self.root).await?;
        while let Some(entry) = dir.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let path = entry.path();
            match Self::read_meta(&path).await {
                Ok(Some(meta)) => metas.push((path, meta)),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Skipping pool with unreadable metadata"),
            }
        }
        metas.sort_by(|(_, a), (_, b)| a.created_at.cmp(&b.created_at).then(a.name.cmp(&b.name)));
        Ok(metas)
    }
}

impl PoolStorage for DiskStorage {
    fn open(
        &self,
        name: &str,
        limits: PoolLimits,
    ) -> BoxFuture<'_, Result<Arc<dyn Pool>, StorageError>> {
        let name = name.to_string();
        Box::pin(async move {
            let dir = self.root.join(pool_dir_name(&name));

            if Self::read_meta(&dir).await?.is_none() {
                fs::create_dir_all(dir.join(ENTRIES_DIR)).await?;
                let meta = PoolMeta {
                    name: name.clone(),
                    created_at: Utc::now(),
                };
                let json = serde_json::to_vec_pretty(&meta)
                    .map_err(|e| StorageError::Codec(e.to_string()))?;
                fs::write(dir.join(META_FILE), json).await?;
                debug!(pool = %name, dir = %dir.display(), "Created pool");
            }

            let pool = DiskPool::load(name, dir, limits).await?;
            Ok(Arc::new(pool) as Arc<dyn Pool>)
        })
    }

    fn has(&self, name: &str) -> BoxFuture<'_, Result<bool, StorageError>> {
        let dir = self.root.join(pool_dir_name(name));
        Box::pin(async move { Ok(Self::read_meta(&dir).await?.is_some()) })
    }

    fn names(&self) -> BoxFuture<'_, Result<Vec<String>, StorageError>> {
        Box::pin(async move {
            Ok(self
                .all_meta()
                .await?
                .into_iter()
                .map(|(_, m)| m.name)
                .collect())
        })
    }

    /// Reads the entry file directly in each pool directory instead of
    /// opening the pools, which would scan every entry.
    fn match_any<'a>(
        &'a self,
        key: &'a str,
    ) -> BoxFuture<'a, Result<Option<Response>, StorageError>> {
        Box::pin(async move {
            for (dir, meta) in self.all_meta().await? {
                let path = entry_file(&dir, key);
                if let Some(response) = DiskPool::read_response(&path, key).await? {
                    debug!(pool = %meta.name, key, "Matched cached entry");
                    return Ok(Some(response));
                }
            }
            Ok(None)
        })
    }

    fn delete(&self, name: &str) -> BoxFuture<'_, Result<bool, StorageError>> {
        let dir = self.root.join(pool_dir_name(name));
        Box::pin(async move {
            match fs::remove_dir_all(&dir).await {
                Ok(()) => Ok(true),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
                Err(e) => Err(e.into()),
            }
        })
    }
}
