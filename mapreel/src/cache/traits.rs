//! Core traits for versioned cache pools.
//!
//! A [`PoolStorage`] is the persistent home of any number of named pools.
//! Each [`Pool`] maps a request key (the request URL) to a stored
//! [`Response`]. The worker only ever talks to these traits, so the same
//! policies run on top of the in-memory and the on-disk backend.
//!
//! # Design Principles
//!
//! - **String keys**: request URLs, human-readable in logs
//! - **Whole responses as values**: status and headers are kept with the body
//! - **Named pools**: a pool name carries its version (`app-v3`); bumping the
//!   name is how a new worker invalidates old content
//! - **Dyn-compatible**: uses `Pin<Box<dyn Future>>` for trait object support
//!
//! # Example
//!
//! ```ignore
//! use mapreel::cache::{MemoryStorage, PoolLimits, PoolStorage};
//! use mapreel::net::Response;
//!
//! let storage = MemoryStorage::new();
//! let pool = storage.open("tiles-v1", PoolLimits::unbounded()).await?;
//! pool.put("https://a.example/1/0/0.png", Response::ok(png)).await?;
//! let hit = storage.match_any("https://a.example/1/0/0.png").await?;
//! ```

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;

use crate::net::Response;

/// Result of a garbage collection operation.
#[derive(Debug, Clone, Default)]
pub struct GcResult {
    /// Number of entries removed during GC.
    pub entries_removed: usize,
    /// Total bytes freed during GC.
    pub bytes_freed: u64,
    /// Duration of the GC operation in milliseconds.
    pub duration_ms: u64,
}

impl fmt::Display for GcResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GC: removed {} entries, freed {} bytes in {}ms",
            self.entries_removed, self.bytes_freed, self.duration_ms
        )
    }
}

/// Errors that can occur during pool operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error in a disk-backed pool.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored entry could not be encoded or decoded.
    #[error("Corrupt entry: {0}")]
    Codec(String),

    /// The pool was deleted while a handle to it was still in use.
    #[error("Pool '{0}' no longer exists")]
    PoolGone(String),

    /// Backend-specific error.
    #[error("Storage error: {0}")]
    Backend(String),
}

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Capacity limits for a pool.
///
/// The tile pool is unbounded unless a byte bound is configured; when a
/// bound is set the least recently written entries are evicted first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolLimits {
    pub max_size_bytes: Option<u64>,
}

impl PoolLimits {
    pub fn unbounded() -> Self {
        Self {
            max_size_bytes: None,
        }
    }

    pub fn max_bytes(max_size_bytes: u64) -> Self {
        Self {
            max_size_bytes: Some(max_size_bytes),
        }
    }
}

/// A single named key → response store.
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync`. Concurrent `put`s for the same
/// key are last-write-wins.
pub trait Pool: Send + Sync {
    /// Name (including version) of this pool.
    fn name(&self) -> &str;

    /// Store a response, replacing any previous entry for `key`.
    fn put(&self, key: &str, response: Response) -> BoxFuture<'_, Result<(), StorageError>>;

    /// Look up the response stored for `key`.
    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<Response>, StorageError>>;

    /// Delete the entry for `key`.
    ///
    /// Returns `true` if the entry existed.
    fn delete(&self, key: &str) -> BoxFuture<'_, Result<bool, StorageError>>;

    /// Keys of all stored entries.
    fn keys(&self) -> BoxFuture<'_, Result<Vec<String>, StorageError>>;

    /// Total weight of stored entries in bytes.
    fn size_bytes(&self) -> u64;

    /// Number of stored entries.
    fn entry_count(&self) -> u64;

    /// Run pending maintenance (eviction, counters).
    fn gc(&self) -> BoxFuture<'_, Result<GcResult, StorageError>>;
}

/// Persistent registry of named pools.
pub trait PoolStorage: Send + Sync {
    /// Open the pool called `name`, creating it if it does not exist.
    ///
    /// `limits` apply when the pool is created by this call, and to writes
    /// made through the returned handle.
    fn open(
        &self,
        name: &str,
        limits: PoolLimits,
    ) -> BoxFuture<'_, Result<Arc<dyn Pool>, StorageError>>;

    /// Whether a pool called `name` exists.
    fn has(&self, name: &str) -> BoxFuture<'_, Result<bool, StorageError>>;

    /// Names of all existing pools, in creation order.
    fn names(&self) -> BoxFuture<'_, Result<Vec<String>, StorageError>>;

    /// Delete a pool and all its entries.
    ///
    /// Returns `true` if the pool existed.
    fn delete(&self, name: &str) -> BoxFuture<'_, Result<bool, StorageError>>;

    /// Look up `key` in every pool, in creation order, returning the first
    /// hit.
    fn match_any<'a>(
        &'a self,
        key: &'a str,
    ) -> BoxFuture<'a, Result<Option<Response>, StorageError>> {
        Box::pin(async move {
            for name in self.names().await? {
                let pool = self.open(&name, PoolLimits::unbounded()).await?;
                if let Some(response) = pool.get(key).await? {
                    return Ok(Some(response));
                }
            }
            Ok(None)
        })
    }
}
