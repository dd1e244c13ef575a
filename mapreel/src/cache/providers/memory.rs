//! In-memory pool storage using moka.
//!
//! Each pool wraps a `moka::future::Cache`, weighted by response size. An
//! unbounded pool simply has no maximum capacity; a bounded one evicts the
//! least recently used entries once the byte bound is exceeded. New entries
//! are always admitted.
//!
//! Pools live only as long as the storage value. This backend is meant for
//! tests and for embedding the worker in a process that does not need to
//! survive restarts.

use std::sync::Arc;

use moka::future::Cache as MokaCache;
use moka::policy::EvictionPolicy;
use parking_lot::RwLock;

use crate::cache::traits::{BoxFuture, GcResult, Pool, PoolLimits, PoolStorage, StorageError};
use crate::net::Response;

/// One in-memory pool.
pub struct MemoryPool {
    name: String,
    cache: MokaCache<String, Response>,
    limits: PoolLimits,
}

impl MemoryPool {
    /// Create a new pool.
    ///
    /// # Arguments
    ///
    /// * `name` - Pool name including its version
    /// * `limits` - Optional byte bound
    pub fn new(name: impl Into<String>, limits: PoolLimits) -> Self {
        let mut builder = MokaCache::builder()
            // TinyLFU may reject a fresh tile outright
            .eviction_policy(EvictionPolicy::lru())
            // Weight each entry by its response size
            .weigher(|_key: &String, value: &Response| -> u32 {
                // moka uses u32 for weights, cap at u32::MAX for very large entries
                value.weight().min(u32::MAX as u64) as u32
            });

        if let Some(max) = limits.max_size_bytes {
            builder = builder.max_capacity(max);
        }

        Self {
            name: name.into(),
            cache: builder.build(),
            limits,
        }
    }

    pub fn limits(&self) -> PoolLimits {
        self.limits
    }
}

impl Pool for MemoryPool {
    fn name(&self) -> &str {
        &self.name
    }

    fn put(&self, key: &str, response: Response) -> BoxFuture<'_, Result<(), StorageError>> {
        let key = key.to_string();
        Box::pin(async move {
            self.cache.insert(key, response).await;
            Ok(())
        })
    }

    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<Response>, StorageError>> {
        let key = key.to_string();
        Box::pin(async move { Ok(self.cache.get(&key).await) })
    }

    fn delete(&self, key: &str) -> BoxFuture<'_, Result<bool, StorageError>> {
        let key = key.to_string();
        Box::pin(async move { Ok(self.cache.remove(&key).await.is_some()) })
    }

    fn keys(&self) -> BoxFuture<'_, Result<Vec<String>, StorageError>> {
        Box::pin(async move {
            let mut keys: Vec<String> = self.cache.iter().map(|(k, _)| (*k).clone()).collect();
            keys.sort();
            Ok(keys)
        })
    }

    fn size_bytes(&self) -> u64 {
        self.cache.weighted_size()
    }

    fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    fn gc(&self) -> BoxFuture<'_, Result<GcResult, StorageError>> {
        Box::pin(async move {
            let start = std::time::Instant::now();
            let size_before = self.cache.weighted_size();
            let count_before = self.cache.entry_count();

            // Run pending maintenance tasks (eviction, counters)
            self.cache.run_pending_tasks().await;

            let size_after = self.cache.weighted_size();
            let count_after = self.cache.entry_count();

            Ok(GcResult {
                entries_removed: count_before.saturating_sub(count_after) as usize,
                bytes_freed: size_before.saturating_sub(size_after),
                duration_ms: start.elapsed().as_millis() as u64,
            })
        })
    }
}

/// Registry of in-memory pools, in creation order.
#[derive(Default)]
pub struct MemoryStorage {
    pools: RwLock<Vec<Arc<MemoryPool>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn find(&self, name: &str) -> Option<Arc<MemoryPool>> {
        self.pools.read().iter().find(|p| p.name == name).cloned()
    }
}

impl PoolStorage for MemoryStorage {
    fn open(
        &self,
        name: &str,
        limits: PoolLimits,
    ) -> BoxFuture<'_, Result<Arc<dyn Pool>, StorageError>> {
        let name = name.to_string();
        Box::pin(async move {
            let mut pools = self.pools.write();
            if let Some(existing) = pools.iter().find(|p| p.name == name) {
                return Ok(Arc::clone(existing) as Arc<dyn Pool>);
            }
            let pool = Arc::new(MemoryPool::new(name, limits));
            pools.push(Arc::clone(&pool));
            Ok(pool as Arc<dyn Pool>)
        })
    }

    fn has(&self, name: &str) -> BoxFuture<'_, Result<bool, StorageError>> {
        let found = self.find(name).is_some();
        Box::pin(async move { Ok(found) })
    }

    fn names(&self) -> BoxFuture<'_, Result<Vec<String>, StorageError>> {
        let names = self.pools.read().iter().map(|p| p.name.clone()).collect();
        Box::pin(async move { Ok(names) })
    }

    fn delete(&self, name: &str) -> BoxFuture<'_, Result<bool, StorageError>> {
        let removed = {
            let mut pools = self.pools.write();
            pools
                .iter()
                .position(|p| p.name == name)
                .map(|i| pools.remove(i))
        };
        Box::pin(async move {
            match removed {
                Some(pool) => {
                    pool.cache.invalidate_all();
                    Ok(true)
                }
                None => Ok(false),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pool_put_and_get() {
        let pool = MemoryPool::new("p", PoolLimits::unbounded());
        pool.put("k", Response::ok(vec![1, 2, 3])).await.unwrap();

        let value = pool.get("k").await.unwrap().unwrap();
        assert_eq!(&value.body[..], &[1, 2, 3]);
    }

    #[tokio::test]
    async fn test_pool_get_missing() {
        let pool = MemoryPool::new("p", PoolLimits::unbounded());
        assert!(pool.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_pool_replace_existing() {
        let pool = MemoryPool::new("p", PoolLimits::unbounded());
        pool.put("k", Response::ok(vec![1])).await.unwrap();
        pool.put("k", Response::ok(vec![2, 3])).await.unwrap();
        pool.gc().await.unwrap();

        assert_eq!(&pool.get("k").await.unwrap().unwrap().body[..], &[2, 3]);
        assert_eq!(pool.entry_count(), 1);
    }

    #[tokio::test]
    async fn test_pool_delete() {
        let pool = MemoryPool::new("p", PoolLimits::unbounded());
        pool.put("k", Response::ok(vec![1])).await.unwrap();

        assert!(pool.delete("k").await.unwrap());
        assert!(!pool.delete("k").await.unwrap());
        assert!(pool.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_pool_keys() {
        let pool = MemoryPool::new("p", PoolLimits::unbounded());
        pool.put("b", Response::ok(vec![1])).await.unwrap();
        pool.put("a", Response::ok(vec![1])).await.unwrap();

        assert_eq!(pool.keys().await.unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_bounded_pool_stays_under_limit() {
        let pool = MemoryPool::new("p", PoolLimits::max_bytes(2500));

        pool.put("k1", Response::ok(vec![0u8; 1000])).await.unwrap();
        pool.put("k2", Response::ok(vec![0u8; 1000])).await.unwrap();
        pool.put("k3", Response::ok(vec![0u8; 1000])).await.unwrap();

        pool.gc().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        pool.gc().await.unwrap();

        assert!(
            pool.size_bytes() <= 2500,
            "Expected size <= 2500, got {}",
            pool.size_bytes()
        );
    }

    #[tokio::test]
    async fn test_bounded_pool_admits_new_entry_and_evicts_oldest() {
        let pool = MemoryPool::new("p", PoolLimits::max_bytes(2500));

        pool.put("k1", Response::ok(vec![1u8; 1000])).await.unwrap();
        pool.put("k2", Response::ok(vec![2u8; 1000])).await.unwrap();
        pool.gc().await.unwrap();

        // Popular entries must not crowd out a fresh one
        assert!(pool.get("k1").await.unwrap().is_some());
        assert!(pool.get("k2").await.unwrap().is_some());
        pool.gc().await.unwrap();

        pool.put("k3", Response::ok(vec![3u8; 1000])).await.unwrap();
        pool.gc().await.unwrap();

        let stored = pool.get("k3").await.unwrap().unwrap();
        assert_eq!(&stored.body[..], &[3u8; 1000][..]);
        assert!(pool.get("k1").await.unwrap().is_none());
        assert!(pool.get("k2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unbounded_pool_keeps_everything() {
        let pool = MemoryPool::new("p", PoolLimits::unbounded());
        for i in 0..200 {
            pool.put(&format!("k{}", i), Response::ok(vec![0u8; 1000]))
                .await
                .unwrap();
        }
        pool.gc().await.unwrap();
        assert_eq!(pool.entry_count(), 200);
    }

    #[tokio::test]
    async fn test_storage_open_is_idempotent() {
        let storage = MemoryStorage::new();
        let a = storage.open("p", PoolLimits::unbounded()).await.unwrap();
        a.put("k", Response::ok(vec![9])).await.unwrap();

        let b = storage.open("p", PoolLimits::unbounded()).await.unwrap();
        assert!(b.get("k").await.unwrap().is_some());
        assert_eq!(storage.names().await.unwrap(), vec!["p"]);
    }

    #[tokio::test]
    async fn test_storage_names_in_creation_order() {
        let storage = MemoryStorage::new();
        storage.open("z", PoolLimits::unbounded()).await.unwrap();
        storage.open("a", PoolLimits::unbounded()).await.unwrap();
        storage.open("m", PoolLimits::unbounded()).await.unwrap();

        assert_eq!(storage.names().await.unwrap(), vec!["z", "a", "m"]);
    }

    #[tokio::test]
    async fn test_storage_delete() {
        let storage = MemoryStorage::new();
        storage.open("old", PoolLimits::unbounded()).await.unwrap();

        assert!(storage.has("old").await.unwrap());
        assert!(storage.delete("old").await.unwrap());
        assert!(!storage.has("old").await.unwrap());
        assert!(!storage.delete("old").await.unwrap());
    }

    #[tokio::test]
    async fn test_match_any_searches_all_pools() {
        let storage = MemoryStorage::new();
        let first = storage.open("first", PoolLimits::unbounded()).await.unwrap();
        let second = storage.open("second", PoolLimits::unbounded()).await.unwrap();

        second.put("only-second", Response::ok(vec![2])).await.unwrap();
        first.put("both", Response::ok(vec![1])).await.unwrap();
        second.put("both", Response::ok(vec![2])).await.unwrap();

        let hit = storage.match_any("only-second").await.unwrap().unwrap();
        assert_eq!(&hit.body[..], &[2]);

        let both = storage.match_any("both").await.unwrap().unwrap();
        assert_eq!(&both.body[..], &[1], "earlier pool wins");

        assert!(storage.match_any("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_writes_same_key() {
        let pool = Arc::new(MemoryPool::new("p", PoolLimits::unbounded()));
        let mut handles = Vec::new();

        for i in 0..20u8 {
            let pool = Arc::clone(&pool);
            handles.push(tokio::spawn(async move {
                pool.put("same", Response::ok(vec![i])).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        pool.gc().await.unwrap();
        assert_eq!(pool.entry_count(), 1);
        assert!(pool.get("same").await.unwrap().is_some());
    }
}
