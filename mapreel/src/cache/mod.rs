//! Versioned cache pools.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 CacheWorker                   │
//! │   install / fetch / activate policies         │
//! └──────────────────────┬───────────────────────┘
//!                        │ Arc<dyn PoolStorage>
//!                        ▼
//! ┌──────────────────────────────────────────────┐
//! │  PoolStorage: named pools in creation order   │
//! │    ├── MemoryStorage (moka)                   │
//! │    └── DiskStorage   (one dir per pool)       │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! The storage layer knows nothing about shells or tiles; which pool holds
//! what, and when a pool becomes garbage, is decided by the worker.

mod providers;
mod traits;

pub use providers::{DiskPool, DiskStorage, MemoryPool, MemoryStorage};
pub use traits::{BoxFuture, GcResult, Pool, PoolLimits, PoolStorage, StorageError};
