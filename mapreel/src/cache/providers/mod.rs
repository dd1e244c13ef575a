//! Pool storage implementations.
//!
//! Each backend implements `PoolStorage` and hands out `Pool` handles.
//!
//! # Available Backends
//!
//! - [`MemoryStorage`]: in-memory pools backed by moka
//! - [`DiskStorage`]: one directory per pool, survives restarts

mod disk;
mod memory;

pub use disk::{DiskPool, DiskStorage};
pub use memory::{MemoryPool, MemoryStorage};
