//! MapReel - zoom-aware media for map-based media browsers
//!
//! This library provides the two halves of an offline-capable map player:
//!
//! - [`lod`]: picks the media to play for the current zoom and marker,
//!   from a global overview reel through regional tile reels down to the
//!   item's own media
//! - [`worker`]: a tiered cache that precaches the app shell, keeps
//!   basemap tiles for offline use and garbage-collects old versions
//!
//! Supporting modules cover tile math ([`coord`]), the item catalog
//! ([`item`]), pool storage ([`cache`]), the network seam ([`net`]), render
//! planning for the reels ([`render`]), configuration and logging.

pub mod cache;
pub mod config;
pub mod coord;
pub mod item;
pub mod lod;
pub mod logging;
pub mod net;
pub mod render;
pub mod worker;

/// Crate version, as reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
