//! Configuration file handling.
//!
//! Settings live in `~/.mapreel/config.ini`:
//!
//! ```ini
//! [resolver]
//! cluster_zoom = 7
//! marker_zoom = 12
//! secondary_zoom = 9
//! coarse_level = 5
//! fine_level = 8
//! output_root = output
//! extension = mp4
//!
//! [cache]
//! directory = ~/.mapreel/pools
//! scope = http://localhost:8000/
//! shell_pool = mapreel-shell-v1
//! tile_pool = mapreel-tiles-v1
//! tile_hosts = basemaps.cartocdn.com
//! shell = ./,./index.html,./manifest.json
//! tile_pool_max_size =
//! fetch_timeout_secs =
//!
//! [logging]
//! file = ~/.mapreel/mapreel.log
//! level = info
//! ```
//!
//! Bumping `shell_pool` or `tile_pool` is how a new release invalidates
//! cached content: the next activation deletes every pool not named here.

mod file;
mod keys;
mod size;

pub use file::{CacheSettings, ConfigFile, LoggingSettings, ResolverSettings, DEFAULT_SCOPE};
pub use keys::ConfigKey;
pub use size::{format_size, parse_size};

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to access config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(String),

    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Unknown configuration key '{0}'")]
    UnknownKey(String),
}

/// `~/.mapreel`, or `./.mapreel` when there is no home directory.
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".mapreel"))
        .unwrap_or_else(|| PathBuf::from(".mapreel"))
}

pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}
