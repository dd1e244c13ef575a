//! Addressable configuration keys (`section.key`).
//!
//! Every setting of [`ConfigFile`] has a key here. The INI reader and
//! writer and the `config get/set/list` commands all go through this table,
//! so a setting is validated the same way wherever it comes from.

use std::path::PathBuf;
use std::str::FromStr;

use reqwest::Url;

use super::{parse_size, ConfigError, ConfigFile};
use crate::coord::MAX_ZOOM;

/// A single configuration setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    ResolverClusterZoom,
    ResolverMarkerZoom,
    ResolverSecondaryZoom,
    ResolverCoarseLevel,
    ResolverFineLevel,
    ResolverOutputRoot,
    ResolverExtension,
    CacheDirectory,
    CacheScope,
    CacheShellPool,
    CacheTilePool,
    CacheTileHosts,
    CacheShell,
    CacheTilePoolMaxSize,
    CacheFetchTimeoutSecs,
    LoggingFile,
    LoggingLevel,
}

const ALL_KEYS: &[ConfigKey] = &[
    ConfigKey::ResolverClusterZoom,
    ConfigKey::ResolverMarkerZoom,
    ConfigKey::ResolverSecondaryZoom,
    ConfigKey::ResolverCoarseLevel,
    ConfigKey::ResolverFineLevel,
    ConfigKey::ResolverOutputRoot,
    ConfigKey::ResolverExtension,
    ConfigKey::CacheDirectory,
    ConfigKey::CacheScope,
    ConfigKey::CacheShellPool,
    ConfigKey::CacheTilePool,
    ConfigKey::CacheTileHosts,
    ConfigKey::CacheShell,
    ConfigKey::CacheTilePoolMaxSize,
    ConfigKey::CacheFetchTimeoutSecs,
    ConfigKey::LoggingFile,
    ConfigKey::LoggingLevel,
];

impl ConfigKey {
    /// All keys, grouped by section.
    pub fn all() -> &'static [ConfigKey] {
        ALL_KEYS
    }

    pub fn section(&self) -> &'static str {
        use ConfigKey::*;
        match self {
            ResolverClusterZoom | ResolverMarkerZoom | ResolverSecondaryZoom
            | ResolverCoarseLevel | ResolverFineLevel | ResolverOutputRoot
            | ResolverExtension => "resolver",
            CacheDirectory | CacheScope | CacheShellPool | CacheTilePool | CacheTileHosts
            | CacheShell | CacheTilePoolMaxSize | CacheFetchTimeoutSecs => "cache",
            LoggingFile | LoggingLevel => "logging",
        }
    }

    pub fn key_name(&self) -> &'static str {
        use ConfigKey::*;
        match self {
            ResolverClusterZoom => "cluster_zoom",
            ResolverMarkerZoom => "marker_zoom",
            ResolverSecondaryZoom => "secondary_zoom",
            ResolverCoarseLevel => "coarse_level",
            ResolverFineLevel => "fine_level",
            ResolverOutputRoot => "output_root",
            ResolverExtension => "extension",
            CacheDirectory => "directory",
            CacheScope => "scope",
            CacheShellPool => "shell_pool",
            CacheTilePool => "tile_pool",
            CacheTileHosts => "tile_hosts",
            CacheShell => "shell",
            CacheTilePoolMaxSize => "tile_pool_max_size",
            CacheFetchTimeoutSecs => "fetch_timeout_secs",
            LoggingFile => "file",
            LoggingLevel => "level",
        }
    }

    /// Full `section.key` name.
    pub fn name(&self) -> String {
        format!("{}.{}", self.section(), self.key_name())
    }

    /// Current value rendered as it is written to the INI file.
    /// Unset optional values are empty.
    pub fn get(&self, config: &ConfigFile) -> String {
        use ConfigKey::*;
        let r = &config.resolver;
        let c = &config.cache;
        match self {
            ResolverClusterZoom => r.cluster_zoom.to_string(),
            ResolverMarkerZoom => r.marker_zoom.to_string(),
            ResolverSecondaryZoom => r.secondary_zoom.to_string(),
            ResolverCoarseLevel => r.coarse_level.to_string(),
            ResolverFineLevel => r.fine_level.to_string(),
            ResolverOutputRoot => r.output_root.clone(),
            ResolverExtension => r.extension.clone(),
            CacheDirectory => c.directory.display().to_string(),
            CacheScope => c.scope.clone(),
            CacheShellPool => c.shell_pool.clone(),
            CacheTilePool => c.tile_pool.clone(),
            CacheTileHosts => c.tile_hosts.join(","),
            CacheShell => c.shell.join(","),
            CacheTilePoolMaxSize => c.tile_pool_max_size.map(format_compact).unwrap_or_default(),
            CacheFetchTimeoutSecs => c
                .fetch_timeout_secs
                .map(|s| s.to_string())
                .unwrap_or_default(),
            LoggingFile => config
                .logging
                .file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            LoggingLevel => config.logging.level.clone(),
        }
    }

    /// Validates `value` and stores it.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigError> {
        use ConfigKey::*;
        let value = value.trim();
        let invalid = |reason: &str| ConfigError::InvalidValue {
            key: self.name(),
            value: value.to_string(),
            reason: reason.to_string(),
        };

        match self {
            ResolverClusterZoom | ResolverMarkerZoom | ResolverSecondaryZoom => {
                let zoom: f64 = value
                    .parse()
                    .map_err(|_| invalid("expected a number"))?;
                if !zoom.is_finite() || zoom < 0.0 {
                    return Err(invalid("expected a non-negative zoom"));
                }
                match self {
                    ResolverClusterZoom => config.resolver.cluster_zoom = zoom,
                    ResolverMarkerZoom => config.resolver.marker_zoom = zoom,
                    _ => config.resolver.secondary_zoom = zoom,
                }
            }
            ResolverCoarseLevel | ResolverFineLevel => {
                let level: u8 = value
                    .parse()
                    .map_err(|_| invalid("expected a tile zoom"))?;
                if level > MAX_ZOOM {
                    return Err(invalid("tile zoom out of range"));
                }
                if *self == ResolverCoarseLevel {
                    config.resolver.coarse_level = level;
                } else {
                    config.resolver.fine_level = level;
                }
            }
            ResolverOutputRoot => config.resolver.output_root = value.trim_end_matches('/').to_string(),
            ResolverExtension => {
                let ext = value.trim_start_matches('.');
                if ext.is_empty() {
                    return Err(invalid("extension must not be empty"));
                }
                config.resolver.extension = ext.to_string();
            }
            CacheDirectory => {
                if value.is_empty() {
                    return Err(invalid("directory must not be empty"));
                }
                config.cache.directory = expand_home(value);
            }
            CacheScope => {
                let url = Url::parse(value).map_err(|_| invalid("expected an absolute URL"))?;
                config.cache.scope = url.to_string();
            }
            CacheShellPool | CacheTilePool => {
                if value.is_empty() {
                    return Err(invalid("pool name must not be empty"));
                }
                if *self == CacheShellPool {
                    config.cache.shell_pool = value.to_string();
                } else {
                    config.cache.tile_pool = value.to_string();
                }
            }
            CacheTileHosts => config.cache.tile_hosts = split_list(value),
            CacheShell => config.cache.shell = split_list(value),
            CacheTilePoolMaxSize => {
                config.cache.tile_pool_max_size = if value.is_empty() {
                    None
                } else {
                    Some(parse_size(value).ok_or_else(|| invalid("expected a size like 500MB"))?)
                };
            }
            CacheFetchTimeoutSecs => {
                config.cache.fetch_timeout_secs = if value.is_empty() {
                    None
                } else {
                    let secs: u64 = value
                        .parse()
                        .map_err(|_| invalid("expected whole seconds"))?;
                    Some(secs)
                };
            }
            LoggingFile => {
                config.logging.file = if value.is_empty() {
                    None
                } else {
                    Some(expand_home(value))
                };
            }
            LoggingLevel => {
                if value.is_empty() {
                    return Err(invalid("level must not be empty"));
                }
                config.logging.level = value.to_string();
            }
        }
        Ok(())
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_KEYS
            .iter()
            .copied()
            .find(|k| k.name() == s)
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn expand_home(value: &str) -> PathBuf {
    match (value.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(value),
    }
}

/// Writes sizes back in a form `parse_size` reads exactly.
fn format_compact(bytes: u64) -> String {
    const UNITS: [(u64, &str); 4] = [
        (1024 * 1024 * 1024 * 1024, "TB"),
        (1024 * 1024 * 1024, "GB"),
        (1024 * 1024, "MB"),
        (1024, "KB"),
    ];
    for (unit, suffix) in UNITS {
        if bytes >= unit && bytes % unit == 0 {
            return format!("{}{}", bytes / unit, suffix);
        }
    }
    bytes.to_string()
}
