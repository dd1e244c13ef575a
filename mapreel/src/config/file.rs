//! The INI configuration file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;
use reqwest::Url;

use super::{config_directory, config_file_path, ConfigError, ConfigKey};
use crate::cache::PoolLimits;
use crate::lod::{LodConfig, RegionalLevel, DEFAULT_CLUSTER_ZOOM, DEFAULT_MARKER_ZOOM, DEFAULT_SECONDARY_ZOOM};
use crate::logging::DEFAULT_LOG_LEVEL;
use crate::worker::{WorkerConfig, DEFAULT_SHELL, DEFAULT_SHELL_POOL, DEFAULT_TILE_HOST, DEFAULT_TILE_POOL};

/// Scope used when none is configured.
pub const DEFAULT_SCOPE: &str = "http://localhost:8000/";

/// `[resolver]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolverSettings {
    pub cluster_zoom: f64,
    pub marker_zoom: f64,
    pub secondary_zoom: f64,
    pub coarse_level: u8,
    pub fine_level: u8,
    pub output_root: String,
    pub extension: String,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        let lod = LodConfig::default();
        Self {
            cluster_zoom: DEFAULT_CLUSTER_ZOOM,
            marker_zoom: DEFAULT_MARKER_ZOOM,
            secondary_zoom: DEFAULT_SECONDARY_ZOOM,
            coarse_level: lod.coarse.zoom,
            fine_level: lod.fine.zoom,
            output_root: lod.output_root,
            extension: lod.extension,
        }
    }
}

/// `[cache]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSettings {
    /// Where the disk pool storage lives.
    pub directory: PathBuf,
    pub scope: String,
    pub shell_pool: String,
    pub tile_pool: String,
    pub tile_hosts: Vec<String>,
    pub shell: Vec<String>,
    /// Byte bound of the tile pool; `None` is unbounded.
    pub tile_pool_max_size: Option<u64>,
    /// Network timeout; `None` waits indefinitely.
    pub fetch_timeout_secs: Option<u64>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            directory: config_directory().join("pools"),
            scope: DEFAULT_SCOPE.to_string(),
            shell_pool: DEFAULT_SHELL_POOL.to_string(),
            tile_pool: DEFAULT_TILE_POOL.to_string(),
            tile_hosts: vec![DEFAULT_TILE_HOST.to_string()],
            shell: DEFAULT_SHELL.iter().map(|s| s.to_string()).collect(),
            tile_pool_max_size: None,
            fetch_timeout_secs: None,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    pub file: Option<PathBuf>,
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            file: None,
            level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

/// Parsed `~/.mapreel/config.ini`.
///
/// Missing sections and keys keep their defaults; unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub resolver: ResolverSettings,
    pub cache: CacheSettings,
    pub logging: LoggingSettings,
}

impl ConfigFile {
    /// Loads the default config file, or defaults if it does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_file_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_file(path).map_err(|e| match e {
            ini::Error::Io(io) => ConfigError::Io(io),
            ini::Error::Parse(parse) => ConfigError::Parse(parse.to_string()),
        })?;
        Self::from_ini(&ini)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        for key in ConfigKey::all() {
            if let Some(value) = ini.get_from(Some(key.section()), key.key_name()) {
                key.set(&mut config, value)?;
            }
        }
        config.validate()?;
        Ok(config)
    }

    fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            ini.with_section(Some(key.section()))
                .set(key.key_name(), key.get(self));
        }
        ini
    }

    /// Saves to the default location, creating `~/.mapreel` if needed.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.to_ini().write_to_file(path)?;
        Ok(())
    }

    /// Checks constraints spanning several keys.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let r = &self.resolver;
        if r.cluster_zoom > r.marker_zoom {
            return Err(ConfigError::InvalidValue {
                key: ConfigKey::ResolverClusterZoom.name(),
                value: r.cluster_zoom.to_string(),
                reason: format!("must not exceed marker_zoom ({})", r.marker_zoom),
            });
        }
        if r.coarse_level >= r.fine_level {
            return Err(ConfigError::InvalidValue {
                key: ConfigKey::ResolverCoarseLevel.name(),
                value: r.coarse_level.to_string(),
                reason: format!("must be below fine_level ({})", r.fine_level),
            });
        }
        if self.cache.shell_pool == self.cache.tile_pool {
            return Err(ConfigError::InvalidValue {
                key: ConfigKey::CacheTilePool.name(),
                value: self.cache.tile_pool.clone(),
                reason: "shell and tile pools must have different names".to_string(),
            });
        }
        Ok(())
    }

    /// Resolver configuration.
    pub fn lod_config(&self) -> LodConfig {
        let defaults = LodConfig::default();
        let r = &self.resolver;
        LodConfig {
            cluster_zoom: r.cluster_zoom,
            marker_zoom: r.marker_zoom,
            secondary_zoom: r.secondary_zoom,
            coarse: RegionalLevel::new(r.coarse_level, defaults.coarse.label),
            fine: RegionalLevel::new(r.fine_level, defaults.fine.label),
            output_root: r.output_root.clone(),
            extension: r.extension.clone(),
        }
    }

    /// Cache worker configuration.
    pub fn worker_config(&self) -> Result<WorkerConfig, ConfigError> {
        let c = &self.cache;
        let scope = Url::parse(&c.scope).map_err(|_| ConfigError::InvalidValue {
            key: ConfigKey::CacheScope.name(),
            value: c.scope.clone(),
            reason: "expected an absolute URL".to_string(),
        })?;
        let limits = match c.tile_pool_max_size {
            Some(max) => PoolLimits::max_bytes(max),
            None => PoolLimits::unbounded(),
        };

        let mut config = WorkerConfig::new(scope)
            .with_pools(c.shell_pool.clone(), c.tile_pool.clone())
            .with_shell(c.shell.iter().cloned())
            .with_tile_hosts(c.tile_hosts.iter().cloned())
            .with_tile_pool_limits(limits);
        config.fetch_timeout = c.fetch_timeout_secs.map(Duration::from_secs);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_match_components() {
        let config = ConfigFile::default();
        assert_eq!(config.lod_config(), LodConfig::default());

        let worker = config.worker_config().unwrap();
        assert_eq!(worker.shell_pool, DEFAULT_SHELL_POOL);
        assert_eq!(worker.tile_pool, DEFAULT_TILE_POOL);
        assert_eq!(worker.tile_pool_limits, PoolLimits::unbounded());
        assert!(worker.fetch_timeout.is_none());
    }

    #[test]
    fn test_parse_overrides() {
        let config = ConfigFile::parse(
            "[resolver]\n\
             cluster_zoom = 6\n\
             extension = webm\n\
             [cache]\n\
             shell_pool = mapreel-shell-v4\n\
             tile_pool_max_size = 200MB\n\
             fetch_timeout_secs = 10\n\
             [logging]\n\
             level = debug\n",
        )
        .unwrap();

        assert_eq!(config.resolver.cluster_zoom, 6.0);
        assert_eq!(config.resolver.marker_zoom, DEFAULT_MARKER_ZOOM);
        assert_eq!(config.lod_config().extension, "webm");

        let worker = config.worker_config().unwrap();
        assert_eq!(worker.shell_pool, "mapreel-shell-v4");
        assert_eq!(worker.tile_pool_limits, PoolLimits::max_bytes(200 * 1024 * 1024));
        assert_eq!(worker.fetch_timeout, Some(Duration::from_secs(10)));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_parse_rejects_invalid_value() {
        let err = ConfigFile::parse("[resolver]\nmarker_zoom = far\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "resolver.marker_zoom"));
    }

    #[test]
    fn test_validate_threshold_order() {
        let err = ConfigFile::parse("[resolver]\ncluster_zoom = 13\n").unwrap_err();
        assert!(err.to_string().contains("marker_zoom"));

        let err = ConfigFile::parse("[resolver]\ncoarse_level = 8\n").unwrap_err();
        assert!(err.to_string().contains("fine_level"));
    }

    #[test]
    fn test_validate_distinct_pools() {
        let err = ConfigFile::parse("[cache]\nshell_pool = same\ntile_pool = same\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let config = ConfigFile::parse("[cache]\nfuture_setting = 1\n[other]\nx = y\n").unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.ini");

        let mut config = ConfigFile::default();
        config.cache.tile_pool = "mapreel-tiles-v9".to_string();
        config.cache.tile_pool_max_size = Some(1024 * 1024 * 1024);
        config.logging.file = Some(dir.path().join("mapreel.log"));
        config.save_to(&path).unwrap();

        let loaded = ConfigFile::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = ConfigFile::load_from(&dir.path().join("absent.ini")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
