//! Worker configuration: pool names, app shell, tile origins.

use std::time::Duration;

use reqwest::Url;

use super::WorkerError;
use crate::cache::PoolLimits;

/// Default shell pool name. Bump the version suffix to invalidate the shell.
pub const DEFAULT_SHELL_POOL: &str = "mapreel-shell-v1";

/// Default tile pool name. Bump the version suffix to drop cached tiles.
pub const DEFAULT_TILE_POOL: &str = "mapreel-tiles-v1";

/// Default basemap tile origin.
pub const DEFAULT_TILE_HOST: &str = "basemaps.cartocdn.com";

/// Default app shell, relative entries resolved against the scope.
pub const DEFAULT_SHELL: &[&str] = &[
    "./",
    "./index.html",
    "./manifest.json",
    "./icons/icon-192.png",
    "./icons/icon-512.png",
    "https://unpkg.com/leaflet@1.9.4/dist/leaflet.css",
    "https://unpkg.com/leaflet@1.9.4/dist/leaflet.js",
];

/// Configuration of one worker version.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    /// Base URL the worker controls; relative shell entries resolve here.
    pub scope: Url,

    /// Name of the application shell pool.
    pub shell_pool: String,

    /// Name of the basemap tile pool.
    pub tile_pool: String,

    /// App shell entries, absolute or relative to `scope`.
    pub shell: Vec<String>,

    /// Host suffixes recognized as basemap tile origins.
    pub tile_hosts: Vec<String>,

    /// Capacity of the tile pool. Unbounded unless configured.
    pub tile_pool_limits: PoolLimits,

    /// Network timeout. None waits indefinitely.
    pub fetch_timeout: Option<Duration>,
}

impl WorkerConfig {
    /// Configuration with the default pools, shell and tile origin.
    pub fn new(scope: Url) -> Self {
        Self {
            scope,
            shell_pool: DEFAULT_SHELL_POOL.to_string(),
            tile_pool: DEFAULT_TILE_POOL.to_string(),
            shell: DEFAULT_SHELL.iter().map(|s| s.to_string()).collect(),
            tile_hosts: vec![DEFAULT_TILE_HOST.to_string()],
            tile_pool_limits: PoolLimits::unbounded(),
            fetch_timeout: None,
        }
    }

    pub fn with_pools(mut self, shell_pool: impl Into<String>, tile_pool: impl Into<String>) -> Self {
        self.shell_pool = shell_pool.into();
        self.tile_pool = tile_pool.into();
        self
    }

    pub fn with_shell<I, S>(mut self, shell: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.shell = shell.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tile_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tile_hosts = hosts.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tile_pool_limits(mut self, limits: PoolLimits) -> Self {
        self.tile_pool_limits = limits;
        self
    }

    /// Pools that survive activation of this version.
    pub fn allow_list(&self) -> [&str; 2] {
        [&self.shell_pool, &self.tile_pool]
    }

    /// Shell entries resolved against the scope, without duplicates.
    pub fn shell_urls(&self) -> Result<Vec<Url>, WorkerError> {
        let mut urls: Vec<Url> = Vec::with_capacity(self.shell.len());
        for entry in &self.shell {
            let url = self
                .scope
                .join(entry)
                .map_err(|_| WorkerError::InvalidShellUrl(entry.clone()))?;
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
        Ok(urls)
    }

    /// Whether `host` belongs to a configured tile origin.
    ///
    /// Matches the origin itself or any subdomain of it
    /// (`a.basemaps.cartocdn.com`).
    pub fn is_tile_host(&self, host: &str) -> bool {
        self.tile_hosts.iter().any(|suffix| {
            host == suffix
                || (host.len() > suffix.len()
                    && host.ends_with(suffix.as_str())
                    && host.as_bytes()[host.len() - suffix.len() - 1] == b'.')
        })
    }
}
