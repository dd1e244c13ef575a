//! Shared command setup: configuration, logging and the async runtime.

use std::future::Future;
use std::sync::Arc;

use mapreel::cache::DiskStorage;
use mapreel::config::ConfigFile;
use mapreel::logging::{init_logging, WorkerGuard};
use mapreel::net::ReqwestFetcher;
use mapreel::worker::ServiceRegistration;
use tokio::runtime::Runtime;
use tracing::info;

use crate::error::CliError;

/// Everything a command needs, set up once per invocation.
pub struct CliRunner {
    config: ConfigFile,
    runtime: Runtime,
    _log_guard: Option<WorkerGuard>,
}

impl CliRunner {
    /// Loads the config file and installs logging.
    ///
    /// `verbose` raises the level to `debug` regardless of the config.
    pub fn new(verbose: bool) -> Result<Self, CliError> {
        let config = ConfigFile::load()?;
        let level = if verbose {
            "debug"
        } else {
            config.logging.level.as_str()
        };
        let log_guard = init_logging(level, config.logging.file.as_deref())?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| CliError::Runtime(e.to_string()))?;

        Ok(Self {
            config,
            runtime,
            _log_guard: log_guard,
        })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    pub fn log_startup(&self, command: &str) {
        info!(version = mapreel::VERSION, command, "MapReel starting");
    }

    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    /// Opens the pool storage under `cache.directory`.
    pub fn storage(&self) -> Result<Arc<DiskStorage>, CliError> {
        let directory = self.config.cache.directory.clone();
        Ok(Arc::new(self.block_on(DiskStorage::new(directory))?))
    }

    /// HTTP client honoring `cache.fetch_timeout_secs`.
    pub fn fetcher(&self) -> Result<Arc<ReqwestFetcher>, CliError> {
        let fetcher = match self.config.worker_config()?.fetch_timeout {
            Some(timeout) => ReqwestFetcher::with_timeout(timeout)?,
            None => ReqwestFetcher::new()?,
        };
        Ok(Arc::new(fetcher))
    }

    /// Opens the configured disk pools behind a registration using the real
    /// network.
    pub fn registration(&self) -> Result<(Arc<DiskStorage>, ServiceRegistration), CliError> {
        let storage = self.storage()?;
        let registration = ServiceRegistration::new(storage.clone(), self.fetcher()?);
        Ok((storage, registration))
    }
}
