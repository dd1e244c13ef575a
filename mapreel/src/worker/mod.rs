//! Tiered cache worker.
//!
//! A [`CacheWorker`] is one version of the offline layer. It owns two pools,
//! named in its [`WorkerConfig`]:
//!
//! - the **shell pool**, filled once during install with the app shell
//! - the **tile pool**, filled at runtime with basemap tiles
//!
//! # Lifecycle
//!
//! ```text
//! Installing ──install()──► Installed ──activate()──► Activating ──► Activated
//!      │                                                                │
//!      └──── install failed ──► Redundant ◄──── superseded ─────────────┘
//! ```
//!
//! Only the active worker intercepts traffic (see [`ServiceRegistration`]).
//!
//! # Fetch policy
//!
//! | Request                  | Strategy                                   |
//! |--------------------------|--------------------------------------------|
//! | non-GET                  | network only                               |
//! | GET to a tile origin     | network first, tile pool on failure        |
//! | any other GET            | all pools first, network on miss (no store)|

mod classify;
mod clients;
mod config;
mod registration;

pub use classify::{classify, RequestClass};
pub use clients::{ClientId, ClientRegistry};
pub use config::{
    WorkerConfig, DEFAULT_SHELL, DEFAULT_SHELL_POOL, DEFAULT_TILE_HOST, DEFAULT_TILE_POOL,
};
pub use registration::ServiceRegistration;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{join_all, try_join_all};
use parking_lot::RwLock;
use reqwest::Url;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::cache::{Pool, PoolLimits, PoolStorage, StorageError};
use crate::net::{FetchError, Fetcher, Request, Response};

/// Errors from the worker lifecycle.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// A shell entry could not be resolved against the scope.
    #[error("Invalid app shell entry '{0}'")]
    InvalidShellUrl(String),

    /// A shell entry could not be fetched; install is aborted.
    #[error("Install failed for {url}: {reason}")]
    Install { url: String, reason: String },

    /// Pool storage failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A lifecycle step was attempted from the wrong state.
    #[error("Worker is {actual}, expected {expected}")]
    InvalidState {
        expected: WorkerState,
        actual: WorkerState,
    },
}

/// Lifecycle state of a worker version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
            WorkerState::Redundant => "redundant",
        };
        f.write_str(name)
    }
}

/// Unique identity of a worker instance within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(pub u64);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker#{}", self.0)
    }
}

static NEXT_WORKER_ID: AtomicU64 = AtomicU64::new(1);

/// Outcome of a successful install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub pool: String,
    pub entries: usize,
    pub bytes: u64,
}

/// Outcome of an activation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivationReport {
    /// Stale pools that were deleted.
    pub deleted: Vec<String>,
    /// Stale pools whose deletion failed; they are retried on the next
    /// activation.
    pub failed: Vec<String>,
    /// Number of open pages claimed.
    pub claimed: usize,
}

/// One version of the tiered cache.
pub struct CacheWorker {
    id: WorkerId,
    config: WorkerConfig,
    storage: Arc<dyn PoolStorage>,
    fetcher: Arc<dyn Fetcher>,
    state: RwLock<WorkerState>,
    tile_pool: OnceCell<Arc<dyn Pool>>,
}

impl CacheWorker {
    /// Creates a worker in the `Installing` state.
    pub fn new(
        config: WorkerConfig,
        storage: Arc<dyn PoolStorage>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Self {
            id: WorkerId(NEXT_WORKER_ID.fetch_add(1, Ordering::Relaxed)),
            config,
            storage,
            fetcher,
            state: RwLock::new(WorkerState::Installing),
            tile_pool: OnceCell::new(),
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn state(&self) -> WorkerState {
        *self.state.read()
    }

    fn expect_state(&self, expected: WorkerState) -> Result<(), WorkerError> {
        let actual = self.state();
        if actual == expected {
            Ok(())
        } else {
            Err(WorkerError::InvalidState { expected, actual })
        }
    }

    fn set_state(&self, state: WorkerState) {
        *self.state.write() = state;
    }

    /// Marks the worker as superseded.
    pub(crate) fn retire(&self) {
        self.set_state(WorkerState::Redundant);
    }

    /// Precaches the app shell into the shell pool.
    ///
    /// All entries are fetched before anything is written. A transport
    /// failure or non-2xx status of any entry aborts the install; a failed
    /// write removes what this install already wrote. Either way the worker
    /// ends up `Redundant`.
    pub async fn install(&self) -> Result<InstallReport, WorkerError> {
        self.expect_state(WorkerState::Installing)?;
        info!(worker = %self.id, pool = %self.config.shell_pool, "Installing app shell");

        match self.precache_shell().await {
            Ok(report) => {
                self.set_state(WorkerState::Installed);
                info!(
                    worker = %self.id,
                    pool = %report.pool,
                    entries = report.entries,
                    bytes = report.bytes,
                    "App shell installed"
                );
                Ok(report)
            }
            Err(e) => {
                self.set_state(WorkerState::Redundant);
                warn!(worker = %self.id, error = %e, "Install failed");
                Err(e)
            }
        }
    }

    async fn precache_shell(&self) -> Result<InstallReport, WorkerError> {
        let urls = self.config.shell_urls()?;
        let fetched = try_join_all(urls.into_iter().map(|url| self.fetch_shell_entry(url))).await?;

        let name = &self.config.shell_pool;
        let existed = self.storage.has(name).await?;
        let pool = self.storage.open(name, PoolLimits::unbounded()).await?;

        let mut written: Vec<String> = Vec::with_capacity(fetched.len());
        let mut bytes = 0u64;
        for (key, response) in fetched {
            let weight = response.weight();
            if let Err(e) = pool.put(&key, response).await {
                self.roll_back(pool.as_ref(), existed, &written).await;
                return Err(e.into());
            }
            bytes += weight;
            written.push(key);
        }

        Ok(InstallReport {
            pool: name.clone(),
            entries: written.len(),
            bytes,
        })
    }

    async fn fetch_shell_entry(&self, url: Url) -> Result<(String, Response), WorkerError> {
        let request = Request::get(url);
        let key = request.cache_key().to_string();
        let response = self
            .fetcher
            .fetch(&request)
            .await
            .map_err(|e| WorkerError::Install {
                url: key.clone(),
                reason: e.to_string(),
            })?;
        if !response.is_success() {
            return Err(WorkerError::Install {
                url: key,
                reason: format!("HTTP {}", response.status),
            });
        }
        debug!(url = %key, bytes = response.body.len(), "Fetched shell entry");
        Ok((key, response))
    }

    async fn roll_back(&self, pool: &dyn Pool, existed: bool, written: &[String]) {
        if !existed {
            if let Err(e) = self.storage.delete(pool.name()).await {
                warn!(pool = %pool.name(), error = %e, "Failed to remove partial shell pool");
            }
            return;
        }
        for key in written {
            if let Err(e) = pool.delete(key).await {
                warn!(pool = %pool.name(), key = %key, error = %e, "Failed to roll back entry");
            }
        }
    }

    /// Deletes stale pools, then claims every open page.
    ///
    /// Pools not named in the allow-list are deleted concurrently; a failed
    /// deletion is logged and does not stop activation. Pages are claimed
    /// only after every deletion has settled.
    pub async fn activate(&self, clients: &ClientRegistry) -> Result<ActivationReport, WorkerError> {
        self.expect_state(WorkerState::Installed)?;
        self.set_state(WorkerState::Activating);

        let allow = self.config.allow_list();
        let stale: Vec<String> = match self.storage.names().await {
            Ok(names) => names
                .into_iter()
                .filter(|name| !allow.contains(&name.as_str()))
                .collect(),
            Err(e) => {
                warn!(worker = %self.id, error = %e, "Could not list pools, skipping cleanup");
                Vec::new()
            }
        };

        let outcomes = join_all(stale.into_iter().map(|name| async move {
            let result = self.storage.delete(&name).await;
            (name, result)
        }))
        .await;

        let mut report = ActivationReport::default();
        for (name, result) in outcomes {
            match result {
                Ok(_) => {
                    debug!(pool = %name, "Deleted stale pool");
                    report.deleted.push(name);
                }
                Err(e) => {
                    warn!(pool = %name, error = %e, "Failed to delete stale pool");
                    report.failed.push(name);
                }
            }
        }

        report.claimed = clients.claim(self.id);
        self.set_state(WorkerState::Activated);
        info!(
            worker = %self.id,
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            claimed = report.claimed,
            "Worker activated"
        );
        Ok(report)
    }

    /// Answers an intercepted request.
    ///
    /// The caller is responsible for only routing traffic through an
    /// activated worker.
    pub async fn handle_fetch(&self, request: &Request) -> Result<Response, FetchError> {
        match classify(request, &self.config) {
            RequestClass::Passthrough => self.fetcher.fetch(request).await,
            RequestClass::Tile => self.network_first(request).await,
            RequestClass::CacheFirst => self.cache_first(request).await,
        }
    }

    async fn tile_pool(&self) -> Result<&Arc<dyn Pool>, StorageError> {
        self.tile_pool
            .get_or_try_init(|| {
                self.storage
                    .open(&self.config.tile_pool, self.config.tile_pool_limits)
            })
            .await
    }

    async fn network_first(&self, request: &Request) -> Result<Response, FetchError> {
        let key = request.cache_key();
        match self.fetcher.fetch(request).await {
            Ok(response) => {
                if response.is_success() {
                    self.store_tile(key, response.clone()).await;
                }
                Ok(response)
            }
            Err(network_error) => {
                let cached = match self.tile_pool().await {
                    Ok(pool) => pool.get(key).await,
                    Err(e) => Err(e),
                };
                match cached {
                    Ok(Some(response)) => {
                        debug!(url = %key, "Serving cached tile");
                        Ok(response)
                    }
                    Ok(None) => Err(network_error),
                    Err(e) => {
                        warn!(url = %key, error = %e, "Tile pool lookup failed");
                        Err(network_error)
                    }
                }
            }
        }
    }

    async fn store_tile(&self, key: &str, response: Response) {
        let result = match self.tile_pool().await {
            Ok(pool) => pool.put(key, response).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!(url = %key, error = %e, "Failed to store tile");
        }
    }

    async fn cache_first(&self, request: &Request) -> Result<Response, FetchError> {
        let key = request.cache_key();
        match self.storage.match_any(key).await {
            Ok(Some(response)) => return Ok(response),
            Ok(None) => {}
            Err(e) => warn!(url = %key, error = %e, "Pool lookup failed"),
        }
        self.fetcher.fetch(request).await
    }
}

impl fmt::Debug for CacheWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheWorker")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("shell_pool", &self.config.shell_pool)
            .field("tile_pool", &self.config.tile_pool)
            .finish()
    }
}
