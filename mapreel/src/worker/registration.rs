//! The registration: the slot holding the active worker for one scope.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use super::{CacheWorker, ClientId, ClientRegistry, WorkerConfig, WorkerError, WorkerId};
use crate::cache::PoolStorage;
use crate::net::{FetchError, Fetcher, Request, Response};

/// Owns the pool storage, the open pages and the active worker.
///
/// Registering a new version installs it and activates it immediately,
/// without waiting for pages controlled by the previous version to close.
/// The previous worker becomes redundant once the new one is active.
pub struct ServiceRegistration {
    storage: Arc<dyn PoolStorage>,
    fetcher: Arc<dyn Fetcher>,
    clients: ClientRegistry,
    active: RwLock<Option<Arc<CacheWorker>>>,
}

impl ServiceRegistration {
    pub fn new(storage: Arc<dyn PoolStorage>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            storage,
            fetcher,
            clients: ClientRegistry::new(),
            active: RwLock::new(None),
        }
    }

    /// Installs and activates a worker for `config`.
    ///
    /// If install fails the currently active worker, if any, stays active.
    pub async fn register(&self, config: WorkerConfig) -> Result<Arc<CacheWorker>, WorkerError> {
        let worker = Arc::new(CacheWorker::new(
            config,
            Arc::clone(&self.storage),
            Arc::clone(&self.fetcher),
        ));
        worker.install().await?;
        worker.activate(&self.clients).await?;

        let previous = self.active.write().replace(Arc::clone(&worker));
        if let Some(previous) = previous {
            info!(old = %previous.id(), new = %worker.id(), "Worker superseded");
            previous.retire();
        }
        Ok(worker)
    }

    /// The worker currently intercepting traffic.
    pub fn active(&self) -> Option<Arc<CacheWorker>> {
        self.active.read().clone()
    }

    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    /// Opens a page. It is controlled by the active worker, if there is one.
    pub fn open_client(&self) -> ClientId {
        let controller = self.active.read().as_ref().map(|w| w.id());
        self.clients.open(controller)
    }

    pub fn close_client(&self, client: ClientId) -> bool {
        self.clients.close(client)
    }

    pub fn controller(&self, client: ClientId) -> Option<WorkerId> {
        self.clients.controller(client)
    }

    /// Issues a request on behalf of `client`.
    ///
    /// Requests from uncontrolled pages go straight to the network.
    pub async fn fetch(&self, client: ClientId, request: &Request) -> Result<Response, FetchError> {
        let worker = match self.clients.controller(client) {
            Some(_) => self.active(),
            None => None,
        };
        match worker {
            Some(worker) => worker.handle_fetch(request).await,
            None => {
                debug!(client, request = %request, "Uncontrolled request");
                self.fetcher.fetch(request).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStorage;
    use crate::net::tests::MockFetcher;
    use crate::worker::WorkerState;
    use reqwest::Url;

    const TILE: &str = "https://c.basemaps.cartocdn.com/light_all/5/28/12.png";

    fn setup() -> (Arc<MemoryStorage>, Arc<MockFetcher>, ServiceRegistration) {
        let storage = Arc::new(MemoryStorage::new());
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.route("https://maps.example.org/", Response::ok(b"<html>".to_vec()));
        fetcher.route(TILE, Response::ok(vec![5, 28, 12]));
        let registration = ServiceRegistration::new(storage.clone(), fetcher.clone());
        (storage, fetcher, registration)
    }

    fn config(shell_pool: &str, tile_pool: &str) -> WorkerConfig {
        WorkerConfig::new(Url::parse("https://maps.example.org/").unwrap())
            .with_shell(["./"])
            .with_pools(shell_pool, tile_pool)
    }

    #[tokio::test]
    async fn test_register_activates_worker() {
        let (_, _, registration) = setup();
        let page = registration.open_client();
        assert_eq!(registration.controller(page), None);

        let worker = registration.register(config("s-v1", "t-v1")).await.unwrap();
        assert_eq!(worker.state(), WorkerState::Activated);
        assert_eq!(registration.controller(page), Some(worker.id()));
        assert_eq!(registration.active().map(|w| w.id()), Some(worker.id()));
    }

    #[tokio::test]
    async fn test_new_version_supersedes_old() {
        let (storage, _, registration) = setup();
        let v1 = registration.register(config("s-v1", "t-v1")).await.unwrap();
        let page = registration.open_client();
        assert_eq!(registration.controller(page), Some(v1.id()));

        let v2 = registration.register(config("s-v2", "t-v2")).await.unwrap();
        assert_eq!(v1.state(), WorkerState::Redundant);
        assert_eq!(registration.controller(page), Some(v2.id()));
        assert_eq!(storage.names().await.unwrap(), vec!["s-v2"]);
    }

    #[tokio::test]
    async fn test_failed_install_keeps_active_worker() {
        let (_, _, registration) = setup();
        let v1 = registration.register(config("s-v1", "t-v1")).await.unwrap();

        let broken = config("s-v2", "t-v2").with_shell(["./does-not-exist"]);
        assert!(registration.register(broken).await.is_err());
        assert_eq!(registration.active().map(|w| w.id()), Some(v1.id()));
        assert_eq!(v1.state(), WorkerState::Activated);
    }

    #[tokio::test]
    async fn test_controlled_page_works_offline() {
        let (_, fetcher, registration) = setup();
        registration.register(config("s-v1", "t-v1")).await.unwrap();
        let page = registration.open_client();
        let tile = Request::parse_get(TILE).unwrap();

        registration.fetch(page, &tile).await.unwrap();
        fetcher.set_offline(true);

        let cached = registration.fetch(page, &tile).await.unwrap();
        assert_eq!(&cached.body[..], &[5, 28, 12]);
        let shell = registration
            .fetch(page, &Request::parse_get("https://maps.example.org/").unwrap())
            .await
            .unwrap();
        assert_eq!(&shell.body[..], b"<html>");
    }

    #[tokio::test]
    async fn test_uncontrolled_page_uses_network() {
        let (storage, fetcher, registration) = setup();
        let page = registration.open_client();
        let tile = Request::parse_get(TILE).unwrap();

        registration.fetch(page, &tile).await.unwrap();
        assert!(storage.names().await.unwrap().is_empty());

        fetcher.set_offline(true);
        assert!(registration.fetch(page, &tile).await.is_err());
    }

    #[tokio::test]
    async fn test_close_client() {
        let (_, _, registration) = setup();
        let page = registration.open_client();
        assert!(registration.close_client(page));
        assert!(registration.clients().is_empty());
    }
}
