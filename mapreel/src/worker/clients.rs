//! Open pages and the worker controlling each of them.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use super::WorkerId;

/// Identifier of an open page.
pub type ClientId = u64;

/// Registry of open pages.
///
/// A page is either uncontrolled (its requests go straight to the network)
/// or controlled by exactly one worker version.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    next_id: AtomicU64,
    clients: DashMap<ClientId, Option<WorkerId>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a page, optionally already controlled by `controller`.
    pub fn open(&self, controller: Option<WorkerId>) -> ClientId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.clients.insert(id, controller);
        id
    }

    /// Forgets a page. Returns `false` if it was not open.
    pub fn close(&self, id: ClientId) -> bool {
        self.clients.remove(&id).is_some()
    }

    /// Worker controlling the page, if any.
    pub fn controller(&self, id: ClientId) -> Option<WorkerId> {
        self.clients.get(&id).and_then(|c| *c)
    }

    /// Makes `worker` the controller of every open page.
    ///
    /// Returns the number of pages claimed.
    pub fn claim(&self, worker: WorkerId) -> usize {
        let mut claimed = 0;
        for mut entry in self.clients.iter_mut() {
            *entry.value_mut() = Some(worker);
            claimed += 1;
        }
        claimed
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_and_close() {
        let registry = ClientRegistry::new();
        let a = registry.open(None);
        let b = registry.open(None);
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);

        assert!(registry.close(a));
        assert!(!registry.close(a));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_claim_takes_over_every_page() {
        let registry = ClientRegistry::new();
        let old = WorkerId(1);
        let new = WorkerId(2);

        let a = registry.open(None);
        let b = registry.open(Some(old));

        assert_eq!(registry.claim(new), 2);
        assert_eq!(registry.controller(a), Some(new));
        assert_eq!(registry.controller(b), Some(new));
    }

    #[test]
    fn test_unknown_client_is_uncontrolled() {
        let registry = ClientRegistry::new();
        assert_eq!(registry.controller(42), None);
    }
}
