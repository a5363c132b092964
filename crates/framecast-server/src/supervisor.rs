//! Process-wide registry of live connections.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::future::join_all;
use tracing::{info, warn};

use crate::dispatcher::Dispatcher;

/// Tracks every connected client's dispatcher so the process can tear all
/// sessions down on shutdown.
#[derive(Default)]
pub struct Supervisor {
    connections: DashMap<String, Arc<Dispatcher>>,
}

impl Supervisor {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection under its id.
    pub fn register(&self, dispatcher: Arc<Dispatcher>) {
        self.connections.insert(dispatcher.id().to_string(), dispatcher);
    }

    /// Remove a connection, returning its dispatcher.
    pub fn remove(&self, id: &str) -> Option<Arc<Dispatcher>> {
        self.connections.remove(id).map(|(_, dispatcher)| dispatcher)
    }

    /// Get a connection by id.
    pub fn get(&self, id: &str) -> Option<Arc<Dispatcher>> {
        self.connections.get(id).map(|entry| entry.value().clone())
    }

    /// Number of live connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Destroy every registered session, waiting at most `timeout`.
    /// Returns how many sessions were shut down.
    pub async fn shutdown(&self, timeout: Duration) -> usize {
        // Collect first: the connection tasks remove themselves from the map
        // while we are waiting.
        let dispatchers: Vec<Arc<Dispatcher>> = self
            .connections
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        let count = dispatchers.len();
        if count == 0 {
            return 0;
        }

        info!("Destroying {} active session(s)", count);
        let all = join_all(dispatchers.iter().map(|d| d.shutdown()));
        if tokio::time::timeout(timeout, all).await.is_err() {
            warn!("Sessions did not shut down within {:?}", timeout);
        }

        self.connections.clear();
        count
    }
}
