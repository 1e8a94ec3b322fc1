//! Live connection registry
//!
//! Every accepted socket is registered under a numeric id and released once
//! its connection task has finished with it.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tokio::sync::RwLock;

/// What the registry knows about one live connection
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub id: u64,
    pub peer: SocketAddr,
    pub opened_at: Instant,
}

/// Shared table of live connections, indexed by id
#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    connections: Arc<RwLock<HashMap<u64, ConnectionInfo>>>,
    next_id: Arc<AtomicU64>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly accepted connection and return its id
    pub async fn register(&self, peer: SocketAddr) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let info = ConnectionInfo {
            id,
            peer,
            opened_at: Instant::now(),
        };
        self.connections.write().await.insert(id, info);
        id
    }

    /// Drop a connection from the table
    pub async fn release(&self, id: u64) -> Option<ConnectionInfo> {
        let info = self.connections.write().await.remove(&id);
        if let Some(info) = &info {
            tracing::debug!(
                connection = id,
                peer = %info.peer,
                open_for = ?info.opened_at.elapsed(),
                "Connection unregistered"
            );
        }
        info
    }

    /// Get count of live connections
    pub async fn live_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Get all live connections (for monitoring/debugging)
    pub async fn connections(&self) -> Vec<ConnectionInfo> {
        let mut all: Vec<_> = self.connections.read().await.values().cloned().collect();
        all.sort_by_key(|info| info.id);
        all
    }
}
