//! Connection identity and lifecycle tracking.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Count live connection readers
//! - Let shutdown wait until every reader has released its connection

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::observability::metrics;

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Tracks live connection readers for graceful shutdown.
///
/// The live count is published on a watch channel so shutdown can await
/// zero without polling.
#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    active: Arc<watch::Sender<u64>>,
}

impl ConnectionTracker {
    /// Create a new connection tracker.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self {
            active: Arc::new(tx),
        }
    }

    /// Record a new live connection. Returns a guard that decrements on drop.
    pub fn track(&self) -> ConnectionGuard {
        self.active.send_modify(|count| *count += 1);
        metrics::record_connection_opened();
        ConnectionGuard {
            active: Arc::clone(&self.active),
            id: ConnectionId::new(),
        }
    }

    /// Get current live connection count.
    pub fn active_count(&self) -> u64 {
        *self.active.borrow()
    }

    /// Wait until every tracked connection has closed.
    pub async fn wait_idle(&self) {
        let mut rx = self.active.subscribe();
        // The sender is owned by `self`, so the channel cannot close here.
        let _ = rx.wait_for(|count| *count == 0).await;
    }

    /// Wait until idle or until `timeout` elapses. Returns `true` if idle.
    pub async fn wait_idle_timeout(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.wait_idle()).await.is_ok()
    }
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard that tracks a connection's lifetime.
/// Decrements the live count when dropped.
#[derive(Debug)]
pub struct ConnectionGuard {
    active: Arc<watch::Sender<u64>>,
    id: ConnectionId,
}

impl ConnectionGuard {
    /// Get this connection's ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.active.send_modify(|count| *count -= 1);
        metrics::record_connection_closed();
        tracing::trace!(connection_id = %self.id, "Connection released");
    }
}
