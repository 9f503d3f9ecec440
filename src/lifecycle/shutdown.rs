//! Shutdown coordination for the server.

use std::sync::Arc;

use tokio::sync::watch;

/// Single-fire shutdown gate.
///
/// Clones share the same gate. Triggering is idempotent, and any number of
/// tasks may wait on it, including ones that start waiting after it fired.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Trigger the shutdown signal. Returns `true` only for the call that
    /// actually fired the gate.
    pub fn trigger(&self) -> bool {
        self.tx.send_if_modified(|fired| !std::mem::replace(fired, true))
    }

    /// Whether the gate has fired.
    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// A task's handle on the shutdown gate.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Resolve once the gate has fired. Resolves immediately if it already has.
    pub async fn recv(&mut self) {
        // The sender lives in an Arc held by the Server, so an Err here means
        // every coordinator is gone and nobody is left to fire it; treat
        // that as shutdown too.
        let _ = self.rx.wait_for(|fired| *fired).await;
    }

    /// Whether the gate has fired.
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }
}
