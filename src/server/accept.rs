//! Accept loop: hands every accepted connection to its own reader task.

use crate::lifecycle::ShutdownSignal;
use crate::net::{ConnectionTracker, Listener, ListenerError};
use crate::observability::metrics;
use crate::resilience::Backoff;
use crate::server::reader::{ConnectionReader, ReaderContext};

pub struct AcceptLoop {
    listener: Listener,
    tracker: ConnectionTracker,
    context: ReaderContext,
    backoff: Backoff,
    shutdown: ShutdownSignal,
}

impl AcceptLoop {
    pub fn new(
        listener: Listener,
        tracker: ConnectionTracker,
        context: ReaderContext,
        backoff: Backoff,
    ) -> Self {
        let shutdown = context.shutdown.clone();
        Self {
            listener,
            tracker,
            context,
            backoff,
            shutdown,
        }
    }

    /// Accept until shutdown. The listening socket is released on return.
    pub async fn run(mut self) {
        loop {
            let accepted = tokio::select! {
                biased;
                _ = self.shutdown.recv() => break,
                accepted = self.listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer_addr, permit)) => {
                    self.backoff.reset();
                    metrics::record_connection_accepted();

                    // Tracked before spawning so shutdown never misses a reader.
                    let guard = self.tracker.track();
                    tracing::info!(
                        peer_addr = %peer_addr,
                        connection_id = %guard.id(),
                        "New connection"
                    );

                    let reader = ConnectionReader::new(stream, peer_addr, guard, self.context.clone());
                    tokio::spawn(async move {
                        let _permit = permit;
                        reader.run().await;
                    });
                }
                Err(e) => {
                    if !retry_after_failure(&e, &mut self.backoff, &mut self.shutdown).await {
                        break;
                    }
                }
            }
        }

        tracing::info!("Accept loop stopped");
    }
}

/// Wait out the backoff after a failed accept. Returns `false` when shutdown
/// fired, before or during the wait, and the loop should stop.
pub async fn retry_after_failure(
    error: &ListenerError,
    backoff: &mut Backoff,
    shutdown: &mut ShutdownSignal,
) -> bool {
    if shutdown.is_triggered() {
        return false;
    }
    metrics::record_accept_error();
    let delay = backoff.next_delay();
    tracing::warn!(
        error = %error,
        failures = backoff.attempts(),
        retry_in = ?delay,
        "Accept failed"
    );
    tokio::select! {
        biased;
        _ = shutdown.recv() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
