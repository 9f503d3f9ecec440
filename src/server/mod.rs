//! Fan-in TCP server.
//!
//! # Data Flow
//! ```text
//! Server::bind
//!     → Listener (bound socket, optional connection cap)
//! BoundServer::run
//!     → accept.rs (one task, accepts until shutdown)
//!         → reader.rs (one task per connection)
//!             → MessageSink::Queue → Messages (single consumer)
//!             → MessageSink::Inline → log
//!     → waits for the shutdown gate
//!     → joins the accept loop, drains readers, closes the queue
//! ```

pub mod accept;
pub mod message;
pub mod reader;

use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::config::ServerConfig;
use crate::lifecycle::Shutdown;
use crate::net::{ConnectionTracker, Listener, ListenerError};
use crate::resilience::Backoff;

pub use accept::AcceptLoop;
pub use message::{message_queue, Message, MessageSink, Messages, TryRecvError};
pub use reader::{ConnectionReader, ExitReason, ReadOutcome, ReaderContext};

/// Errors surfaced by the server. Only binding can fail.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Bind(#[from] ListenerError),
}

/// A configured server that has not bound its socket yet.
pub struct Server {
    config: ServerConfig,
    shutdown: Shutdown,
    tracker: ConnectionTracker,
    queue_tx: Option<mpsc::Sender<Message>>,
    messages: Option<Messages>,
}

impl Server {
    /// Create the server and, when enabled, its message queue.
    pub fn new(config: ServerConfig) -> Self {
        let (queue_tx, messages) = if config.queue.enabled {
            let (tx, rx) = message_queue(config.queue.capacity);
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };

        Self {
            config,
            shutdown: Shutdown::new(),
            tracker: ConnectionTracker::new(),
            queue_tx,
            messages,
        }
    }

    /// Handle on the shutdown gate. Fire it to stop the server.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Live connection readers, for observing shutdown progress.
    pub fn tracker(&self) -> ConnectionTracker {
        self.tracker.clone()
    }

    /// Take the receiving end of the queue. `None` when the queue is
    /// disabled or was already taken.
    pub fn take_messages(&mut self) -> Option<Messages> {
        self.messages.take()
    }

    /// Bind the listening socket.
    pub async fn bind(self) -> Result<BoundServer, ServerError> {
        let listener = Listener::bind(&self.config.listener).await?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ListenerError::Bind {
                address: self.config.listener.bind_address.clone(),
                source,
            })?;

        let sink = match self.queue_tx {
            Some(tx) => MessageSink::Queue(tx),
            None => MessageSink::Inline,
        };
        let connection = &self.config.connection;
        let context = ReaderContext {
            sink,
            ack: connection
                .acknowledge
                .then(|| Bytes::from(connection.ack_message.clone().into_bytes())),
            buffer_size: connection.read_buffer_size,
            shutdown: self.shutdown.subscribe(),
        };

        Ok(BoundServer {
            listener,
            local_addr,
            shutdown: self.shutdown,
            tracker: self.tracker,
            context,
            backoff: Backoff::new(
                self.config.accept.backoff_base_ms,
                self.config.accept.backoff_max_ms,
            ),
            drain_timeout: Duration::from_secs(self.config.shutdown.drain_timeout_secs),
            messages: self.messages,
        })
    }

    /// Bind, then serve until the shutdown gate fires.
    pub async fn start(self) -> Result<(), ServerError> {
        self.bind().await?.run().await;
        Ok(())
    }
}

/// A server holding its listening socket, ready to run.
pub struct BoundServer {
    listener: Listener,
    local_addr: SocketAddr,
    shutdown: Shutdown,
    tracker: ConnectionTracker,
    context: ReaderContext,
    backoff: Backoff,
    drain_timeout: Duration,
    messages: Option<Messages>,
}

impl BoundServer {
    /// The address actually bound, useful after binding port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    pub fn tracker(&self) -> ConnectionTracker {
        self.tracker.clone()
    }

    /// Take the receiving end of the queue, if still held here.
    pub fn take_messages(&mut self) -> Option<Messages> {
        self.messages.take()
    }

    /// Accept connections until the shutdown gate fires, then stop the
    /// accept loop, wait for readers and close the queue.
    pub async fn run(self) {
        let BoundServer {
            listener,
            local_addr,
            shutdown,
            tracker,
            context,
            backoff,
            drain_timeout,
            messages,
        } = self;

        let mut signal = shutdown.subscribe();
        let accept = AcceptLoop::new(listener, tracker.clone(), context.clone(), backoff);
        let accept_task = tokio::spawn(accept.run());
        tracing::info!(address = %local_addr, "Server accepting connections");

        signal.recv().await;
        tracing::info!("Shutting down");

        if let Err(e) = accept_task.await {
            tracing::error!(error = %e, "Accept loop panicked");
        }

        if !tracker.wait_idle_timeout(drain_timeout).await {
            tracing::warn!(
                remaining = tracker.active_count(),
                timeout = ?drain_timeout,
                "Drain timeout elapsed with readers still running"
            );
        }

        // Dropping the last server-side sender closes the queue once the
        // readers' clones are gone too.
        drop(context);
        drop(messages);
        tracing::info!("Server stopped");
    }
}
