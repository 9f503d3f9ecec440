//! TCP listener implementation with backpressure.
//!
//! # Responsibilities
//! - Bind to the configured address
//! - Accept incoming TCP connections
//! - Enforce the optional max_connections limit via semaphore

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::ListenerConfig;

/// Error type for listener operations.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
    /// Failed to accept connection.
    #[error("Failed to accept: {0}")]
    Accept(#[source] std::io::Error),
}

/// A TCP listener that optionally limits concurrent connections.
///
/// When the limit is reached, `accept` waits until a slot becomes available.
#[derive(Debug)]
pub struct Listener {
    /// The underlying TCP listener.
    inner: TcpListener,
    /// Semaphore to limit concurrent connections, if configured.
    connection_limit: Option<Arc<Semaphore>>,
}

impl Listener {
    /// Bind to the configured address with connection limits.
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let address = normalize_address(&config.bind_address);
        let listener = TcpListener::bind(address.as_str())
            .await
            .map_err(|source| ListenerError::Bind {
                address: config.bind_address.clone(),
                source,
            })?;

        let local_addr = listener.local_addr().map_err(|source| ListenerError::Bind {
            address: config.bind_address.clone(),
            source,
        })?;

        tracing::info!(
            address = %local_addr,
            max_connections = ?config.max_connections,
            "Listener bound"
        );

        Ok(Self {
            inner: listener,
            // Semaphore::new panics above MAX_PERMITS.
            connection_limit: config
                .max_connections
                .map(|max| Arc::new(Semaphore::new(max.min(Semaphore::MAX_PERMITS)))),
        })
    }

    /// Accept a new connection, respecting the connection limit.
    ///
    /// This will wait if the connection limit has been reached.
    /// Returns the stream and a permit that must be held for the connection's lifetime.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr, ConnectionPermit), ListenerError> {
        // Acquire permit first (backpressure)
        let permit = match &self.connection_limit {
            // The semaphore is never closed, so acquisition cannot fail.
            Some(limit) => Arc::clone(limit).acquire_owned().await.ok(),
            None => None,
        };

        let (stream, addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;

        tracing::debug!(
            peer_addr = %addr,
            available_permits = ?self.available_permits(),
            "Connection accepted"
        );

        Ok((stream, addr, ConnectionPermit { _permit: permit }))
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }

    /// Get current available connection slots, if limited.
    pub fn available_permits(&self) -> Option<usize> {
        self.connection_limit
            .as_ref()
            .map(|limit| limit.available_permits())
    }
}

/// A permit representing a connection slot.
///
/// When dropped, the connection slot is released back to the pool.
/// This keeps backpressure correct even if the connection reader panics.
#[derive(Debug)]
pub struct ConnectionPermit {
    _permit: Option<OwnedSemaphorePermit>,
}

/// Expand the `:port` shorthand to all IPv4 interfaces.
pub fn normalize_address(address: &str) -> String {
    if address.starts_with(':') {
        format!("0.0.0.0{address}")
    } else {
        address.to_string()
    }
}
