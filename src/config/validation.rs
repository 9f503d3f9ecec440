//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (buffer size > 0, queue capacity > 0)
//! - Check the bind and metrics addresses are well formed
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use tokio::sync::Semaphore;

use crate::config::schema::ServerConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("listener.bind_address {0:?} is not a host:port address")]
    BindAddress(String),
    #[error("listener.max_connections must be greater than zero")]
    ZeroMaxConnections,
    #[error("listener.max_connections ({max}) exceeds the limit of {limit}")]
    TooManyConnections { max: usize, limit: usize },
    #[error("connection.read_buffer_size must be greater than zero")]
    ZeroReadBuffer,
    #[error("connection.ack_message must not be empty when acknowledge is enabled")]
    EmptyAckMessage,
    #[error("queue.capacity must be greater than zero")]
    ZeroQueueCapacity,
    #[error("accept.backoff_base_ms ({base}) exceeds accept.backoff_max_ms ({max})")]
    BackoffRange { base: u64, max: u64 },
    #[error("observability.metrics_address {0:?} is not a socket address")]
    MetricsAddress(String),
}

/// Validate a configuration, collecting every error.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if !is_host_port(&config.listener.bind_address) {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }
    match config.listener.max_connections {
        Some(0) => errors.push(ValidationError::ZeroMaxConnections),
        Some(max) if max > Semaphore::MAX_PERMITS => {
            errors.push(ValidationError::TooManyConnections {
                max,
                limit: Semaphore::MAX_PERMITS,
            });
        }
        _ => {}
    }
    if config.connection.read_buffer_size == 0 {
        errors.push(ValidationError::ZeroReadBuffer);
    }
    if config.connection.acknowledge && config.connection.ack_message.is_empty() {
        errors.push(ValidationError::EmptyAckMessage);
    }
    // tokio's bounded mpsc panics on a zero capacity
    if config.queue.enabled && config.queue.capacity == 0 {
        errors.push(ValidationError::ZeroQueueCapacity);
    }
    if config.accept.backoff_base_ms > config.accept.backoff_max_ms {
        errors.push(ValidationError::BackoffRange {
            base: config.accept.backoff_base_ms,
            max: config.accept.backoff_max_ms,
        });
    }
    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Accepts `host:port`, `[v6]:port` and the `:port` shorthand.
fn is_host_port(addr: &str) -> bool {
    match addr.rsplit_once(':') {
        Some((host, port)) => {
            port.parse::<u16>().is_ok() && !host.contains(char::is_whitespace)
        }
        None => false,
    }
}
