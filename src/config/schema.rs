//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Acknowledgement line written back after every read.
pub const DEFAULT_ACK_MESSAGE: &str = "Thank You For Your Message!\n";

/// Root configuration for the fan-in server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address, connection cap).
    pub listener: ListenerConfig,

    /// Per-connection reader behaviour.
    pub connection: ConnectionConfig,

    /// Message queue settings.
    pub queue: QueueConfig,

    /// Accept loop retry settings.
    pub accept: AcceptConfig,

    /// Shutdown settings.
    pub shutdown: ShutdownConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000" or ":3000").
    pub bind_address: String,

    /// Maximum concurrent connections. `None` leaves it unbounded.
    pub max_connections: Option<usize>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: ":3000".to_string(),
            max_connections: None,
        }
    }
}

/// Connection reader configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Size of the reusable read buffer; also the largest payload per message.
    pub read_buffer_size: usize,

    /// Write `ack_message` back after every read.
    pub acknowledge: bool,

    /// Acknowledgement sent to the peer.
    pub ack_message: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: 2048,
            acknowledge: true,
            ack_message: DEFAULT_ACK_MESSAGE.to_string(),
        }
    }
}

/// Message queue configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Publish messages to the queue. When disabled, readers log each
    /// message inline and no consumer is involved.
    pub enabled: bool,

    /// Queue bound; a full queue blocks publishers.
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 10,
        }
    }
}

/// Accept loop retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AcceptConfig {
    /// Base delay after the first failed accept, in milliseconds.
    pub backoff_base_ms: u64,

    /// Upper bound on the delay between retries, in milliseconds.
    pub backoff_max_ms: u64,
}

impl Default for AcceptConfig {
    fn default() -> Self {
        Self {
            backoff_base_ms: 5,
            backoff_max_ms: 1000,
        }
    }
}

/// Shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// How long to wait for connection readers to finish before the queue
    /// is closed regardless.
    pub drain_timeout_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout_secs: 5,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
