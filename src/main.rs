//! Fan-in TCP message server.
//!
//! # Architecture Overview
//!
//! ```text
//!   client ──┐
//!   client ──┼─▶ listener ─▶ accept loop ─▶ reader task per connection
//!   client ──┘                                  │  (ack back to client)
//!                                               ▼
//!                                     bounded message queue
//!                                               │
//!                                               ▼
//!                                         consumer task
//! ```
//!
//! SIGINT/SIGTERM fire the shutdown gate: the accept loop stops, readers
//! close their connections, the queue closes and the consumer drains it.

use std::path::PathBuf;

use clap::Parser;

use fanin_server::config::{self, ServerConfig};
use fanin_server::lifecycle::signals;
use fanin_server::observability::{logging, metrics};
use fanin_server::server::{Messages, Server};

#[derive(Parser)]
#[command(name = "fanin-server")]
#[command(about = "Accepts TCP connections and funnels every read into one queue", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, e.g. ":3000" or "127.0.0.1:3000".
    #[arg(short, long)]
    listen: Option<String>,

    /// Do not write the acknowledgement line back to senders.
    #[arg(long)]
    no_ack: bool,

    /// Log messages in the reader instead of publishing them to the queue.
    #[arg(long)]
    inline: bool,

    /// Maximum concurrent connections.
    #[arg(long)]
    max_connections: Option<usize>,
}

impl Cli {
    fn load(&self) -> Result<ServerConfig, config::ConfigError> {
        let mut config = match &self.config {
            Some(path) => config::load_config(path)?,
            None => ServerConfig::default(),
        };

        if let Some(listen) = &self.listen {
            config.listener.bind_address = listen.clone();
        }
        if self.no_ack {
            config.connection.acknowledge = false;
        }
        if self.inline {
            config.queue.enabled = false;
        }
        if self.max_connections.is_some() {
            config.listener.max_connections = self.max_connections;
        }

        config::validate_config(&config).map_err(config::ConfigError::Validation)?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = cli.load()?;

    logging::init_logging(&config.observability.log_level);
    tracing::info!("fanin-server v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = ?config.listener.max_connections,
        queue_enabled = config.queue.enabled,
        queue_capacity = config.queue.capacity,
        acknowledge = config.connection.acknowledge,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let mut server = Server::new(config);
    let consumer = server.take_messages().map(|messages| tokio::spawn(consume(messages)));
    signals::spawn_signal_handler(server.shutdown_handle());

    // Bind failure is the only fatal path.
    server.start().await?;

    if let Some(consumer) = consumer {
        consumer.await?;
    }
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Drain the queue until the server closes it.
async fn consume(mut messages: Messages) {
    while let Some(message) = messages.recv().await {
        tracing::info!(
            origin = %message.origin(),
            payload = %String::from_utf8_lossy(message.payload()),
            "Received message"
        );
    }
    tracing::debug!("Message queue closed");
}
