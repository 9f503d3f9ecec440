//! Structured logging.
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - `RUST_LOG` wins over the configured level when set

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the filter: `RUST_LOG` if present, otherwise the configured level
/// for this crate.
pub fn env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("fanin_server={log_level},warn")))
}

/// Install the global subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init_logging(log_level: &str) {
    let _ = tracing_subscriber::registry()
        .with(env_filter(log_level))
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
