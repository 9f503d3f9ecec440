//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! listener, accept loop, connection readers produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → stdout
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```

pub mod logging;
pub mod metrics;
