//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     Gate fires → Stop accepting → Cancel readers → Drain → Close queue
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Fire the shutdown gate
//! ```
//!
//! # Design Decisions
//! - The gate is single-fire and level-triggered: late subscribers still see it
//! - Ordered shutdown: stop accept, drain, close
//! - Shutdown has timeout: the queue closes after the drain deadline

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownSignal};
