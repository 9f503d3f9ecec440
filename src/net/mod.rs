//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (bind, accept, connection limits)
//!     → connection.rs (identity, live-connection tracking)
//!     → Hand off to a connection reader
//! ```
//!
//! # Design Decisions
//! - Optional bounded accept prevents resource exhaustion
//! - Each connection tracked for graceful shutdown

pub mod connection;
pub mod listener;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use listener::{ConnectionPermit, Listener, ListenerError};
