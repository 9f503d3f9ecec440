//! Fan-in TCP message server library.
//!
//! Accepts TCP connections, turns every read on every connection into a
//! [`Message`], and funnels them through one bounded queue to a single
//! consumer. Optionally acknowledges each read back to the sender.

pub mod config;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod resilience;
pub mod server;

pub use config::ServerConfig;
pub use lifecycle::Shutdown;
pub use server::{BoundServer, Message, Messages, Server, ServerError};
