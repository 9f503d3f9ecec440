//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use fanin_server::config::ServerConfig;
use fanin_server::net::ConnectionTracker;
use fanin_server::server::{Messages, Server};
use fanin_server::Shutdown;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

pub const ACK: &[u8] = b"Thank You For Your Message!\n";

/// A server running on an OS-assigned loopback port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub tracker: ConnectionTracker,
    pub messages: Option<Messages>,
    pub task: JoinHandle<()>,
}

/// Loopback config on port 0 with a short drain timeout.
pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.shutdown.drain_timeout_secs = 2;
    config
}

pub async fn start_server(config: ServerConfig) -> TestServer {
    let mut server = Server::new(config);
    let messages = server.take_messages();
    let bound = server.bind().await.unwrap();

    TestServer {
        addr: bound.local_addr(),
        shutdown: bound.shutdown_handle(),
        tracker: bound.tracker(),
        messages,
        task: tokio::spawn(bound.run()),
    }
}

/// Send one chunk and wait for its acknowledgement, so every chunk lands in
/// its own read.
pub async fn send_acked(client: &mut TcpStream, chunk: &[u8]) {
    client.write_all(chunk).await.unwrap();
    let mut ack = vec![0u8; ACK.len()];
    client.read_exact(&mut ack).await.unwrap();
    assert_eq!(ack, ACK);
}

/// Wait up to a second for `f` to complete.
pub async fn within<F: std::future::Future>(f: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(1), f)
        .await
        .expect("timed out")
}
