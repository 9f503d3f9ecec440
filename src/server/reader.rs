//! Connection reader: one task per accepted connection.
//!
//! Every successful read becomes exactly one [`Message`]; nothing is
//! reassembled across reads. The reader owns its stream, so the socket is
//! closed exactly once when [`ConnectionReader::run`] returns, whichever way
//! the loop ended.

use std::io;
use std::net::SocketAddr;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::lifecycle::ShutdownSignal;
use crate::net::ConnectionGuard;
use crate::observability::metrics;
use crate::resilience::Backoff;
use crate::server::message::{Message, MessageSink};

/// Delay bounds for retrying transient read and write errors.
const TRANSIENT_BACKOFF_BASE_MS: u64 = 1;
const TRANSIENT_BACKOFF_MAX_MS: u64 = 100;

/// Classified result of a single read.
#[derive(Debug)]
pub enum ReadOutcome {
    Data(usize),
    EndOfStream,
    TransientError(io::Error),
    FatalError(io::Error),
}

impl ReadOutcome {
    pub fn classify(result: io::Result<usize>) -> Self {
        match result {
            Ok(0) => Self::EndOfStream,
            Ok(n) => Self::Data(n),
            Err(e) if is_transient(&e) => Self::TransientError(e),
            Err(e) => Self::FatalError(e),
        }
    }
}

/// Errors worth retrying on the same socket.
pub fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

/// Why a reader stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Peer closed its side.
    EndOfStream,
    /// Non-transient read failure.
    ReadError,
    /// Non-transient failure writing the acknowledgement.
    WriteError,
    /// The queue's receiver is gone.
    QueueClosed,
    /// The shutdown gate fired.
    Shutdown,
}

/// Settings shared by every reader of one server.
#[derive(Debug, Clone)]
pub struct ReaderContext {
    pub sink: MessageSink,
    /// Written back after every read when set.
    pub ack: Option<Bytes>,
    pub buffer_size: usize,
    pub shutdown: ShutdownSignal,
}

/// Reads one connection until end-of-stream, a permanent error or shutdown.
pub struct ConnectionReader<S = TcpStream> {
    stream: S,
    peer_addr: SocketAddr,
    origin: String,
    sink: MessageSink,
    ack: Option<Bytes>,
    buffer_size: usize,
    shutdown: ShutdownSignal,
    // Last, so the live count drops only after the socket and queue sender.
    guard: ConnectionGuard,
}

impl<S> ConnectionReader<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(
        stream: S,
        peer_addr: SocketAddr,
        guard: ConnectionGuard,
        context: ReaderContext,
    ) -> Self {
        Self {
            stream,
            peer_addr,
            origin: peer_addr.to_string(),
            sink: context.sink,
            ack: context.ack,
            buffer_size: context.buffer_size.max(1),
            shutdown: context.shutdown,
            guard,
        }
    }

    /// Run the read loop. Consumes the reader; the stream and the tracking
    /// guard are dropped on return.
    pub async fn run(mut self) -> ExitReason {
        let reason = self.read_loop().await;
        tracing::info!(
            peer_addr = %self.peer_addr,
            connection_id = %self.guard.id(),
            reason = ?reason,
            "Connection closed"
        );
        reason
    }

    async fn read_loop(&mut self) -> ExitReason {
        let mut buf = vec![0u8; self.buffer_size];
        let mut backoff = Backoff::new(TRANSIENT_BACKOFF_BASE_MS, TRANSIENT_BACKOFF_MAX_MS);

        loop {
            let result = tokio::select! {
                biased;
                _ = self.shutdown.recv() => return ExitReason::Shutdown,
                result = self.stream.read(&mut buf) => result,
            };

            let n = match ReadOutcome::classify(result) {
                ReadOutcome::Data(n) => n,
                ReadOutcome::EndOfStream => {
                    tracing::debug!(peer_addr = %self.peer_addr, "Peer closed connection");
                    return ExitReason::EndOfStream;
                }
                ReadOutcome::TransientError(e) => {
                    metrics::record_read_error("transient");
                    let delay = backoff.next_delay();
                    tracing::warn!(
                        peer_addr = %self.peer_addr,
                        error = %e,
                        retry_in = ?delay,
                        "Transient read error"
                    );
                    tokio::select! {
                        biased;
                        _ = self.shutdown.recv() => return ExitReason::Shutdown,
                        _ = tokio::time::sleep(delay) => {}
                    }
                    continue;
                }
                ReadOutcome::FatalError(e) => {
                    metrics::record_read_error("fatal");
                    tracing::warn!(peer_addr = %self.peer_addr, error = %e, "Read error");
                    return ExitReason::ReadError;
                }
            };
            backoff.reset();

            let message = Message::new(self.origin.clone(), Bytes::copy_from_slice(&buf[..n]));
            if let Err(reason) = self.deliver(message).await {
                return reason;
            }
            if let Err(reason) = self.acknowledge().await {
                return reason;
            }
        }
    }

    async fn deliver(&mut self, message: Message) -> Result<(), ExitReason> {
        let len = message.payload().len();
        match &self.sink {
            MessageSink::Queue(tx) => {
                // Prefer publishing; only abandon a blocked publish on shutdown.
                tokio::select! {
                    biased;
                    sent = tx.send(message) => sent.map_err(|_| ExitReason::QueueClosed)?,
                    _ = self.shutdown.recv() => return Err(ExitReason::Shutdown),
                }
                metrics::record_message("queued", len);
            }
            MessageSink::Inline => {
                tracing::info!(
                    origin = %message.origin(),
                    payload = %String::from_utf8_lossy(message.payload()),
                    "Received message"
                );
                metrics::record_message("inline", len);
            }
        }
        Ok(())
    }

    async fn acknowledge(&mut self) -> Result<(), ExitReason> {
        let Some(ack) = &self.ack else {
            return Ok(());
        };

        let written = tokio::select! {
            biased;
            written = self.stream.write_all(ack) => written,
            _ = self.shutdown.recv() => return Err(ExitReason::Shutdown),
        };

        match written {
            Ok(()) => Ok(()),
            Err(e) if is_transient(&e) => {
                metrics::record_ack_error();
                tracing::warn!(peer_addr = %self.peer_addr, error = %e, "Acknowledgement not sent");
                Ok(())
            }
            Err(e) => {
                metrics::record_ack_error();
                tracing::warn!(peer_addr = %self.peer_addr, error = %e, "Acknowledgement write failed");
                Err(ExitReason::WriteError)
            }
        }
    }
}
