//! Messages and the queue that carries them from readers to the consumer.

use bytes::Bytes;
use tokio::sync::mpsc;

pub use tokio::sync::mpsc::error::TryRecvError;

/// One successful read from one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    origin: String,
    payload: Bytes,
}

impl Message {
    pub fn new(origin: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            origin: origin.into(),
            payload: payload.into(),
        }
    }

    /// Remote address of the connection the bytes were read from.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// The bytes of exactly one read, uninterpreted.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn into_parts(self) -> (String, Bytes) {
        (self.origin, self.payload)
    }
}

/// Where a connection reader hands its messages.
#[derive(Debug, Clone)]
pub enum MessageSink {
    /// Publish onto the bounded queue; blocks while the queue is full.
    Queue(mpsc::Sender<Message>),
    /// Log each message where it was read; there is no consumer.
    Inline,
}

/// Create the bounded queue. A zero capacity is raised to one.
pub fn message_queue(capacity: usize) -> (mpsc::Sender<Message>, Messages) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (tx, Messages { rx })
}

/// Receiving end of the message queue.
///
/// There is exactly one; it yields every published message and then `None`
/// once the server has shut down and the queue is empty.
#[derive(Debug)]
pub struct Messages {
    rx: mpsc::Receiver<Message>,
}

impl Messages {
    /// Wait for the next message. `None` means the queue is closed and drained.
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }

    /// Take a message if one is ready. `Empty` means the queue is open but
    /// has nothing buffered; `Disconnected` means it is closed and drained.
    pub fn try_recv(&mut self) -> Result<Message, TryRecvError> {
        self.rx.try_recv()
    }

    /// Messages currently buffered.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// The queue bound.
    pub fn capacity(&self) -> usize {
        self.rx.max_capacity()
    }

    /// Whether every producer is gone. Buffered messages may remain.
    pub fn is_closed(&self) -> bool {
        self.rx.is_closed()
    }
}
