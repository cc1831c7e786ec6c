//! Transport-independent player connection.
//!
//! A [`Connection`] is the core's view of one peer: it can queue outgoing frames and
//! wait for incoming ones. The other end, a [`Transport`], belongs to whatever carries
//! the bytes (the WebSocket actor in production, the test itself in unit tests).
//! Outgoing frames use an unbounded channel, so a slow peer never blocks the relay.
//! Incoming frames are capped at [`INBOUND_QUEUE_CAPACITY`]; a transport that overruns
//! the cap is told to drop the peer.

use std::fmt;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

use crate::config::server::INBOUND_QUEUE_CAPACITY;
use crate::server::game_session::messages::WireMessage;

/// Why a connection stopped delivering messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("connection closed")]
    Closed,
    #[error("websocket protocol error: {0}")]
    Protocol(String),
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
    #[error("more than {INBOUND_QUEUE_CAPACITY} frames queued")]
    Overflow,
}

type Inbound = Result<WireMessage, ConnectionError>;

/// Core side of a player's connection.
pub struct Connection {
    writer: ConnectionWriter,
    reader: ConnectionReader,
}

impl Connection {
    /// Create a connection and the transport end that feeds it.
    pub fn new() -> (Connection, Transport) {
        let id = Uuid::new_v4();
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_QUEUE_CAPACITY);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let connection = Connection {
            writer: ConnectionWriter { id, tx: outbound_tx },
            reader: ConnectionReader { id, rx: inbound_rx },
        };
        let transport = Transport {
            sink: PeerSink { tx: inbound_tx },
            outbound: outbound_rx,
        };
        (connection, transport)
    }

    pub fn id(&self) -> Uuid {
        self.writer.id
    }

    #[cfg(test)]
    pub fn send(&self, message: WireMessage) -> Result<(), ConnectionError> {
        self.writer.send(message)
    }

    #[cfg(test)]
    pub async fn recv(&mut self) -> Result<WireMessage, ConnectionError> {
        self.reader.recv().await
    }

    /// True once the transport has stopped taking outgoing frames.
    pub fn is_closed(&self) -> bool {
        self.writer.is_closed()
    }

    /// Split into the write half (kept by the relay) and the read half (moved into the
    /// reader task).
    pub fn into_split(self) -> (ConnectionWriter, ConnectionReader) {
        (self.writer, self.reader)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Write half of a [`Connection`].
pub struct ConnectionWriter {
    id: Uuid,
    tx: mpsc::UnboundedSender<WireMessage>,
}

impl ConnectionWriter {
    pub fn send(&self, message: WireMessage) -> Result<(), ConnectionError> {
        self.tx.send(message).map_err(|_| ConnectionError::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Read half of a [`Connection`].
pub struct ConnectionReader {
    id: Uuid,
    rx: mpsc::Receiver<Inbound>,
}

impl ConnectionReader {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Wait for the next frame. A transport that went away without reporting a reason
    /// reads as [`ConnectionError::Closed`].
    pub async fn recv(&mut self) -> Result<WireMessage, ConnectionError> {
        match self.rx.recv().await {
            Some(inbound) => inbound,
            None => Err(ConnectionError::Closed),
        }
    }
}

/// Cloneable handle the transport uses to push frames into the core.
#[derive(Clone)]
pub struct PeerSink {
    tx: mpsc::Sender<Inbound>,
}

impl PeerSink {
    /// Hand a decoded frame to the core. Fails with [`ConnectionError::Overflow`] when
    /// the queue is full and with [`ConnectionError::Closed`] once the reader half is gone.
    pub fn deliver(&self, message: WireMessage) -> Result<(), ConnectionError> {
        self.tx.try_send(Ok(message)).map_err(|e| match e {
            TrySendError::Full(_) => ConnectionError::Overflow,
            TrySendError::Closed(_) => ConnectionError::Closed,
        })
    }

    /// Report that the channel broke. Ignored once the reader half is gone. On a full
    /// queue the reader sees [`ConnectionError::Closed`] after the backlog instead, once
    /// every sink has been dropped.
    pub fn fail(&self, error: ConnectionError) {
        let _ = self.tx.try_send(Err(error));
    }
}

/// Transport end of a [`Connection`].
pub struct Transport {
    sink: PeerSink,
    outbound: mpsc::UnboundedReceiver<WireMessage>,
}

#[cfg(test)]
impl Transport {
    pub fn deliver(&self, message: WireMessage) -> Result<(), ConnectionError> {
        self.sink.deliver(message)
    }

    pub fn fail(&self, error: ConnectionError) {
        self.sink.fail(error)
    }

    /// Wait for the next frame the core wants written. `None` once every write half
    /// has been dropped, i.e. the core released the connection.
    pub async fn next_outbound(&mut self) -> Option<WireMessage> {
        self.outbound.recv().await
    }

    /// Non-blocking variant of [`Transport::next_outbound`].
    pub fn try_next_outbound(&mut self) -> Option<WireMessage> {
        self.outbound.try_recv().ok()
    }

    /// True once the core has dropped every write half.
    pub fn is_released(&self) -> bool {
        self.outbound.is_closed() && self.outbound.is_empty()
    }
}

impl Transport {
    pub fn into_split(self) -> (PeerSink, mpsc::UnboundedReceiver<WireMessage>) {
        (self.sink, self.outbound)
    }
}
