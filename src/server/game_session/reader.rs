//! Per-connection reader task.
//!
//! Pulls frames off one [`ConnectionReader`] and publishes them to the relay over a
//! private channel. A failed receive is published once as [`RelayEvent::Disconnected`]
//! and ends the task, so the relay sees exactly one disconnect per connection. The
//! channel is bounded: a reader ahead of the relay waits, and its connection's own
//! queue fills up behind it.

use log::debug;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::server::connection::{ConnectionError, ConnectionReader};
use crate::server::game_session::messages::{Side, WireMessage};

/// What a reader task reports to the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    Received(WireMessage),
    Disconnected(ConnectionError),
}

pub fn spawn_reader(
    side: Side,
    reader: ConnectionReader,
    events: mpsc::Sender<RelayEvent>,
) -> JoinHandle<()> {
    tokio::spawn(read_loop(side, reader, events))
}

async fn read_loop(
    side: Side,
    mut reader: ConnectionReader,
    events: mpsc::Sender<RelayEvent>,
) {
    let connection_id = reader.id();
    loop {
        tokio::select! {
            // Relay is gone: the session ended on the other side.
            _ = events.closed() => {
                debug!("[Reader] {} ({}) released, session over", side, connection_id);
                return;
            }
            received = reader.recv() => match received {
                Ok(message) => {
                    if events.send(RelayEvent::Received(message)).await.is_err() {
                        debug!("[Reader] {} ({}) released, session over", side, connection_id);
                        return;
                    }
                }
                Err(error) => {
                    debug!("[Reader] {} ({}) disconnected: {}", side, connection_id, error);
                    let _ = events.send(RelayEvent::Disconnected(error)).await;
                    return;
                }
            },
        }
    }
}
