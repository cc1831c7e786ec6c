//! One pairing of two players.
//!
//! A [`Session`] starts out holding only the white connection. The first successful
//! [`Session::join`] fills the black slot, announces the sides, and hands both
//! connections to a spawned reader task each plus one relay task. From then on the
//! session refuses further joins; its progress is observable through
//! [`SessionHandle`].

use std::fmt;

use log::info;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use crate::config::server::RELAY_QUEUE_CAPACITY;
use crate::server::connection::{Connection, ConnectionError};
use crate::server::game_session::messages::Side;
use crate::server::game_session::reader::spawn_reader;
use crate::server::game_session::relay::Relay;

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    /// A player's channel broke.
    Disconnected { side: Side, error: ConnectionError },
    /// The session was dropped without ever reporting a disconnect, e.g. a waiting
    /// session discarded because its only player left.
    Abandoned,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndReason::Disconnected { side, error } => {
                write!(f, "{} disconnected ({})", side, error)
            }
            EndReason::Abandoned => f.write_str("abandoned"),
        }
    }
}

/// Publicly observable session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    AwaitingSecondPlayer,
    Active { turn: Side },
    Ended(EndReason),
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::AwaitingSecondPlayer => f.write_str("waiting for an opponent"),
            SessionStatus::Active { turn } => write!(f, "{} to move", turn),
            SessionStatus::Ended(reason) => write!(f, "ended, {}", reason),
        }
    }
}

#[derive(Debug, Error)]
pub enum JoinError {
    #[error("session {session} already has two players")]
    SessionAlreadyFull {
        session: Uuid,
        connection: Connection,
    },
}

impl JoinError {
    /// Take back the connection that could not join.
    pub fn into_connection(self) -> Connection {
        match self {
            JoinError::SessionAlreadyFull { connection, .. } => connection,
        }
    }
}

enum SessionState {
    AwaitingSecondPlayer {
        white: Connection,
        status: watch::Sender<SessionStatus>,
    },
    Active,
}

pub struct Session {
    id: Uuid,
    state: SessionState,
    status: watch::Receiver<SessionStatus>,
}

impl Session {
    /// Open a session with `white` as its first player.
    pub fn new(white: Connection) -> Self {
        let id = Uuid::new_v4();
        let (status_tx, status_rx) = watch::channel(SessionStatus::AwaitingSecondPlayer);
        info!("[Session] {} opened, white={}", id, white.id());
        Self {
            id,
            state: SessionState::AwaitingSecondPlayer {
                white,
                status: status_tx,
            },
            status: status_rx,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Handle for the player on `side`.
    pub fn handle(&self, side: Side) -> SessionHandle {
        SessionHandle {
            id: self.id,
            side,
            status: self.status.clone(),
        }
    }

    /// True if this session is still waiting and its white player has already gone.
    pub fn is_abandoned(&self) -> bool {
        match &self.state {
            SessionState::AwaitingSecondPlayer { white, .. } => white.is_closed(),
            SessionState::Active => false,
        }
    }

    /// Seat `black` and start relaying. Fails with the connection handed back if
    /// the session is already active.
    pub fn join(&mut self, black: Connection) -> Result<SessionHandle, JoinError> {
        match std::mem::replace(&mut self.state, SessionState::Active) {
            SessionState::Active => Err(JoinError::SessionAlreadyFull {
                session: self.id,
                connection: black,
            }),
            SessionState::AwaitingSecondPlayer { white, status } => {
                info!("[Session] {} paired, white={} black={}", self.id, white.id(), black.id());
                self.activate(white, black, status);
                Ok(self.handle(Side::Black))
            }
        }
    }

    fn activate(
        &self,
        white: Connection,
        black: Connection,
        status: watch::Sender<SessionStatus>,
    ) {
        let (white_writer, white_reader) = white.into_split();
        let (black_writer, black_reader) = black.into_split();
        let (white_tx, white_rx) = mpsc::channel(RELAY_QUEUE_CAPACITY);
        let (black_tx, black_rx) = mpsc::channel(RELAY_QUEUE_CAPACITY);

        let relay = Relay::new(self.id, white_writer, black_writer, white_rx, black_rx, status);
        relay.announce_start();

        spawn_reader(Side::White, white_reader, white_tx);
        spawn_reader(Side::Black, black_reader, black_tx);
        tokio::spawn(relay.run());
    }
}

/// Read-only view of a session for one of its players.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: Uuid,
    side: Side,
    status: watch::Receiver<SessionStatus>,
}

impl SessionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Side assigned to the player holding this handle.
    pub fn side(&self) -> Side {
        self.side
    }

    pub fn status(&self) -> SessionStatus {
        match self.status.has_changed() {
            // Sender dropped while the session was still waiting.
            Err(_) if *self.status.borrow() == SessionStatus::AwaitingSecondPlayer => {
                SessionStatus::Ended(EndReason::Abandoned)
            }
            _ => self.status.borrow().clone(),
        }
    }

    /// Side to move, while the session is active.
    #[cfg(test)]
    pub fn turn(&self) -> Option<Side> {
        match self.status() {
            SessionStatus::Active { turn } => Some(turn),
            _ => None,
        }
    }

    /// Wait until the session ends.
    pub async fn ended(&mut self) -> EndReason {
        let observed = self
            .status
            .wait_for(|status| matches!(status, SessionStatus::Ended(_)))
            .await
            .map(|status| (*status).clone());
        match observed {
            Ok(SessionStatus::Ended(reason)) => reason,
            _ => match self.status() {
                SessionStatus::Ended(reason) => reason,
                _ => EndReason::Abandoned,
            },
        }
    }
}
