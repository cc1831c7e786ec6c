/// Matchmaking server actor.
///
/// Holds the single waiting session and pairs every incoming connection: the first
/// arrival opens a session as white, the next one joins it as black. All pairing
/// requests go through this actor's mailbox, so the waiting slot has one writer.

use actix::prelude::*;
use log::{info, warn};

use crate::server::connection::Connection;
use crate::server::game_session::{JoinError, Session, SessionHandle};
use crate::server::game_session::messages::Side;

/// Main matchmaking server actor.
#[derive(Default)]
pub struct MatchmakingServer {
    /// Session waiting for its second player, if any.
    open_session: Option<Session>,
}

impl MatchmakingServer {
    /// Create a new matchmaking server with no waiting session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pair `connection` with the waiting player, or open a new session for it.
    ///
    /// The waiting slot is cleared by every join attempt, successful or not.
    pub fn pair_or_create(
        &mut self,
        connection: Connection,
    ) -> Result<SessionHandle, JoinError> {
        match self.open_session.take() {
            Some(session) if session.is_abandoned() => {
                info!(
                    "[Matchmaking] Discarding session {}: white left before pairing",
                    session.id()
                );
                Ok(self.open(connection))
            }
            Some(mut session) => session.join(connection),
            None => Ok(self.open(connection)),
        }
    }

    fn open(&mut self, connection: Connection) -> SessionHandle {
        let session = Session::new(connection);
        let handle = session.handle(Side::White);
        self.open_session = Some(session);
        handle
    }

    /// True while a session is waiting for its second player.
    #[cfg(test)]
    pub fn has_open_session(&self) -> bool {
        self.open_session.is_some()
    }
}

/// Message: a freshly accepted connection wants a game.
#[derive(Message)]
#[rtype(result = "Result<SessionHandle, JoinError>")]
pub struct Pair {
    pub connection: Connection,
}

impl Actor for MatchmakingServer {
    type Context = Context<Self>;
}

impl Handler<Pair> for MatchmakingServer {
    type Result = Result<SessionHandle, JoinError>;

    /// Handles a connection asking to be paired.
    fn handle(&mut self, msg: Pair, _ctx: &mut Self::Context) -> Self::Result {
        let connection_id = msg.connection.id();
        let result = self.pair_or_create(msg.connection);
        match &result {
            Ok(handle) => info!(
                "[Matchmaking] Connection {} seated as {} in session {}",
                connection_id,
                handle.side(),
                handle.id()
            ),
            Err(e) => warn!("[Matchmaking] Connection {} not seated: {}", connection_id, e),
        }
        result
    }
}
