//! Turn-gated relay loop for one active session.
//!
//! The relay owns both write halves and both reader channels. It waits on the two
//! channels at once; only the side holding the turn can get a move through, and each
//! forwarded move hands the turn over. The first disconnect from either side ends the
//! loop, and dropping the relay releases both connections.

use std::fmt;

use log::{debug, info, warn};
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use crate::server::connection::ConnectionWriter;
use crate::server::game_session::messages::{
    MalformedMessage, Message, MessageKind, Side, WireMessage,
};
use crate::server::game_session::reader::RelayEvent;
use crate::server::game_session::session::{EndReason, SessionStatus};

/// Why an inbound message was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discard {
    OutOfTurn,
    NotAMove(MessageKind),
    Malformed(MalformedMessage),
}

impl fmt::Display for Discard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Discard::OutOfTurn => f.write_str("out of turn"),
            Discard::NotAMove(kind) => write!(f, "`{}` is not a move", kind.as_str()),
            Discard::Malformed(e) => write!(f, "malformed: {}", e),
        }
    }
}

/// Outcome of handling one reader event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Relayed,
    Discarded(Discard),
    Ended(EndReason),
}

pub struct Relay {
    session_id: Uuid,
    turn: Side,
    white: ConnectionWriter,
    black: ConnectionWriter,
    white_events: mpsc::Receiver<RelayEvent>,
    black_events: mpsc::Receiver<RelayEvent>,
    status: watch::Sender<SessionStatus>,
}

impl Relay {
    pub fn new(
        session_id: Uuid,
        white: ConnectionWriter,
        black: ConnectionWriter,
        white_events: mpsc::Receiver<RelayEvent>,
        black_events: mpsc::Receiver<RelayEvent>,
        status: watch::Sender<SessionStatus>,
    ) -> Self {
        Self {
            session_id,
            turn: Side::White,
            white,
            black,
            white_events,
            black_events,
            status,
        }
    }

    #[cfg(test)]
    pub fn turn(&self) -> Side {
        self.turn
    }

    fn writer(&self, side: Side) -> &ConnectionWriter {
        match side {
            Side::White => &self.white,
            Side::Black => &self.black,
        }
    }

    /// Send each side its colour and mark the session active with white to move.
    pub fn announce_start(&self) {
        for side in [Side::White, Side::Black] {
            if let Err(e) = self.writer(side).send(WireMessage::start(side)) {
                warn!(
                    "[Relay] session={} could not send start to {}: {}",
                    self.session_id, side, e
                );
            }
        }
        self.status.send_replace(SessionStatus::Active { turn: self.turn });
    }

    /// Apply one event from the reader of `from`.
    pub fn handle_event(&mut self, from: Side, event: RelayEvent) -> Step {
        match event {
            RelayEvent::Disconnected(error) => {
                info!(
                    "[Relay] session={} ended: {} disconnected ({})",
                    self.session_id, from, error
                );
                let reason = EndReason::Disconnected { side: from, error };
                self.status.send_replace(SessionStatus::Ended(reason.clone()));
                Step::Ended(reason)
            }
            RelayEvent::Received(wire) => self.handle_message(from, wire),
        }
    }

    fn handle_message(&mut self, from: Side, wire: WireMessage) -> Step {
        if from != self.turn {
            return Step::Discarded(Discard::OutOfTurn);
        }

        match Message::try_from(&wire) {
            Ok(Message::Move(mv)) => {
                let to = from.opponent();
                if let Err(e) = self.writer(to).send(wire) {
                    warn!(
                        "[Relay] session={} could not forward move to {}: {}",
                        self.session_id, to, e
                    );
                }
                self.turn = to;
                self.status.send_replace(SessionStatus::Active { turn: self.turn });
                debug!(
                    "[Relay] session={} {} played {}{} ({:?}), {} to play",
                    self.session_id, from, mv.from, mv.to, mv.promotion, self.turn
                );
                Step::Relayed
            }
            // A client-sent `error` or `start` frame is dropped like any other
            // non-move. Only a broken channel ends the session.
            Ok(other) => Step::Discarded(Discard::NotAMove(other.kind())),
            Err(e) => Step::Discarded(Discard::Malformed(e)),
        }
    }

    /// Relay until either side disconnects.
    pub async fn run(mut self) -> EndReason {
        loop {
            let (from, event) = tokio::select! {
                Some(event) = self.white_events.recv() => (Side::White, event),
                Some(event) = self.black_events.recv() => (Side::Black, event),
                else => {
                    warn!(
                        "[Relay] session={} lost both readers without a disconnect report",
                        self.session_id
                    );
                    self.status.send_replace(SessionStatus::Ended(EndReason::Abandoned));
                    return EndReason::Abandoned;
                }
            };
            match self.handle_event(from, event) {
                Step::Ended(reason) => return reason,
                Step::Discarded(discard) => debug!(
                    "[Relay] session={} dropped frame from {}: {}",
                    self.session_id, from, discard
                ),
                Step::Relayed => (),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::connection::{Connection, ConnectionError, Transport};

    struct Harness {
        relay: Relay,
        white: Transport,
        black: Transport,
        status: watch::Receiver<SessionStatus>,
        _white_tx: mpsc::Sender<RelayEvent>,
        _black_tx: mpsc::Sender<RelayEvent>,
    }

    fn harness() -> Harness {
        let (white_conn, white) = Connection::new();
        let (black_conn, black) = Connection::new();
        let (white_writer, _) = white_conn.into_split();
        let (black_writer, _) = black_conn.into_split();
        let (white_tx, white_rx) = mpsc::channel(8);
        let (black_tx, black_rx) = mpsc::channel(8);
        let (status_tx, status) = watch::channel(SessionStatus::AwaitingSecondPlayer);
        let relay = Relay::new(
            Uuid::new_v4(),
            white_writer,
            black_writer,
            white_rx,
            black_rx,
            status_tx,
        );
        Harness {
            relay,
            white,
            black,
            status,
            _white_tx: white_tx,
            _black_tx: black_tx,
        }
    }

    fn mv(from: &str, to: &str) -> RelayEvent {
        RelayEvent::Received(WireMessage::movement(from, to, "q"))
    }

    #[test]
    fn start_goes_out_before_any_move() {
        let mut h = harness();
        h.relay.announce_start();
        assert_eq!(h.white.try_next_outbound(), Some(WireMessage::start(Side::White)));
        assert_eq!(h.black.try_next_outbound(), Some(WireMessage::start(Side::Black)));
        assert_eq!(*h.status.borrow(), SessionStatus::Active { turn: Side::White });
    }

    #[test]
    fn black_cannot_move_first() {
        let mut h = harness();
        h.relay.announce_start();
        h.white.try_next_outbound();
        h.black.try_next_outbound();

        assert_eq!(
            h.relay.handle_event(Side::Black, mv("e7", "e5")),
            Step::Discarded(Discard::OutOfTurn)
        );
        assert_eq!(h.relay.turn(), Side::White);
        assert_eq!(h.white.try_next_outbound(), None);

        assert_eq!(h.relay.handle_event(Side::White, mv("e2", "e4")), Step::Relayed);
        assert_eq!(h.relay.turn(), Side::Black);
        assert_eq!(h.black.try_next_outbound(), Some(WireMessage::movement("e2", "e4", "q")));
        assert_eq!(*h.status.borrow(), SessionStatus::Active { turn: Side::Black });
    }

    #[test]
    fn turns_alternate() {
        let mut h = harness();
        assert_eq!(h.relay.handle_event(Side::White, mv("e2", "e4")), Step::Relayed);
        assert_eq!(
            h.relay.handle_event(Side::White, mv("d2", "d4")),
            Step::Discarded(Discard::OutOfTurn)
        );
        assert_eq!(h.relay.handle_event(Side::Black, mv("e7", "e5")), Step::Relayed);
        assert_eq!(h.relay.turn(), Side::White);

        assert_eq!(h.black.try_next_outbound(), Some(WireMessage::movement("e2", "e4", "q")));
        assert_eq!(h.black.try_next_outbound(), None);
        assert_eq!(h.white.try_next_outbound(), Some(WireMessage::movement("e7", "e5", "q")));
    }

    #[test]
    fn malformed_move_is_not_forwarded() {
        let mut h = harness();
        let missing_to = WireMessage {
            to: None,
            ..WireMessage::movement("e2", "e4", "q")
        };
        let step = h.relay.handle_event(Side::White, RelayEvent::Received(missing_to));
        assert!(matches!(step, Step::Discarded(Discard::Malformed(_))));
        assert_eq!(h.relay.turn(), Side::White);
        assert_eq!(h.black.try_next_outbound(), None);
    }

    #[test]
    fn non_move_frames_do_not_take_the_turn() {
        let mut h = harness();
        let step = h.relay.handle_event(Side::White, RelayEvent::Received(WireMessage::error()));
        assert_eq!(step, Step::Discarded(Discard::NotAMove(MessageKind::Error)));
        let start = RelayEvent::Received(WireMessage::start(Side::Black));
        let step = h.relay.handle_event(Side::White, start);
        assert_eq!(step, Step::Discarded(Discard::NotAMove(MessageKind::Start)));
        assert_eq!(h.relay.turn(), Side::White);
        assert_eq!(h.black.try_next_outbound(), None);
    }

    #[test]
    fn forwarded_move_keeps_original_fields() {
        let mut h = harness();
        let wire = WireMessage {
            color: Some("white".into()),
            ..WireMessage::movement("b7", "b8", "k")
        };
        h.relay.handle_event(Side::White, RelayEvent::Received(wire.clone()));
        assert_eq!(h.black.try_next_outbound(), Some(wire));
    }

    #[test]
    fn disconnect_ends_session() {
        let mut h = harness();
        let gone = RelayEvent::Disconnected(ConnectionError::Closed);
        let step = h.relay.handle_event(Side::White, gone);
        let reason = EndReason::Disconnected {
            side: Side::White,
            error: ConnectionError::Closed,
        };
        assert_eq!(step, Step::Ended(reason.clone()));
        assert_eq!(*h.status.borrow(), SessionStatus::Ended(reason));
    }

    #[tokio::test]
    async fn run_returns_on_first_disconnect_and_releases_both_sides() {
        let Harness {
            relay,
            mut white,
            mut black,
            _white_tx: white_tx,
            _black_tx: black_tx,
            ..
        } = harness();

        white_tx.send(mv("e2", "e4")).await.unwrap();
        white_tx
            .send(RelayEvent::Disconnected(ConnectionError::Closed))
            .await
            .unwrap();
        let reason = relay.run().await;

        assert_eq!(
            reason,
            EndReason::Disconnected {
                side: Side::White,
                error: ConnectionError::Closed
            }
        );
        assert!(black_tx.is_closed());
        assert_eq!(black.next_outbound().await, Some(WireMessage::movement("e2", "e4", "q")));
        assert_eq!(black.next_outbound().await, None);
        assert_eq!(white.next_outbound().await, None);
    }

    #[test]
    fn client_error_frame_does_not_end_the_session() {
        let mut h = harness();
        h.relay.announce_start();
        let step = h.relay.handle_event(Side::White, RelayEvent::Received(WireMessage::error()));
        assert_eq!(step, Step::Discarded(Discard::NotAMove(MessageKind::Error)));
        assert_eq!(*h.status.borrow(), SessionStatus::Active { turn: Side::White });

        assert_eq!(h.relay.handle_event(Side::White, mv("e2", "e4")), Step::Relayed);
    }
}
