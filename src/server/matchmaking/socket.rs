/// WebSocket session handler for a player.
///
/// This actor adapts one WebSocket to the core's [`Connection`]: decoded frames are
/// pushed into the connection, frames queued by the relay are written back out, and
/// the socket is closed once the session lets go of the connection. On start it asks
/// the matchmaking server for a seat.
use actix::prelude::*;
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use log::{debug, info, warn};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::server::{MatchmakingServer, Pair};
use crate::config::server::MAX_FRAME_SIZE;
use crate::server::connection::{Connection, ConnectionError, PeerSink};
use crate::server::game_session::SessionHandle;
use crate::server::game_session::messages::WireMessage;
use crate::server::ws_error::{ws_close_reason, ws_error_message};

/// Decode one WebSocket payload into a wire message. Anything that is not a JSON
/// object counts as a broken channel.
pub fn decode_frame(payload: &[u8]) -> Result<WireMessage, ConnectionError> {
    serde_json::from_slice(payload)
        .map_err(|e| ConnectionError::MalformedFrame(e.to_string()))
}

/// Message: frame the relay wants written to this socket.
#[derive(Message)]
#[rtype(result = "()")]
struct Outbound(WireMessage);

/// Message: the session dropped every write half of this connection.
#[derive(Message)]
#[rtype(result = "()")]
struct Released;

/// Represents a player's WebSocket.
pub struct PlayerSocket {
    connection_id: Uuid,
    matchmaking_addr: Addr<MatchmakingServer>,
    sink: PeerSink,
    /// Connection and outbound queue, until `started` hands them off.
    pending: Option<(Connection, mpsc::UnboundedReceiver<WireMessage>)>,
    session: Option<SessionHandle>,
}

impl PlayerSocket {
    pub fn new(matchmaking_addr: Addr<MatchmakingServer>) -> Self {
        let (connection, transport) = Connection::new();
        let (sink, outbound) = transport.into_split();
        Self {
            connection_id: connection.id(),
            matchmaking_addr,
            sink,
            pending: Some((connection, outbound)),
            session: None,
        }
    }

    /// Drain the outbound queue into the actor's mailbox for as long as the actor lives.
    fn spawn_writer(
        &self,
        mut outbound: mpsc::UnboundedReceiver<WireMessage>,
        ctx: &mut ws::WebsocketContext<Self>,
    ) {
        let addr = ctx.address();
        ctx.spawn(fut::wrap_future(async move {
            while let Some(message) = outbound.recv().await {
                addr.do_send(Outbound(message));
            }
            addr.do_send(Released);
        }));
    }

    fn forward_frame(&mut self, payload: &[u8], ctx: &mut ws::WebsocketContext<Self>) {
        match decode_frame(payload) {
            Ok(message) => match self.sink.deliver(message) {
                Ok(()) => (),
                Err(ConnectionError::Overflow) => {
                    warn!("[Socket] {} is sending faster than it is read", self.connection_id);
                    ctx.close(Some(ws_close_reason(ws::CloseCode::Policy, "too many frames")));
                    ctx.stop();
                }
                Err(_) => debug!(
                    "[Socket] {} frame dropped, connection already released",
                    self.connection_id
                ),
            },
            Err(e) => {
                warn!("[Socket] {} sent an undecodable frame: {}", self.connection_id, e);
                self.sink.fail(e);
                ctx.close(Some(ws_close_reason(ws::CloseCode::Invalid, "malformed frame")));
                ctx.stop();
            }
        }
    }

    /// Log how the session ended, as seen from this seat.
    fn watch_session(&self, handle: &SessionHandle, ctx: &mut ws::WebsocketContext<Self>) {
        let mut handle = handle.clone();
        ctx.spawn(
            fut::wrap_future::<_, Self>(async move { handle.ended().await })
                .map(|reason, act, _ctx| {
                    info!("[Socket] {} session over: {}", act.connection_id, reason)
                }),
        );
    }
}

impl Actor for PlayerSocket {
    type Context = ws::WebsocketContext<Self>;

    /// Called when the socket opens. Starts the writer and asks for a seat.
    fn started(&mut self, ctx: &mut Self::Context) {
        let Some((connection, outbound)) = self.pending.take() else {
            return;
        };
        info!("[Socket] {} connected", self.connection_id);
        self.spawn_writer(outbound, ctx);

        self.matchmaking_addr
            .send(Pair { connection })
            .into_actor(self)
            .then(|res, act, ctx| {
                match res {
                    Ok(Ok(handle)) => {
                        debug!(
                            "[Socket] {} playing {} in session {}",
                            act.connection_id,
                            handle.side(),
                            handle.id()
                        );
                        act.watch_session(&handle, ctx);
                        act.session = Some(handle);
                    }
                    Ok(Err(e)) => {
                        ctx.text(ws_error_message("SESSION_FULL", &e.to_string()));
                        let returned = e.into_connection();
                        debug!("[Socket] {} dropped unseated connection", returned.id());
                        ctx.close(Some(ws_close_reason(ws::CloseCode::Again, "session full")));
                        ctx.stop();
                    }
                    Err(e) => {
                        warn!("[Socket] {} matchmaking unavailable: {}", act.connection_id, e);
                        ctx.text(ws_error_message(
                            "MATCHMAKING_UNAVAILABLE",
                            "Matchmaking is unavailable.",
                        ));
                        ctx.close(Some(ws_close_reason(
                            ws::CloseCode::Error,
                            "matchmaking unavailable",
                        )));
                        ctx.stop();
                    }
                }
                fut::ready(())
            })
            .wait(ctx);
    }

    /// Called when the socket stops. Reports the disconnect to the session.
    fn stopped(&mut self, _ctx: &mut Self::Context) {
        self.sink.fail(ConnectionError::Closed);
        match &self.session {
            Some(handle) => info!(
                "[Socket] {} ({}) left session {} ({})",
                self.connection_id,
                handle.side(),
                handle.id(),
                handle.status()
            ),
            None => info!("[Socket] {} left before being seated", self.connection_id),
        }
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for PlayerSocket {
    /// Handles incoming WebSocket frames from the client.
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Text(text)) => self.forward_frame(text.as_bytes(), ctx),
            Ok(ws::Message::Binary(bytes)) => self.forward_frame(&bytes, ctx),
            Ok(ws::Message::Ping(msg)) => ctx.pong(&msg),
            Ok(ws::Message::Close(reason)) => {
                self.sink.fail(ConnectionError::Closed);
                ctx.close(reason);
                ctx.stop();
            }
            Ok(_) => (),
            Err(e) => {
                self.sink.fail(ConnectionError::Protocol(e.to_string()));
                ctx.stop();
            }
        }
    }
}

impl Handler<Outbound> for PlayerSocket {
    type Result = ();

    /// Writes a relay frame to the client.
    fn handle(&mut self, msg: Outbound, ctx: &mut Self::Context) {
        match serde_json::to_string(&msg.0) {
            Ok(text) => ctx.text(text),
            Err(e) => {
                warn!("[Socket] {} failed to serialize frame: {}", self.connection_id, e);
                ctx.text(ws_error_message("INTERNAL", "Internal server error"));
            }
        }
    }
}

impl Handler<Released> for PlayerSocket {
    type Result = ();

    /// The session is over: close the socket.
    fn handle(&mut self, _msg: Released, ctx: &mut Self::Context) {
        debug!("[Socket] {} released by its session", self.connection_id);
        ctx.close(Some(ws_close_reason(ws::CloseCode::Normal, "session ended")));
        ctx.stop();
    }
}

/// WebSocket endpoint players connect to.
///
/// No query parameters: players are anonymous and seated in arrival order.
pub async fn ws_play(
    req: HttpRequest,
    stream: web::Payload,
    data: web::Data<crate::server::state::AppState>,
) -> Result<HttpResponse, Error> {
    ws::WsResponseBuilder::new(
        PlayerSocket::new(data.matchmaking_addr.clone()),
        &req,
        stream,
    )
    .frame_size(MAX_FRAME_SIZE)
    .start()
}
