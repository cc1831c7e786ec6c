//! HTTP and WebSocket routing configuration.
//!
//! Defines the single WebSocket endpoint players connect to.

use actix_web::web;
use crate::config::server::WS_PATH;
use crate::server::matchmaking::socket::ws_play;

/// Configure the application's WebSocket route.
///
/// Each connection is handled by its own `PlayerSocket` actor.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource(WS_PATH)
            .to(ws_play)
    );
}
