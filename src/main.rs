//! Main entry point for the chess relay server.
//!
//! Initializes logging, starts the matchmaking actor, and launches the HTTP server
//! with the WebSocket endpoint players connect to.

use actix::Actor;
use actix_web::{web, App, HttpServer};
use clap::Parser;
use log::info;
use server::matchmaking::server::MatchmakingServer;

use crate::config::server::{DEFAULT_HOST, DEFAULT_PORT, WS_PATH};

pub mod config;
mod server;

/// Two-player chess relay: pairs anonymous players and relays their moves.
#[derive(Parser, Debug)]
#[command(name = "chess-relay")]
#[command(version)]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize logger from environment variable (default to info level).
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    // Start the MatchmakingServer actor (pairs players into sessions).
    let matchmaking_addr = MatchmakingServer::new().start();

    // Shared application state for HTTP/WebSocket handlers.
    let state = web::Data::new(server::state::AppState::new(matchmaking_addr));

    info!("Listening at {}:{}{}", args.host, args.port, WS_PATH);

    // Start the HTTP server with the WebSocket endpoint.
    HttpServer::new(move || {
        App::new()
            .wrap(
                actix_web::middleware::DefaultHeaders::new()
                    .add(("Access-Control-Allow-Origin", "*"))
                    .add(("Access-Control-Allow-Headers", "*"))
            )
            .app_data(state.clone())
            .configure(crate::server::router::config)
    })
    .bind((args.host.as_str(), args.port))?
    .run()
    .await
}
