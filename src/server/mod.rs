// src/server/mod.rs

//! Server layer root module.
//!
//! This module organizes the main backend server components, including:
//! - Application state management
//! - HTTP/WebSocket routing
//! - The transport-independent player connection
//! - Matchmaking (pairing players, WebSocket adapter)
//! - Game sessions (message model, reader tasks, turn-gated relay)

pub mod state;
pub mod router;
pub mod connection;
pub mod matchmaking;
pub mod game_session;
pub mod ws_error;
