/// Server configuration constants.
///
/// This module defines the listen address, the WebSocket endpoint path, and
/// limits applied to incoming frames.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default listen port.
pub const DEFAULT_PORT: u16 = 5555;

/// Path of the WebSocket endpoint players connect to.
pub const WS_PATH: &str = "/ws";

/// Maximum size (in bytes) of a single incoming WebSocket frame.
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// Frames a connection may have queued before the relay reads them. A player who
/// goes past this (for example by sending while still waiting for an opponent) is
/// disconnected.
pub const INBOUND_QUEUE_CAPACITY: usize = 32;

/// Events a reader task may have queued for the relay before it waits.
pub const RELAY_QUEUE_CAPACITY: usize = 32;
