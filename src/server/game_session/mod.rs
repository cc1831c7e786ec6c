/// Game session module: message model, pairing state machine, reader tasks and the
/// turn-gated relay.

pub mod messages;
pub mod reader;
pub mod relay;
pub mod session;

pub use session::{EndReason, JoinError, Session, SessionHandle, SessionStatus};
