/// Centralized helpers for WebSocket error frames and close reasons.
///
/// Use these helpers so that every error a player sees has the same shape: a wire
/// frame of type `error` carrying a code and a human-readable message.
use actix_web_actors::ws;

/// Formats a WebSocket error frame as a JSON string.
///
/// # Arguments
/// - `code`: Unique error code (e.g. "SESSION_FULL").
/// - `message`: Human-readable error message (in English).
pub fn ws_error_message(code: &str, message: &str) -> String {
    serde_json::json!({
        "type": "error",
        "code": code,
        "message": message,
    })
    .to_string()
}

/// Builds a close reason with a short description.
pub fn ws_close_reason(code: ws::CloseCode, description: &str) -> ws::CloseReason {
    ws::CloseReason {
        code,
        description: Some(description.to_string()),
    }
}
