/// Matchmaking module: pairs incoming players into sessions and adapts their WebSockets.

pub mod server;
pub mod socket;
