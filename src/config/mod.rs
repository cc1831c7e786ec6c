/// Main configuration module.
///
/// Re-exports submodules for server configuration.
pub mod server;
