//! Gateway configuration
//!
//! Layered loading: builtin defaults, then an optional TOML file, then
//! `MODELGATE_` environment variables.

pub mod error;
pub mod loader;

pub use error::ConfigError;
pub use loader::{ConfigLoader, GatewayConfig};
