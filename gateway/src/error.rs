//! Error types for building and wiring the gateway
//!
//! Invocation outcomes are never errors: they are reported through
//! [`crate::InvocationResult`]. These types cover the setup path only.

use thiserror::Error;

use crate::config::ConfigError;

/// Gateway result type alias
pub type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("invalid API token in ${env_var}: {reason}")]
    InvalidToken { env_var: String, reason: String },
}
