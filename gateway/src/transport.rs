//! Transport boundary
//!
//! One request/response exchange with the inference provider. The gateway owns
//! retries; a transport never retries on its own.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue, RETRY_AFTER};
use serde_json::Value;
use thiserror::Error;

use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};

/// Raw provider response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Bytes,
    pub content_type: Option<String>,
    /// `Retry-After` header, when given in seconds
    pub retry_after: Option<Duration>,
}

impl TransportResponse {
    /// Convenience constructor for JSON bodies
    pub fn json(status: u16, body: &Value) -> Self {
        Self {
            status,
            body: Bytes::from(body.to_string()),
            content_type: Some("application/json".to_string()),
            retry_after: None,
        }
    }
}

/// Errors below the HTTP layer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("network error: {0}")]
    Network(String),

    /// The request could not be built; resending it would fail the same way
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl TransportError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TransportError::InvalidRequest(_))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let message = err.to_string();
        if err.is_builder() {
            TransportError::InvalidRequest(message)
        } else if err.is_timeout() {
            TransportError::Timeout(message)
        } else if err.is_connect() {
            TransportError::Connect(message)
        } else {
            TransportError::Network(message)
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `payload` to the model identified by `endpoint`
    async fn send(
        &self,
        endpoint: &str,
        payload: &Value,
    ) -> std::result::Result<TransportResponse, TransportError>;
}

/// reqwest-backed transport for Hugging Face style inference APIs.
///
/// POSTs JSON to `{base_url}/{model_key}`. The connection pool lives in the
/// shared `reqwest::Client`, so one transport serves concurrent invocations.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    auth_header: Option<HeaderValue>,
    wait_for_model: bool,
}

impl HttpTransport {
    pub fn new(
        base_url: impl Into<String>,
        api_token: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("modelgate/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(GatewayError::HttpClient)?;
        Self::with_client(client, base_url, api_token)
    }

    /// Use a preconfigured client (custom TLS, proxies, tests)
    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_token: Option<String>,
    ) -> Result<Self> {
        let auth_header = api_token
            .map(|token| {
                let mut value =
                    HeaderValue::from_str(&format!("Bearer {}", token.trim())).map_err(|e| {
                        GatewayError::InvalidToken {
                            env_var: "api token".to_string(),
                            reason: e.to_string(),
                        }
                    })?;
                value.set_sensitive(true);
                Ok::<_, GatewayError>(value)
            })
            .transpose()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            auth_header,
            wait_for_model: false,
        })
    }

    /// Build from configuration, reading the API token from the environment once
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        let token = std::env::var(&config.api_token_env)
            .ok()
            .filter(|token| !token.trim().is_empty());
        if token.is_none() {
            tracing::warn!(
                env_var = %config.api_token_env,
                "No API token found; requests will be sent unauthenticated"
            );
        }

        let transport = Self::new(&config.endpoint, token, config.request_timeout()).map_err(
            |err| match err {
                GatewayError::InvalidToken { reason, .. } => GatewayError::InvalidToken {
                    env_var: config.api_token_env.clone(),
                    reason,
                },
                other => other,
            },
        )?;
        Ok(transport.with_wait_for_model(config.wait_for_model))
    }

    /// Ask the provider to block until the model is loaded instead of 503ing
    pub fn with_wait_for_model(mut self, wait_for_model: bool) -> Self {
        self.wait_for_model = wait_for_model;
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth_header.is_some()
    }

    fn url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        endpoint: &str,
        payload: &Value,
    ) -> std::result::Result<TransportResponse, TransportError> {
        let mut request = self.client.post(self.url(endpoint)).json(payload);
        if let Some(auth) = &self.auth_header {
            request = request.header(AUTHORIZATION, auth.clone());
        }
        if self.wait_for_model {
            request = request.header("x-wait-for-model", "true");
        }

        let response = request.send().await?;

        let status = response.status().as_u16();
        let headers = response.headers();
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let retry_after = headers
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);

        let body = response.bytes().await?;

        Ok(TransportResponse {
            status,
            body,
            content_type,
            retry_after,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn transport(base: &str) -> HttpTransport {
        HttpTransport::new(base, None, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn url_joins_without_double_slashes() {
        assert_eq!(
            transport("https://api.example/models/").url("/gpt2"),
            "https://api.example/models/gpt2"
        );
        assert_eq!(
            transport("https://api.example/models").url("org/model"),
            "https://api.example/models/org/model"
        );
    }

    #[test]
    fn token_with_newline_is_rejected() {
        let err = HttpTransport::new(
            "https://api.example",
            Some("abc\ndef".to_string()),
            Duration::from_secs(5),
        )
        .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidToken { .. }));
    }

    #[test]
    fn only_request_errors_are_fatal() {
        assert!(TransportError::Connect("refused".into()).is_retryable());
        assert!(TransportError::Timeout("30s".into()).is_retryable());
        assert!(TransportError::Network("reset".into()).is_retryable());
        assert!(!TransportError::InvalidRequest("bad url".into()).is_retryable());
    }
}
