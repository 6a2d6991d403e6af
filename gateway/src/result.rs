//! Caller-facing invocation result

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Successful response payload, passed through untouched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseData {
    pub body: Bytes,
    pub content_type: Option<String>,
}

impl ResponseData {
    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.contains("json"))
    }

    /// Parse the body as JSON
    pub fn json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_slice(&self.body)
    }

    /// Body as UTF-8 text, if it is text
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }
}

/// Why an invocation gave up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Total time budget exhausted
    Timeout,
    /// Attempt budget exhausted on transient failures
    MaxRetriesExceeded,
    /// Non-retryable failure, with the classified reason
    Fatal(String),
    /// Caller abandoned the invocation
    Cancelled,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Timeout => f.write_str("timeout"),
            FailureReason::MaxRetriesExceeded => f.write_str("max retries exceeded"),
            FailureReason::Fatal(reason) => f.write_str(reason),
            FailureReason::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Outcome of one logical invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ResponseData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub attempts_made: u32,
    pub elapsed_ms: u64,
}

impl InvocationResult {
    pub fn succeeded(data: ResponseData, attempts_made: u32, elapsed_ms: u64) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            attempts_made,
            elapsed_ms,
        }
    }

    pub fn failed(reason: &FailureReason, attempts_made: u32, elapsed_ms: u64) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(reason.to_string()),
            attempts_made,
            elapsed_ms,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.error.as_deref() == Some("timeout")
    }

    pub fn is_cancelled(&self) -> bool {
        self.error.as_deref() == Some("cancelled")
    }
}
