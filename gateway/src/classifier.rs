//! Response classification for retry decisions
//!
//! Maps one transport exchange to an [`AttemptOutcome`]. Delay hints are
//! parsed best-effort from provider error text; when parsing fails the caller
//! falls back to computed backoff.

use std::sync::LazyLock;
use std::time::Duration;

use regex_lite::Regex;
use serde_json::Value;

use crate::backoff::MAX_SUGGESTED_DELAY;
use crate::result::ResponseData;
use crate::transport::{TransportError, TransportResponse};

/// Longest provider message carried into a failure reason
const MAX_REASON_CHARS: usize = 200;

static ESTIMATED_TIME: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"estimated_time"?'?\s*[:=]\s*"?(-?[0-9]+(?:\.[0-9]+)?(?:[eE][+-]?[0-9]+)?)"#).ok()
});

/// Result of a single attempt
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Success(ResponseData),
    /// Worth retrying later (cold start, overload, network blip)
    TransientFailure {
        reason: String,
        suggested_delay: Option<Duration>,
    },
    /// Retrying cannot help (bad request, auth, not found)
    FatalFailure { reason: String },
}

impl AttemptOutcome {
    pub fn is_retryable(&self) -> bool {
        matches!(self, AttemptOutcome::TransientFailure { .. })
    }
}

/// Classify one transport exchange
pub fn classify(response: Result<TransportResponse, TransportError>) -> AttemptOutcome {
    match response {
        Ok(response) => classify_response(response),
        Err(err) if err.is_retryable() => AttemptOutcome::TransientFailure {
            reason: err.to_string(),
            suggested_delay: None,
        },
        Err(err) => AttemptOutcome::FatalFailure {
            reason: err.to_string(),
        },
    }
}

fn classify_response(response: TransportResponse) -> AttemptOutcome {
    let status = response.status;
    if (200..300).contains(&status) {
        return AttemptOutcome::Success(ResponseData {
            body: response.body,
            content_type: response.content_type,
        });
    }

    let text = String::from_utf8_lossy(&response.body);
    let message = provider_message(&text);
    let loading = is_model_loading(&text);

    let transient_status = status >= 500 || status == 408 || status == 429;
    if transient_status || (loading && (400..500).contains(&status)) {
        let header_hint = if status == 429 || status == 503 {
            response.retry_after
        } else {
            None
        };
        return AttemptOutcome::TransientFailure {
            reason: format!("HTTP {status}: {message}"),
            suggested_delay: parse_estimated_time(&text).or_else(|| sanitize_hint(header_hint)),
        };
    }

    if (400..500).contains(&status) {
        AttemptOutcome::FatalFailure {
            reason: format!("HTTP {status}: {message}"),
        }
    } else {
        AttemptOutcome::FatalFailure {
            reason: format!("unexpected status {status}: {message}"),
        }
    }
}

/// Extract a delay hint from text such as
/// `{"error":"Model x is currently loading","estimated_time":12.5}`.
///
/// Seconds are converted to milliseconds and capped at one minute. Zero,
/// negative or unparseable values yield `None`.
pub fn parse_estimated_time(text: &str) -> Option<Duration> {
    let regex = ESTIMATED_TIME.as_ref()?;
    let captures = regex.captures(text)?;
    let seconds: f64 = captures.get(1)?.as_str().parse().ok()?;
    if !seconds.is_finite() || seconds <= 0.0 {
        return None;
    }
    let millis = (seconds * 1000.0).round();
    let capped = millis.min(MAX_SUGGESTED_DELAY.as_millis() as f64);
    Some(Duration::from_millis(capped as u64))
}

fn sanitize_hint(hint: Option<Duration>) -> Option<Duration> {
    hint.filter(|d| !d.is_zero()).map(|d| d.min(MAX_SUGGESTED_DELAY))
}

/// Whether the provider reports a cold model
pub fn is_model_loading(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    lower.contains("currently loading") || lower.contains("model is loading")
}

/// Best human-readable message from an error body
fn provider_message(text: &str) -> String {
    let from_json = serde_json::from_str::<Value>(text).ok().and_then(|json| {
        let error = json.get("error");
        error
            .and_then(Value::as_str)
            .or_else(|| error.and_then(|e| e.get("message")).and_then(Value::as_str))
            .or_else(|| json.get("message").and_then(Value::as_str))
            .map(str::to_string)
    });

    let message = from_json.unwrap_or_else(|| text.trim().to_string());
    if message.is_empty() {
        return "empty response body".to_string();
    }
    truncate_chars(&message, MAX_REASON_CHARS)
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
