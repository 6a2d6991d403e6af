//! `modelgate invoke`
//!
//! Calls a model through the gateway, reporting retries on stderr while the
//! model warms up. Ctrl-C cancels the invocation and any pending backoff.

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use clap::Parser;
use modelgate_gateway::{
    InferenceGateway, InvocationResult, ModelCategory, ResponseData, RetryStatus,
};
use serde::Serialize;
use serde_json::Value;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

use crate::exit_codes;

#[derive(Debug, Parser)]
pub struct InvokeArgs {
    /// Model key, e.g. mistralai/Mistral-7B-Instruct-v0.2
    #[arg(long, value_name = "KEY")]
    pub model: String,

    /// Model category: image, audio, text, vision, multimodal, video
    ///
    /// Anything else uses the default retry policy.
    #[arg(long, value_name = "CATEGORY", default_value = "text")]
    pub category: String,

    /// Request payload as JSON
    #[arg(long, value_name = "JSON", conflicts_with_all = ["payload_file", "inputs"])]
    pub payload: Option<String>,

    /// Read the JSON payload from a file ("-" for stdin)
    #[arg(long, value_name = "PATH", conflicts_with = "inputs")]
    pub payload_file: Option<PathBuf>,

    /// Shorthand for a payload of {"inputs": TEXT}
    #[arg(long, value_name = "TEXT")]
    pub inputs: Option<String>,

    /// Write the response body to this file
    #[arg(long, short = 'o', value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Output the invocation result as JSON for automation
    #[arg(long)]
    pub json: bool,

    /// Config file (default: ./modelgate.toml, then user config locations)
    #[arg(long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,
}

pub async fn run_invoke(args: InvokeArgs) -> i32 {
    if args.model.trim().is_empty() {
        eprintln!("--model must not be empty");
        return exit_codes::CONFIG_ERROR;
    }

    let payload = match read_payload(&args).await {
        Ok(payload) => payload,
        Err(e) => {
            eprintln!("Invalid payload: {e:#}");
            return exit_codes::CONFIG_ERROR;
        }
    };

    let config = match crate::load_config(args.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return exit_codes::CONFIG_ERROR;
        }
    };

    let gateway = match InferenceGateway::from_config(&config) {
        Ok(gateway) => gateway,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return exit_codes::CONFIG_ERROR;
        }
    };

    let category = ModelCategory::from(args.category.as_str());
    if category == ModelCategory::Unknown {
        tracing::warn!(
            category = %args.category,
            "Unrecognized category, using default retry policy"
        );
    }

    let cancel = CancellationToken::new();
    let ctrl_c = tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    let quiet = args.json;
    let result = gateway
        .invoke_with_status(&args.model, category, &payload, &cancel, |status| {
            if !quiet {
                print_retry_status(&status);
            }
        })
        .await;
    ctrl_c.abort();

    if let (Some(path), Some(data)) = (args.output.as_deref(), result.data.as_ref()) {
        if let Err(e) = write_output(path, data) {
            eprintln!("{e:#}");
            return exit_codes::INVOCATION_FAILED;
        }
    }

    if args.json {
        let view = InvokeReport::new(&args.model, category, &result, args.output.is_none());
        println!("{}", serde_json::to_string_pretty(&view).unwrap_or_default());
    } else {
        print_human(&result, args.output.as_deref());
    }

    if result.success {
        exit_codes::SUCCESS
    } else {
        exit_codes::INVOCATION_FAILED
    }
}

async fn read_payload(args: &InvokeArgs) -> anyhow::Result<Value> {
    if let Some(raw) = &args.payload {
        return serde_json::from_str(raw).context("--payload is not valid JSON");
    }
    if let Some(path) = &args.payload_file {
        let raw = if path.as_os_str() == "-" {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("failed to read payload from stdin")?;
            buf
        } else {
            std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?
        };
        return serde_json::from_str(&raw)
            .with_context(|| format!("{} is not valid JSON", path.display()));
    }
    if let Some(inputs) = &args.inputs {
        return Ok(serde_json::json!({ "inputs": inputs }));
    }
    bail!("one of --payload, --payload-file or --inputs is required")
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if signal.is_ok() {
                tracing::info!("Interrupted, cancelling invocation");
                cancel.cancel();
            }
        }
        _ = cancel.cancelled() => {}
    }
}

fn print_retry_status(status: &RetryStatus) {
    let origin = if status.is_server_hint {
        "server estimate"
    } else {
        "backoff"
    };
    eprintln!(
        "Attempt {} failed: {}. Retrying in {:.1}s ({origin}); model {}.",
        status.attempt,
        status.reason,
        status.sleep.as_secs_f64(),
        status.expected_wait.message()
    );
}

fn write_output(path: &Path, data: &ResponseData) -> anyhow::Result<()> {
    std::fs::write(path, &data.body)
        .with_context(|| format!("failed to write response to {}", path.display()))
}

fn print_human(result: &InvocationResult, output: Option<&Path>) {
    let Some(data) = result.data.as_ref() else {
        eprintln!(
            "Invocation failed after {} attempt(s) in {} ms: {}",
            result.attempts_made,
            result.elapsed_ms,
            result.error.as_deref().unwrap_or("unknown error")
        );
        return;
    };

    if let Some(path) = output {
        println!("Wrote {} bytes to {}", data.body.len(), path.display());
    } else if data.is_json() {
        match data.json() {
            Ok(value) => println!(
                "{}",
                serde_json::to_string_pretty(&value).unwrap_or_default()
            ),
            Err(_) => println!("{}", String::from_utf8_lossy(&data.body)),
        }
    } else if let Some(text) = data.text() {
        println!("{text}");
    } else {
        println!(
            "<{} bytes of {}> (use --output to save)",
            data.body.len(),
            data.content_type.as_deref().unwrap_or("binary data")
        );
    }
    tracing::info!(
        attempts = result.attempts_made,
        elapsed_ms = result.elapsed_ms,
        "Invocation complete"
    );
}

/// Machine-readable view of an [`InvocationResult`]
#[derive(Debug, Serialize)]
struct InvokeReport<'a> {
    model: &'a str,
    category: ModelCategory,
    success: bool,
    attempts_made: u32,
    elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    encoding: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl<'a> InvokeReport<'a> {
    fn new(
        model: &'a str,
        category: ModelCategory,
        result: &'a InvocationResult,
        include_body: bool,
    ) -> Self {
        let (encoding, data) = match result.data.as_ref() {
            Some(data) if include_body => {
                let (encoding, value) = encode_body(data);
                (Some(encoding), Some(value))
            }
            _ => (None, None),
        };
        Self {
            model,
            category,
            success: result.success,
            attempts_made: result.attempts_made,
            elapsed_ms: result.elapsed_ms,
            error: result.error.as_deref(),
            content_type: result
                .data
                .as_ref()
                .and_then(|data| data.content_type.as_deref()),
            encoding,
            data,
        }
    }
}

/// JSON bodies inline, text as a string, anything else base64
fn encode_body(data: &ResponseData) -> (&'static str, Value) {
    if data.is_json() {
        if let Ok(value) = data.json() {
            return ("json", value);
        }
    }
    match data.text() {
        Some(text) => ("utf8", Value::String(text.to_string())),
        None => ("base64", Value::String(BASE64.encode(&data.body))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn response(body: &[u8], content_type: Option<&str>) -> ResponseData {
        ResponseData {
            body: body.to_vec().into(),
            content_type: content_type.map(str::to_string),
        }
    }

    fn args(payload: Option<&str>, inputs: Option<&str>) -> InvokeArgs {
        InvokeArgs {
            model: "gpt2".to_string(),
            category: "text".to_string(),
            payload: payload.map(str::to_string),
            payload_file: None,
            inputs: inputs.map(str::to_string),
            output: None,
            json: false,
            config: None,
        }
    }

    #[tokio::test]
    async fn payload_from_inline_json() {
        let payload = read_payload(&args(Some(r#"{"inputs":"hi"}"#), None))
            .await
            .unwrap();
        assert_eq!(payload, serde_json::json!({"inputs": "hi"}));
    }

    #[tokio::test]
    async fn payload_from_inputs_shorthand() {
        let payload = read_payload(&args(None, Some("a cat"))).await.unwrap();
        assert_eq!(payload, serde_json::json!({"inputs": "a cat"}));
    }

    #[tokio::test]
    async fn payload_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payload.json");
        std::fs::write(&path, r#"{"inputs": [1, 2]}"#).unwrap();

        let mut args = args(None, None);
        args.payload_file = Some(path);
        let payload = read_payload(&args).await.unwrap();
        assert_eq!(payload, serde_json::json!({"inputs": [1, 2]}));
    }

    #[tokio::test]
    async fn missing_payload_is_an_error() {
        let err = read_payload(&args(None, None)).await.unwrap_err();
        assert!(err.to_string().contains("--payload"));
    }

    #[tokio::test]
    async fn malformed_payload_is_an_error() {
        let err = read_payload(&args(Some("{not json"), None))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not valid JSON"));
    }

    #[test]
    fn json_body_is_inlined() {
        let data = response(br#"[{"label":"cat"}]"#, Some("application/json"));
        let (encoding, value) = encode_body(&data);
        assert_eq!(encoding, "json");
        assert_eq!(value[0]["label"], "cat");
    }

    #[test]
    fn binary_body_is_base64() {
        let data = response(&[0xff, 0xd8, 0xff, 0xe0], Some("image/jpeg"));
        let (encoding, value) = encode_body(&data);
        assert_eq!(encoding, "base64");
        assert_eq!(value, Value::String("/9j/4A==".to_string()));
    }

    #[test]
    fn text_body_is_a_string() {
        let data = response(b"plain words", Some("text/plain"));
        let (encoding, value) = encode_body(&data);
        assert_eq!(encoding, "utf8");
        assert_eq!(value, Value::String("plain words".to_string()));
    }
}
