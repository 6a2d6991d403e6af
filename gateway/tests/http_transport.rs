//! End-to-end gateway tests over HTTP against a wiremock provider

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use modelgate_gateway::{
    GatewayConfig, HttpTransport, InferenceGateway, ModelCategory, PolicyOverride, PolicyTable,
    RetryPolicy, Transport,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use serial_test::serial;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Millisecond-scale policy so real-time tests stay fast
fn fast_policies() -> PolicyTable {
    let fast = RetryPolicy::new(3, 10, 40, 5_000);
    PolicyTable::builtin()
        .with_policy(ModelCategory::Text, fast)
        .with_policy(ModelCategory::Image, fast)
}

fn http_gateway(base_url: &str, token: Option<&str>) -> InferenceGateway {
    let transport = HttpTransport::new(
        base_url,
        token.map(str::to_string),
        Duration::from_secs(5),
    )
    .unwrap();
    InferenceGateway::new(Arc::new(transport)).with_policies(fast_policies())
}

#[tokio::test]
async fn cold_model_recovers_after_loading_responses() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/gpt2"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "error": "Model gpt2 is currently loading",
            "estimated_time": 0.02
        })))
        .up_to_n_times(2)
        .with_priority(1)
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/models/gpt2"))
        .and(body_json(json!({"inputs": "Once upon a time"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"generated_text": "Once upon a time, there was"}])),
        )
        .with_priority(2)
        .expect(1)
        .mount(&server)
        .await;

    let gateway = http_gateway(&format!("{}/models", server.uri()), None);
    let result = gateway
        .invoke("gpt2", ModelCategory::Text, &json!({"inputs": "Once upon a time"}))
        .await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.attempts_made, 3);
    let data = result.data.unwrap();
    assert!(data.is_json());
    assert_eq!(
        data.json().unwrap()[0]["generated_text"],
        "Once upon a time, there was"
    );
}

#[tokio::test]
async fn unauthorized_is_fatal_and_sends_bearer_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/gpt2"))
        .and(header("authorization", "Bearer hf_test_token"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"error": "Invalid credentials in Authorization header"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let gateway = http_gateway(&format!("{}/models", server.uri()), Some("hf_test_token"));
    let result = gateway
        .invoke("gpt2", ModelCategory::Text, &json!({"inputs": "hi"}))
        .await;

    assert!(!result.success);
    assert_eq!(result.attempts_made, 1);
    assert_eq!(
        result.error.as_deref(),
        Some("HTTP 401: Invalid credentials in Authorization header")
    );
}

#[tokio::test]
async fn binary_payload_passes_through() {
    let server = MockServer::start().await;
    let png = vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

    Mock::given(method("POST"))
        .and(path("/models/stabilityai/stable-diffusion-xl-base-1.0"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(png.clone(), "image/png"),
        )
        .mount(&server)
        .await;

    let gateway = http_gateway(&format!("{}/models/", server.uri()), None);
    let result = gateway
        .invoke(
            "stabilityai/stable-diffusion-xl-base-1.0",
            ModelCategory::Image,
            &json!({"inputs": "a lighthouse at dusk"}),
        )
        .await;

    assert!(result.success);
    let data = result.data.unwrap();
    assert_eq!(data.content_type.as_deref(), Some("image/png"));
    assert_eq!(data.body.as_ref(), png.as_slice());
    assert!(!data.is_json());
}

#[tokio::test]
async fn rate_limit_is_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/gpt2"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "0")
                .set_body_json(json!({"error": "Rate limit reached"})),
        )
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/models/gpt2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .with_priority(2)
        .mount(&server)
        .await;

    let gateway = http_gateway(&format!("{}/models", server.uri()), None);
    let result = gateway.invoke("gpt2", ModelCategory::Text, &json!({})).await;

    assert!(result.success);
    assert_eq!(result.attempts_made, 2);
}

#[tokio::test]
async fn persistent_server_errors_exhaust_retries() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .expect(4)
        .mount(&server)
        .await;

    let gateway = http_gateway(&format!("{}/models", server.uri()), None);
    let result = gateway.invoke("gpt2", ModelCategory::Text, &json!({})).await;

    assert_eq!(result.error.as_deref(), Some("max retries exceeded"));
    assert_eq!(result.attempts_made, 4);
}

#[tokio::test]
async fn connection_refused_is_transient() {
    // Bind then drop a listener so the port is known to be closed.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let transport =
        HttpTransport::new(format!("http://{addr}/models"), None, Duration::from_secs(2)).unwrap();
    let reply = transport.send("gpt2", &json!({})).await;
    let err = reply.unwrap_err();
    assert!(err.is_retryable(), "{err}");

    let gateway = InferenceGateway::new(Arc::new(transport)).with_policies(fast_policies());
    let result = gateway.invoke("gpt2", ModelCategory::Text, &json!({})).await;
    assert_eq!(result.error.as_deref(), Some("max retries exceeded"));
    assert_eq!(result.attempts_made, 4);
}

#[tokio::test]
async fn wait_for_model_header_is_sent() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(header("x-wait-for-model", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let transport = HttpTransport::new(
        format!("{}/models", server.uri()),
        None,
        Duration::from_secs(5),
    )
    .unwrap()
    .with_wait_for_model(true);
    let response = transport.send("gpt2", &json!({})).await.unwrap();

    assert_eq!(response.status, 200);
}

#[tokio::test]
#[serial]
async fn gateway_from_config_reads_token_and_policies() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/gpt2"))
        .and(header("authorization", "Bearer from-env"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
        .expect(2)
        .mount(&server)
        .await;

    let mut policies = BTreeMap::new();
    policies.insert("text".to_string(), PolicyOverride::from(RetryPolicy::new(1, 10, 10, 5_000)));
    let config = GatewayConfig {
        endpoint: format!("{}/models", server.uri()),
        api_token_env: "MODELGATE_TEST_TOKEN".to_string(),
        request_timeout_ms: 5_000,
        policies,
        ..Default::default()
    };

    unsafe {
        std::env::set_var("MODELGATE_TEST_TOKEN", "from-env");
    }
    let gateway = InferenceGateway::from_config(&config);
    unsafe {
        std::env::remove_var("MODELGATE_TEST_TOKEN");
    }
    let gateway = gateway.unwrap();

    assert_eq!(
        gateway.policy_for(ModelCategory::Text),
        RetryPolicy::new(1, 10, 10, 5_000)
    );

    let result = gateway.invoke("gpt2", ModelCategory::Text, &json!({})).await;
    assert_eq!(result.error.as_deref(), Some("max retries exceeded"));
    assert_eq!(result.attempts_made, 2);
}
