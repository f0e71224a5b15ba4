//! OpenAI provider contract tests.
//!
//! Verify the exact request shape sent to `/v1/chat/completions`, how the
//! JSON-mode reply is unpacked, and how HTTP failures surface through the
//! retrying generator.

use std::sync::Arc;
use std::time::Duration;

use dailykind::config::ProviderConfig;
use dailykind::error::DailyKindError;
use dailykind::generator::openai::OpenAiTaskProvider;
use dailykind::{CandidateGenerator, GenerationConstraints, RetryPolicy, TaskProvider};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "created": 1_760_000_000,
        "model": "gpt-4.1-mini",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    })
}

fn provider(server: &MockServer) -> OpenAiTaskProvider {
    let config = ProviderConfig {
        base_url: server.uri(),
        timeout_secs: 10,
        ..Default::default()
    };
    OpenAiTaskProvider::new(config, "test-key").unwrap()
}

// ────────────────────────────────────────────────────────────────────────────
// Request format
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn request_uses_json_mode_seed_and_bearer_auth() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "gpt-4.1-mini",
            "temperature": 0.8,
            "max_tokens": 8000,
            "seed": 42,
            "response_format": {"type": "json_object"}
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion(r#"{"tasks":["Hold the door.","Text an old friend."]}"#)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let payload = provider(&server)
        .request_batch(2, &GenerationConstraints::default(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(payload, json!(["Hold the door.", "Text an old friend."]));
}

#[tokio::test]
async fn system_prompt_states_batch_size() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({
            "messages": [
                {"role": "system", "content": GenerationConstraints::default().system_prompt(70)},
                {"role": "user", "content": "Generate the list now."}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(r#"{"tasks":[]}"#)))
        .expect(1)
        .mount(&server)
        .await;

    provider(&server)
        .request_batch(70, &GenerationConstraints::default(), &CancellationToken::new())
        .await
        .unwrap();
}

// ────────────────────────────────────────────────────────────────────────────
// Error mapping
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn http_error_maps_to_provider_error_with_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {"message": "Rate limit reached", "type": "requests"}
        })))
        .mount(&server)
        .await;

    let err = provider(&server)
        .request_batch(5, &GenerationConstraints::default(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "PROVIDER_ERROR");
    assert!(err.to_string().contains("429"), "{err}");
    assert!(err.to_string().contains("Rate limit reached"), "{err}");
}

#[tokio::test]
async fn prose_reply_is_schema_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("Here are your tasks: 1. Smile")))
        .mount(&server)
        .await;

    let err = provider(&server)
        .request_batch(1, &GenerationConstraints::default(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "SCHEMA_INVALID");
}

// ────────────────────────────────────────────────────────────────────────────
// Through the generator
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn generator_retries_server_error_then_succeeds() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion(r#"{"tasks":["Thank your bus driver."]}"#)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let generator = CandidateGenerator::new(
        Arc::new(provider(&server)),
        GenerationConstraints::default(),
        RetryPolicy::default().with_base_delay_ms(5),
    );
    let tasks = generator.generate(1, &CancellationToken::new()).await.unwrap();
    assert_eq!(tasks, vec!["Thank your bus driver."]);
}

#[tokio::test]
async fn generator_exhausts_on_persistent_invalid_output() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion(r#"{"tasks":["Same thing.","same thing."]}"#)),
        )
        .expect(3)
        .mount(&server)
        .await;

    let generator = CandidateGenerator::new(
        Arc::new(provider(&server)),
        GenerationConstraints::default(),
        RetryPolicy::default().with_base_delay_ms(5),
    );
    let err = generator.generate(2, &CancellationToken::new()).await.unwrap_err();
    match err {
        DailyKindError::GenerationExhausted { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("expected GenerationExhausted, got {other:?}"),
    }
}

#[tokio::test]
async fn cancellation_aborts_in_flight_request() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion(r#"{"tasks":["Too late."]}"#))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let started = std::time::Instant::now();
    let err = provider(&server)
        .request_batch(1, &GenerationConstraints::default(), &cancel)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "CANCELLED");
    assert!(started.elapsed() < Duration::from_secs(4));
}
