use mockito::{Matcher, Server};
use serde_json::json;
use theorybench::domain::{PromptRequest, RunError};
use theorybench::infra::llm::{
    AnthropicProvider, DeepSeekProvider, GeminiProvider, LlmProvider, OpenAiProvider,
};

fn request() -> PromptRequest {
    PromptRequest::new(
        "You are a music theory assistant.",
        "Identify the cadence in bar 4.",
        0.2,
    )
    .expect("request should validate")
}

#[test]
fn openai_success_sends_chat_payload_and_trims_response() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_header("authorization", "Bearer test-key")
        .match_body(Matcher::PartialJson(json!({
            "model": "gpt-4.1-nano-2025-04-14",
            "temperature": 0.2,
            "max_tokens": 2048,
            "messages": [
                {"role": "system", "content": "You are a music theory assistant."},
                {"role": "user", "content": "Identify the cadence in bar 4."}
            ]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "choices": [
                    {"message": {"role": "assistant", "content": "  Perfect authentic cadence.\n"}}
                ]
            })
            .to_string(),
        )
        .create();

    let provider = OpenAiProvider::with_config("test-key", server.url(), None)
        .expect("provider should build");
    let response = provider.query(&request()).expect("query should succeed");

    mock.assert();
    assert_eq!(response, "Perfect authentic cadence.");
}

#[test]
fn openai_unauthorized_maps_to_auth_error() {
    let mut server = Server::new();
    let _mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(401)
        .with_body(r#"{"error":{"message":"Incorrect API key","type":"invalid_api_key"}}"#)
        .create();

    let provider = OpenAiProvider::with_config("bad-key", server.url(), None)
        .expect("provider should build");
    let err = provider
        .query(&request())
        .expect_err("unauthorized must fail");
    assert!(matches!(err, RunError::Auth));
}

#[test]
fn openai_rate_limit_maps_to_rate_limited() {
    let mut server = Server::new();
    let _mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(429)
        .with_body(r#"{"error":{"message":"Rate limit reached","type":"rate_limit_exceeded"}}"#)
        .create();

    let provider = OpenAiProvider::with_config("test-key", server.url(), None)
        .expect("provider should build");
    let err = provider.query(&request()).expect_err("429 must fail");
    assert!(matches!(err, RunError::RateLimited));
}

#[test]
fn openai_malformed_body_maps_to_invalid_response() {
    let mut server = Server::new();
    let _mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_body("not json at all")
        .create();

    let provider = OpenAiProvider::with_config("test-key", server.url(), None)
        .expect("provider should build");
    let err = provider
        .query(&request())
        .expect_err("malformed body must fail");
    assert!(matches!(err, RunError::InvalidResponse { .. }));
}

#[test]
fn anthropic_success_joins_text_blocks() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/v1/messages")
        .match_header("x-api-key", "test-key")
        .match_header("anthropic-version", "2023-06-01")
        .match_body(Matcher::PartialJson(json!({
            "model": "claude-3-haiku-20240307",
            "max_tokens": 1024,
            "system": "You are a music theory assistant."
        })))
        .with_status(200)
        .with_body(
            json!({
                "content": [
                    {"type": "text", "text": "Half "},
                    {"type": "text", "text": "cadence."}
                ]
            })
            .to_string(),
        )
        .create();

    let provider = AnthropicProvider::with_config("test-key", server.url(), None)
        .expect("provider should build");
    let response = provider.query(&request()).expect("query should succeed");

    mock.assert();
    assert_eq!(response, "Half cadence.");
}

#[test]
fn anthropic_auth_error_maps_from_error_type() {
    let mut server = Server::new();
    let _mock = server
        .mock("POST", "/v1/messages")
        .with_status(401)
        .with_body(r#"{"error":{"type":"authentication_error","message":"invalid x-api-key"}}"#)
        .create();

    let provider = AnthropicProvider::with_config("bad-key", server.url(), None)
        .expect("provider should build");
    let err = provider
        .query(&request())
        .expect_err("unauthorized must fail");
    assert!(matches!(err, RunError::Auth));
}

#[test]
fn gemini_success_merges_system_into_user_content() {
    let mut server = Server::new();
    let mock = server
        .mock(
            "POST",
            "/v1beta/models/gemini-2.5-flash-preview-04-17:generateContent",
        )
        .match_header("x-goog-api-key", "test-key")
        .match_body(Matcher::PartialJson(json!({
            "contents": [
                {"parts": [{"text": "You are a music theory assistant.\n\nIdentify the cadence in bar 4."}]}
            ],
            "generationConfig": {"temperature": 0.2}
        })))
        .with_status(200)
        .with_body(
            json!({
                "candidates": [
                    {"content": {"parts": [{"text": "Plagal cadence."}]}}
                ]
            })
            .to_string(),
        )
        .create();

    let provider = GeminiProvider::with_config("test-key", server.url(), None)
        .expect("provider should build");
    let response = provider.query(&request()).expect("query should succeed");

    mock.assert();
    assert_eq!(response, "Plagal cadence.");
}

#[test]
fn gemini_resource_exhausted_maps_to_rate_limited() {
    let mut server = Server::new();
    let _mock = server
        .mock(
            "POST",
            "/v1beta/models/gemini-2.5-flash-preview-04-17:generateContent",
        )
        .with_status(429)
        .with_body(r#"{"error":{"code":429,"message":"Quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#)
        .create();

    let provider = GeminiProvider::with_config("test-key", server.url(), None)
        .expect("provider should build");
    let err = provider.query(&request()).expect_err("429 must fail");
    assert!(matches!(err, RunError::RateLimited));
}

#[test]
fn deepseek_uses_chat_completions_with_its_own_default_model() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_header("authorization", "Bearer test-key")
        .match_body(Matcher::PartialJson(json!({"model": "deepseek-chat"})))
        .with_status(200)
        .with_body(
            json!({
                "choices": [
                    {"message": {"role": "assistant", "content": "Deceptive cadence."}}
                ]
            })
            .to_string(),
        )
        .create();

    let provider = DeepSeekProvider::with_config("test-key", server.url(), None)
        .expect("provider should build");
    let response = provider.query(&request()).expect("query should succeed");

    mock.assert();
    assert_eq!(response, "Deceptive cadence.");
}

#[test]
fn model_override_reaches_the_wire() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_body(Matcher::PartialJson(json!({"model": "gpt-4o"})))
        .with_status(200)
        .with_body(
            json!({
                "choices": [
                    {"message": {"role": "assistant", "content": "ok"}}
                ]
            })
            .to_string(),
        )
        .create();

    let provider = OpenAiProvider::with_config("test-key", server.url(), None)
        .expect("provider should build");
    let overridden = request().with_model_override(Some("gpt-4o".to_string()));
    provider
        .query(&overridden)
        .expect("query should succeed");
    mock.assert();
}
