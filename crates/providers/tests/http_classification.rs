//! HTTP-level tests for the OpenAI-compatible service against a mock server.

use std::time::Duration;

use convoquery_core::error::ProviderError;
use convoquery_core::provider::{CompletionRequest, CompletionService, PromptMessage};
use convoquery_providers::OpenAiCompatService;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn service(server: &MockServer) -> OpenAiCompatService {
    OpenAiCompatService::new("mock", server.uri(), "sk-test", Duration::from_secs(5))
}

fn request() -> CompletionRequest {
    CompletionRequest {
        model: "gpt-4o-mini".into(),
        messages: vec![
            PromptMessage::system("Answer briefly."),
            PromptMessage::user("What is the answer?"),
        ],
        temperature: 0.1,
        max_tokens: Some(64),
    }
}

async fn mount(server: &MockServer, template: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(template)
        .mount(server)
        .await;
}

#[tokio::test]
async fn success_returns_first_choice() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "max_tokens": 64,
            "stream": false
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "gpt-4o-mini-2024-07-18",
            "choices": [
                {"message": {"role": "assistant", "content": "42"}},
                {"message": {"role": "assistant", "content": "ignored"}}
            ],
            "usage": {"prompt_tokens": 30, "completion_tokens": 1, "total_tokens": 31}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = service(&server).complete(request()).await.unwrap();
    assert_eq!(response.content, "42");
    assert_eq!(response.model, "gpt-4o-mini-2024-07-18");
    assert_eq!(response.usage.unwrap().total_tokens, 31);
}

#[tokio::test]
async fn status_429_is_rate_limited() {
    let server = MockServer::start().await;
    mount(
        &server,
        ResponseTemplate::new(429).set_body_json(json!({
            "error": {"message": "Rate limit reached for requests"}
        })),
    )
    .await;

    let err = service(&server).complete(request()).await.unwrap_err();
    assert_eq!(
        err,
        ProviderError::RateLimited("Rate limit reached for requests".into())
    );
}

#[tokio::test]
async fn status_503_and_504_are_unavailable() {
    for status in [503u16, 504] {
        let server = MockServer::start().await;
        mount(&server, ResponseTemplate::new(status)).await;

        let err = service(&server).complete(request()).await.unwrap_err();
        assert_eq!(
            err,
            ProviderError::ServiceUnavailable {
                status_code: status
            }
        );
    }
}

#[tokio::test]
async fn other_failure_carries_service_message() {
    let server = MockServer::start().await;
    mount(
        &server,
        ResponseTemplate::new(401).set_body_json(json!({
            "error": {"message": "Incorrect API key provided"}
        })),
    )
    .await;

    let err = service(&server).complete(request()).await.unwrap_err();
    assert_eq!(
        err,
        ProviderError::RequestFailed {
            status_code: Some(401),
            message: "Incorrect API key provided".into(),
        }
    );
}

#[tokio::test]
async fn unparsable_failure_body_gets_generic_message() {
    let server = MockServer::start().await;
    mount(&server, ResponseTemplate::new(500).set_body_string("oops")).await;

    let err = service(&server).complete(request()).await.unwrap_err();
    assert_eq!(err, ProviderError::api_call_failed(500));
}

#[tokio::test]
async fn empty_choices_is_request_failed() {
    let server = MockServer::start().await;
    mount(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({"choices": []})),
    )
    .await;

    let err = service(&server).complete(request()).await.unwrap_err();
    assert!(matches!(err, ProviderError::RequestFailed { .. }));
}

#[tokio::test]
async fn malformed_success_body_is_request_failed() {
    let server = MockServer::start().await;
    mount(&server, ResponseTemplate::new(200).set_body_string("not json")).await;

    let err = service(&server).complete(request()).await.unwrap_err();
    assert!(matches!(
        err,
        ProviderError::RequestFailed { status_code: Some(200), .. }
    ));
}

#[tokio::test]
async fn unreachable_endpoint_is_transport_error() {
    // Port 9 (discard) on localhost is not expected to serve HTTP.
    let service = OpenAiCompatService::new(
        "dead",
        "http://127.0.0.1:9",
        "sk-test",
        Duration::from_secs(2),
    );
    let err = service.complete(request()).await.unwrap_err();
    assert!(matches!(err, ProviderError::Transport(_)));
}

#[tokio::test]
async fn health_check_hits_models_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(&server)
        .await;

    assert!(service(&server).health_check().await.unwrap());
}
