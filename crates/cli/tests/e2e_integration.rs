//! End-to-end tests: orchestrator, HTTP completion service and a mock
//! OpenAI-compatible endpoint.

use convoquery_config::{AppConfig, SchedulerConfig};
use convoquery_core::message::{Message, Query};
use convoquery_engine::Orchestrator;
use convoquery_providers::OpenAiCompatService;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Config pointing at the mock server, with pacing shrunk to milliseconds.
fn config(server: &MockServer) -> AppConfig {
    AppConfig {
        base_url: server.uri(),
        request_timeout_secs: 5,
        scheduler: SchedulerConfig {
            max_concurrent: 2,
            slot_wait_ms: 5_000,
            base_delay_ms: 1,
            max_delay_ms: 4,
            cooldown_ms: 5,
            rate_limit_cooldown_ms: 10,
            session_pause_ms: 0,
            ..SchedulerConfig::default()
        },
        ..AppConfig::default()
    }
}

fn orchestrator(server: &MockServer) -> Orchestrator {
    let config = config(server);
    Orchestrator::new(config.clone(), OpenAiCompatService::connector(&config))
}

fn messages() -> Vec<Message> {
    vec![
        Message::new("s1", "user", "My parcel never arrived", "2024-05-02", "C-1")
            .with_field("Channel", "email"),
        Message::new("s1", "agent", "Sorry to hear that", "2024-05-01", "C-1"),
        Message::new("s2", "user", "Thanks, all good", "2024-05-03", "C-2")
            .with_field("Channel", "chat"),
    ]
}

fn completion(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "model": "gpt-4o-mini",
        "choices": [{"message": {"role": "assistant", "content": content}}]
    }))
}

#[tokio::test]
async fn every_pair_is_answered_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer sk-e2e"))
        .respond_with(completion(" 42 "))
        .expect(2)
        .mount(&server)
        .await;

    let queries = vec![
        Query::new("Answer", "What is the answer?"),
        Query::new("Channel", r#"Get column "channel""#),
    ];
    let report = orchestrator(&server)
        .run(messages(), queries, Some(" sk-e2e\n"))
        .await
        .unwrap();

    assert_eq!(report.results.len(), 2);
    let s1 = &report.results[0];
    assert_eq!(s1.start_date, "2024-05-02");
    assert_eq!(s1.answer("Answer"), Some("42"));
    assert_eq!(s1.answer("Channel"), Some("email"));
    assert_eq!(report.results[1].answer("Channel"), Some("chat"));
    assert_eq!(report.stats.extracted, 2);
    assert_eq!(report.stats.completed, 2);
}

#[tokio::test]
async fn http_429_becomes_rate_limit_placeholder() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {"message": "Rate limit reached for requests"}
        })))
        .mount(&server)
        .await;

    let report = orchestrator(&server)
        .run(
            messages(),
            vec![Query::new("Mood", "How does the customer feel?")],
            Some("sk"),
        )
        .await
        .unwrap();

    for record in &report.results {
        assert_eq!(record.answer("Mood"), Some("Error: rate limit exceeded"));
    }
    assert_eq!(report.stats.rate_limited, 2);
}

#[tokio::test]
async fn http_failures_do_not_abort_the_run() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let report = orchestrator(&server)
        .run(
            messages(),
            vec![Query::new("Mood", "How does the customer feel?")],
            Some("sk"),
        )
        .await
        .unwrap();

    assert_eq!(report.results.len(), 2);
    assert_eq!(
        report.results[1].answer("Mood"),
        Some("Error: service unavailable (503)")
    );
    assert_eq!(report.stats.failed, 2);
}
