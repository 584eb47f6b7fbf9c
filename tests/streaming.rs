//! Integration tests for the streaming client using wiremock.

use humegpt::api::{
    ApiConfig, ApiError, ChatClient, ChatRequest, MalformedPolicy, StreamChunk, StreamingProvider,
};
use humegpt::session::{drive, Session, SessionState};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Build an SSE body from a slice of data payloads.
fn sse_body(data_lines: &[&str]) -> String {
    let mut body = String::new();
    for line in data_lines {
        body.push_str(&format!("data: {line}\n\n"));
    }
    body
}

fn delta(content: &str) -> String {
    serde_json::json!({
        "id": "chatcmpl-1",
        "object": "chat.completion.chunk",
        "choices": [{"index": 0, "delta": {"content": content}, "finish_reason": null}]
    })
    .to_string()
}

fn client_for(server: &MockServer, key: &str) -> ChatClient {
    ChatClient::new(ApiConfig::new(key).with_base_url(format!("{}/v1", server.uri())))
}

fn ping() -> ChatRequest {
    ChatRequest::new("gpt-4-turbo").with_user("ping")
}

async fn mount_sse(server: &MockServer, body: String) {
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(server)
        .await;
}

#[tokio::test]
async fn ping_pong_end_to_end() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(header("content-type", "application/json"))
        .and(body_json(serde_json::json!({
            "model": "gpt-4-turbo",
            "messages": [{"role": "user", "content": "ping"}],
            "stream": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            sse_body(&[r#"{"choices":[{"delta":{"content":"pong"}}]}"#, "[DONE]"]),
            "text/event-stream",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = Session::new(client_for(&server, "test-key"));
    let mut fragments = Vec::new();
    let outcome = session.run(ping(), |f| fragments.push(f.to_string())).await;

    assert!(outcome.is_completed(), "expected completion, got {:?}", outcome);
    assert_eq!(fragments, vec!["pong"]);
    assert_eq!(session.state().accumulated_text, "pong");
}

#[tokio::test]
async fn fragments_concatenate_to_all_delta_content() {
    let server = MockServer::start().await;
    let parts = ["Paris", " is the capital", " of France", ". \u{1F1EB}\u{1F1F7}"];

    let mut lines: Vec<String> = parts.iter().map(|p| delta(p)).collect();
    lines.insert(0, r#"{"choices":[{"delta":{"role":"assistant","content":""}}]}"#.to_string());
    lines.push(r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#.to_string());
    lines.push("[DONE]".to_string());
    let line_refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    mount_sse(&server, sse_body(&line_refs)).await;

    let client = client_for(&server, "key");
    let stream = client.send_streaming(ping()).await.unwrap();
    let (state, outcome) = drive(stream, SessionState::new(), |_| {}).await;

    assert!(outcome.is_completed());
    assert_eq!(state.accumulated_text, parts.concat());
    assert!(!state.is_streaming);
}

#[tokio::test]
async fn done_only_body_completes_without_fragments() {
    let server = MockServer::start().await;
    mount_sse(&server, "data: [DONE]\n".to_string()).await;

    let mut stream = client_for(&server, "key").send_streaming(ping()).await.unwrap();
    let mut chunks = Vec::new();
    while let Some(chunk) = stream.next().await {
        chunks.push(chunk);
    }

    assert!(matches!(chunks.as_slice(), [StreamChunk::Done]));
}

#[tokio::test]
async fn empty_body_completes_without_fragments() {
    let server = MockServer::start().await;
    mount_sse(&server, String::new()).await;

    let mut session = Session::new(client_for(&server, "key"));
    let mut count = 0;
    let outcome = session.run(ping(), |_| count += 1).await;

    assert!(outcome.is_completed());
    assert_eq!(count, 0);
    assert_eq!(session.state().accumulated_text, "");
}

#[tokio::test]
async fn missing_key_makes_no_network_call() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = ApiConfig {
        api_key: None,
        base_url: format!("{}/v1", server.uri()),
        ..ApiConfig::default()
    };
    let result = ChatClient::new(config).send_streaming(ping()).await;

    match result {
        Err(ApiError::Configuration(msg)) => assert!(msg.contains("API key")),
        other => panic!("expected Configuration error, got {:?}", other.map(|_| ())),
    }
    // MockServer verifies `.expect(0)` on drop
}

#[tokio::test]
async fn malformed_line_is_skipped_and_reported() {
    let server = MockServer::start().await;
    let body = format!(
        "data: {}\n\ndata: {{not json\n\ndata: {}\n\ndata: [DONE]\n\n",
        delta("before"),
        delta(" after")
    );
    mount_sse(&server, body).await;

    let mut stream = client_for(&server, "key").send_streaming(ping()).await.unwrap();
    let mut text = String::new();
    let mut warnings = 0;
    let mut done = false;
    while let Some(chunk) = stream.next().await {
        match chunk {
            StreamChunk::Fragment(f) => text.push_str(&f),
            StreamChunk::Warning(ApiError::Protocol { payload, .. }) => {
                assert_eq!(payload, "{not json");
                warnings += 1;
            }
            StreamChunk::Done => done = true,
            other => panic!("unexpected chunk {:?}", other),
        }
    }

    assert_eq!(text, "before after");
    assert_eq!(warnings, 1);
    assert!(done);
}

#[tokio::test]
async fn malformed_line_aborts_and_keeps_earlier_text() {
    let server = MockServer::start().await;
    let body = format!(
        "data: {}\n\ndata: {{not json\n\ndata: {}\n\n",
        delta("kept"),
        delta("dropped")
    );
    mount_sse(&server, body).await;

    let client = ChatClient::new(
        ApiConfig::new("key")
            .with_base_url(format!("{}/v1", server.uri()))
            .with_malformed_policy(MalformedPolicy::Abort),
    );
    let mut session = Session::new(client);
    let outcome = session.run(ping(), |_| {}).await;

    assert!(matches!(outcome.error(), Some(ApiError::Protocol { .. })));
    assert_eq!(session.state().accumulated_text, "kept");
    assert!(!session.is_streaming());
}

#[tokio::test]
async fn error_status_is_provider_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}
        })))
        .mount(&server)
        .await;

    let result = client_for(&server, "bad-key").send_streaming(ping()).await;
    match result {
        Err(err @ ApiError::Provider(_)) => {
            assert!(err.is_transport());
            assert!(err.to_string().contains("401"));
            assert!(err.to_string().contains("Incorrect API key"));
        }
        other => panic!("expected Provider error, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn no_content_is_transport_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let result = client_for(&server, "key").send_streaming(ping()).await;
    assert!(matches!(result, Err(ApiError::Transport(_))));
}

#[tokio::test]
async fn stop_before_reading_reports_cancelled() {
    let server = MockServer::start().await;
    mount_sse(&server, sse_body(&[&delta("unread"), "[DONE]"])).await;

    let mut session = Session::new(client_for(&server, "key"));
    let stream = session.open(ping()).await.unwrap();
    assert!(session.is_streaming());

    // The reader task has not been polled yet on the test runtime
    assert!(session.stop());

    let outcome = session.consume(stream, |_| {}).await;
    assert!(outcome.is_cancelled(), "expected cancellation, got {:?}", outcome);
    assert!(!session.is_streaming());
    assert!(session.cancel_handle().is_none());
}

#[tokio::test]
async fn dropped_stream_frees_session_for_next_request() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            sse_body(&[&delta("pong"), "[DONE]"]),
            "text/event-stream",
        ))
        .expect(2)
        .mount(&server)
        .await;

    let mut session = Session::new(client_for(&server, "key"));
    let stream = session.open(ping()).await.unwrap();
    drop(stream);
    assert!(!session.is_streaming());

    let outcome = session.run(ping(), |_| {}).await;
    assert!(outcome.is_completed(), "expected completion, got {:?}", outcome);
    assert_eq!(session.state().accumulated_text, "pong");
}

#[tokio::test]
async fn null_error_field_keeps_content() {
    let server = MockServer::start().await;
    mount_sse(
        &server,
        sse_body(&[
            r#"{"choices":[{"delta":{"content":"hi"}}],"error":null}"#,
            "[DONE]",
        ]),
    )
    .await;

    let mut session = Session::new(client_for(&server, "key"));
    let outcome = session.run(ping(), |_| {}).await;

    assert!(outcome.is_completed(), "expected completion, got {:?}", outcome);
    assert_eq!(session.state().accumulated_text, "hi");
}
