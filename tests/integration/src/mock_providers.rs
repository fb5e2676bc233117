//! Mock provider sidecars for integration testing
//!
//! Provides wiremock-based servers speaking the gateway's uniform provider
//! shape (`POST /v1/generate`, `POST /v1/generate/stream`, `GET /health`).

use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Mock provider sidecar
pub struct MockProvider {
    /// Underlying wiremock server
    pub server: MockServer,
}

impl MockProvider {
    /// Start a sidecar that reports healthy
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
            .mount(&server)
            .await;
        Self { server }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Number of generate calls received so far
    pub async fn generate_calls(&self) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == "/v1/generate")
            .count()
    }

    /// Number of stream opens received so far
    pub async fn stream_calls(&self) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == "/v1/generate/stream")
            .count()
    }

    /// Bodies of generate calls received so far
    pub async fn generate_bodies(&self) -> Vec<Value> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == "/v1/generate")
            .filter_map(|r| serde_json::from_slice(&r.body).ok())
            .collect()
    }

    /// Answer every text generation
    pub async fn mock_text(&self, text: &str, input_tokens: u32, output_tokens: u32) {
        Mock::given(method("POST"))
            .and(path("/v1/generate"))
            .and(body_partial_json(json!({"format": {"type": "text"}})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(text_output(text, input_tokens, output_tokens)),
            )
            .mount(&self.server)
            .await;
    }

    /// Answer every object generation
    pub async fn mock_object(&self, object: Value, input_tokens: u32, output_tokens: u32) {
        Mock::given(method("POST"))
            .and(path("/v1/generate"))
            .and(body_partial_json(json!({"format": {"type": "object"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": {"type": "object", "value": object},
                "input_tokens": input_tokens,
                "output_tokens": output_tokens
            })))
            .mount(&self.server)
            .await;
    }

    /// Answer every embedding request, reporting no token usage
    pub async fn mock_embedding(&self, vector: &[f32]) {
        Mock::given(method("POST"))
            .and(path("/v1/generate"))
            .and(body_partial_json(json!({"format": {"type": "embedding"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": {"type": "embedding", "value": vector}
            })))
            .mount(&self.server)
            .await;
    }

    /// Rate-limit the next `times` generate calls
    pub async fn mock_rate_limit(&self, times: u64) {
        Mock::given(method("POST"))
            .and(path("/v1/generate"))
            .respond_with(
                ResponseTemplate::new(429)
                    .set_body_json(error_body("Rate limit exceeded")),
            )
            .up_to_n_times(times)
            .with_priority(1)
            .mount(&self.server)
            .await;
    }

    /// Fail the next `times` generate calls with a server error
    pub async fn mock_server_error(&self, times: u64) {
        Mock::given(method("POST"))
            .and(path("/v1/generate"))
            .respond_with(
                ResponseTemplate::new(500).set_body_json(error_body("Internal server error")),
            )
            .up_to_n_times(times)
            .with_priority(1)
            .mount(&self.server)
            .await;
    }

    /// Reject every generate call as a bad request
    pub async fn mock_bad_request(&self) {
        Mock::given(method("POST"))
            .and(path("/v1/generate"))
            .respond_with(ResponseTemplate::new(400).set_body_json(error_body("Unknown model")))
            .mount(&self.server)
            .await;
    }

    /// Stream `chunks` as deltas, then report token usage
    pub async fn mock_stream(&self, chunks: &[&str], input_tokens: u32, output_tokens: u32) {
        let mut events: Vec<Value> = chunks
            .iter()
            .map(|text| json!({"type": "delta", "text": text}))
            .collect();
        events.push(json!({
            "type": "done",
            "input_tokens": input_tokens,
            "output_tokens": output_tokens
        }));
        Mock::given(method("POST"))
            .and(path("/v1/generate/stream"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(sse_body(&events), "text/event-stream"),
            )
            .mount(&self.server)
            .await;
    }

    /// Answer text generations after a delay
    pub async fn mock_slow_text(&self, text: &str, delay: Duration) {
        Mock::given(method("POST"))
            .and(path("/v1/generate"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(text_output(text, 10, 5))
                    .set_delay(delay),
            )
            .mount(&self.server)
            .await;
    }
}

/// Text output body
pub fn text_output(text: &str, input_tokens: u32, output_tokens: u32) -> Value {
    json!({
        "content": {"type": "text", "value": text},
        "input_tokens": input_tokens,
        "output_tokens": output_tokens
    })
}

/// Server-sent event body ending with the `[DONE]` marker
pub fn sse_body(events: &[Value]) -> String {
    let mut body: String = events
        .iter()
        .map(|event| format!("data: {event}\n\n"))
        .collect();
    body.push_str("data: [DONE]\n\n");
    body
}

/// Error body in the sidecar shape
pub fn error_body(message: &str) -> Value {
    json!({"error": {"message": message}})
}
