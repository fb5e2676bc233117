//! End-to-end integration tests
//!
//! Drive the gateway through its library API and over HTTP against mock
//! provider sidecars, with SQLite-backed policy and usage stores.

use crate::fixtures::*;
use crate::helpers::*;
use crate::mock_providers::*;
use gateway_core::{BlockReason, GatewayError, ProviderKind, Purpose, Tier, UsageQuery, UsageSink};
use gateway_routing::Resolution;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::{Duration, Instant};

async fn openai_gateway(resilience: TestResilience) -> (MockProvider, TestGateway) {
    init_tracing();
    let openai = MockProvider::start().await;
    let gateway = TestGateway::new(&[(ProviderKind::OpenAi, openai.url())], resilience).await;
    (openai, gateway)
}

async fn stored_usage(gateway: &TestGateway) -> Vec<gateway_core::UsageRecord> {
    gateway.flush_usage().await;
    gateway
        .usage
        .query_usage(&UsageQuery::default())
        .await
        .expect("usage query failed")
}

#[tokio::test]
async fn test_scenario_default_policy_routes_to_cheap_default() {
    let (_openai, h) = openai_gateway(TestResilience::default()).await;

    let resolution = h
        .gateway
        .resolver()
        .resolve_decision("tagger", Purpose::Classification, None)
        .unwrap();
    let decision = resolution.decision().expect("expected a decision");
    assert_eq!(decision.tier, Tier::Cheap);
    assert_eq!(decision.model, OPENAI_CHEAP_MODEL);
    assert_eq!(decision.provider, ProviderKind::OpenAi);
    assert!(!decision.model_overridden);
}

#[tokio::test]
async fn test_scenario_disabled_feature_is_blocked() {
    let (_openai, h) = openai_gateway(TestResilience::default()).await;
    h.admin.toggle_feature("tagger", false, "ops").await.unwrap();

    let resolution = h
        .gateway
        .resolver()
        .resolve_decision("tagger", Purpose::Classification, None)
        .unwrap();
    assert_eq!(
        resolution,
        Resolution::Blocked {
            reason: BlockReason::FeatureDisabled
        }
    );
}

#[tokio::test]
async fn test_scenario_kill_switch_takes_precedence() {
    let (_openai, h) = openai_gateway(TestResilience::default()).await;
    h.admin.toggle_feature("anything", false, "ops").await.unwrap();
    h.admin.activate_kill_switch("incident", "ops").await.unwrap();

    let resolution = h
        .gateway
        .resolver()
        .resolve_decision("anything", Purpose::Conversational, None)
        .unwrap();
    assert_eq!(
        resolution,
        Resolution::Blocked {
            reason: BlockReason::KillSwitch
        }
    );
}

#[tokio::test]
async fn test_scenario_rate_limited_twice_then_succeeds() {
    let resilience = TestResilience::default();
    let (openai, h) = openai_gateway(resilience).await;
    openai.mock_rate_limit(2).await;
    openai.mock_text("gardening, plants", 1000, 200).await;

    let started = Instant::now();
    let invocation = h.gateway.invoke(tagging_request("tagger")).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(invocation.content.as_text(), Some("gardening, plants"));
    assert_eq!(openai.generate_calls().await, 3);
    assert!(
        elapsed >= resilience.base_delay * 3,
        "expected at least {:?} of backoff, took {elapsed:?}",
        resilience.base_delay * 3
    );

    let records = stored_usage(&h).await;
    assert_eq!(records.len(), 1);
    assert!(records[0].success);
    assert_eq!(records[0].id, invocation.usage_id);
}

#[tokio::test]
async fn test_success_records_cost_and_tokens() {
    let (openai, h) = openai_gateway(TestResilience::default()).await;
    openai.mock_text("work", 1000, 200).await;

    let invocation = h.gateway.invoke(tagging_request("tagger")).await.unwrap();
    let expected_cost = 1000.0 / 1_000_000.0 * 0.15 + 200.0 / 1_000_000.0 * 0.6;
    assert!((invocation.estimated_cost - expected_cost).abs() < 1e-12);

    let records = stored_usage(&h).await;
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.feature, "tagger");
    assert_eq!(record.user_id.as_deref(), Some("user-1"));
    assert_eq!(record.provider, Some(ProviderKind::OpenAi));
    assert_eq!(record.model.as_deref(), Some(OPENAI_CHEAP_MODEL));
    assert_eq!(record.tier, Some(Tier::Cheap));
    assert_eq!(record.input_tokens, 1000);
    assert_eq!(record.output_tokens, 200);
    assert!((record.estimated_cost - expected_cost).abs() < 1e-12);

    let sent = openai.generate_bodies().await;
    assert_eq!(sent[0]["model"], OPENAI_CHEAP_MODEL);
    assert_eq!(sent[0]["max_tokens"], 300);
}

#[tokio::test]
async fn test_blocked_call_never_reaches_provider() {
    let (openai, h) = openai_gateway(TestResilience::default()).await;
    openai.mock_text("unused", 1, 1).await;
    h.admin.activate_kill_switch("budget exceeded", "ops").await.unwrap();

    let err = h.gateway.invoke(tagging_request("tagger")).await.unwrap_err();
    assert!(matches!(
        err,
        GatewayError::FeatureUnavailable {
            reason: BlockReason::KillSwitch
        }
    ));
    assert_eq!(openai.generate_calls().await, 0);

    let records = stored_usage(&h).await;
    assert_eq!(records.len(), 1);
    assert!(!records[0].success);
    assert_eq!(records[0].error_kind.map(|k| k.as_str()), Some("blocked"));
}

#[tokio::test]
async fn test_server_error_gets_one_grace_retry() {
    let (openai, h) = openai_gateway(TestResilience::default()).await;
    openai.mock_server_error(2).await;
    openai.mock_text("never", 1, 1).await;

    let err = h.gateway.invoke(tagging_request("tagger")).await.unwrap_err();
    assert!(matches!(
        err,
        GatewayError::Provider {
            status_code: Some(500),
            ..
        }
    ));
    assert_eq!(openai.generate_calls().await, 2);

    let records = stored_usage(&h).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].error_kind.map(|k| k.as_str()), Some("provider_error"));
}

#[tokio::test]
async fn test_slow_provider_times_out() {
    let resilience = TestResilience {
        timeout: Duration::from_millis(100),
        max_retries: 0,
        ..TestResilience::default()
    };
    let (openai, h) = openai_gateway(resilience).await;
    openai.mock_slow_text("late", Duration::from_millis(500)).await;

    let err = h.gateway.invoke(tagging_request("tagger")).await.unwrap_err();
    assert!(matches!(err, GatewayError::Timeout { .. }));

    let records = stored_usage(&h).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].error_kind.map(|k| k.as_str()), Some("timeout"));
}

#[tokio::test]
async fn test_routing_override_switches_provider() {
    init_tracing();
    let openai = MockProvider::start().await;
    let anthropic = MockProvider::start().await;
    openai.mock_text("from openai", 10, 5).await;
    anthropic.mock_text("from anthropic", 10, 5).await;
    let h = TestGateway::new(
        &[
            (ProviderKind::OpenAi, openai.url()),
            (ProviderKind::Anthropic, anthropic.url()),
        ],
        TestResilience::default(),
    )
    .await;

    let first = h.gateway.invoke(classification_request("classifier")).await.unwrap();
    assert_eq!(first.provider, ProviderKind::OpenAi);

    h.admin
        .set_routing_override(&[ProviderKind::Anthropic, ProviderKind::OpenAi], "ops")
        .await
        .unwrap();
    let second = h.gateway.invoke(classification_request("classifier")).await.unwrap();
    assert_eq!(second.provider, ProviderKind::Anthropic);
    assert_eq!(second.model, "claude-3-haiku-20240307");
    assert_eq!(anthropic.generate_calls().await, 1);
}

#[tokio::test]
async fn test_embedding_batch_invokes_per_text() {
    let (openai, h) = openai_gateway(TestResilience::default()).await;
    openai.mock_embedding(&[0.1, 0.2, 0.3]).await;

    let texts: Vec<String> = (0..5).map(|i| format!("note number {i}")).collect();
    let batch = h
        .gateway
        .embed_batch("semantic-search", &texts, Some("user-9".to_string()))
        .await
        .unwrap();

    assert_eq!(batch.embeddings.len(), 5);
    assert!(batch.embeddings.iter().all(|v| v.len() == 3));
    assert!(batch.total_cost > 0.0);
    assert_eq!(openai.generate_calls().await, 5);

    let records = stored_usage(&h).await;
    assert_eq!(records.len(), 5);
    assert!(records.iter().all(|r| r.success && r.tier == Some(Tier::Embedding)));
    assert!(records.iter().all(|r| r.input_tokens > 0));
}

#[tokio::test]
async fn test_http_invoke_and_usage_endpoints() {
    let (openai, h) = openai_gateway(TestResilience::default()).await;
    openai.mock_text("weekly summary", 400, 100).await;
    openai.mock_object(sample_insight(), 300, 80).await;
    let server = TestServer::start(h.state.clone()).await;

    let response = server.post_json("/v1/invoke", &invoke_body("weekly-digest", "summarization")).await;
    assert_status(&response, 200);
    let body = TestServer::json_body(response).await;
    assert_eq!(body["tier"], "MEDIUM");
    assert_eq!(body["model"], "gpt-4o");
    assert_eq!(body["content"], json!({"type": "text", "value": "weekly summary"}));

    let response = server.post_json("/v1/invoke", &object_invoke_body("insights")).await;
    assert_status(&response, 200);
    let body = TestServer::json_body(response).await;
    assert_eq!(body["content"]["value"], sample_insight());

    h.flush_usage().await;
    let response = server.get("/admin/ai/usage?feature=insights").await;
    assert_status(&response, 200);
    let rows = TestServer::json_body(response).await;
    assert_eq!(rows.as_array().unwrap().len(), 1);
    assert_eq!(rows[0]["feature"], "insights");

    let summary = TestServer::json_body(server.get("/admin/ai/usage/summary").await).await;
    assert_eq!(summary["total_requests"], 2);
    assert_eq!(summary["successful_requests"], 2);

    let cost = TestServer::json_body(server.get("/admin/ai/cost").await).await;
    assert_eq!(cost["total_requests"], 2);
}

#[tokio::test]
async fn test_http_error_statuses() {
    let resilience = TestResilience {
        max_retries: 0,
        ..TestResilience::default()
    };
    let (openai, h) = openai_gateway(resilience).await;
    openai.mock_rate_limit(1).await;
    openai.mock_bad_request().await;
    let server = TestServer::start(h.state.clone()).await;

    let response = server.post_json("/v1/invoke", &invoke_body("tagger", "tagging")).await;
    assert_status(&response, 429);
    let body = TestServer::json_body(response).await;
    assert_eq!(body["error"], "rate_limited");

    let response = server.post_json("/v1/invoke", &invoke_body("tagger", "tagging")).await;
    assert_status(&response, 502);

    let response = server
        .post_json(
            "/v1/invoke",
            &json!({"feature": "tagger", "purpose": "poetry", "payload": {"prompt": "x"}}),
        )
        .await;
    assert_status(&response, 400);

    h.flush_usage().await;
    let rows = h.usage.query_usage(&UsageQuery::default()).await.unwrap();
    assert_eq!(rows.len(), 2);
}

#[tokio::test]
async fn test_abandoned_invocation_is_recorded_as_cancelled() {
    let (openai, h) = openai_gateway(TestResilience::default()).await;
    openai.mock_rate_limit(10).await;

    let outcome = tokio::time::timeout(
        Duration::from_millis(120),
        h.gateway.invoke(tagging_request("tagger")),
    )
    .await;
    assert!(outcome.is_err(), "invocation should still be backing off");
    assert!(openai.generate_calls().await >= 1);

    let records = stored_usage(&h).await;
    assert_eq!(records.len(), 1);
    assert!(!records[0].success);
    assert_eq!(records[0].error_kind.map(|k| k.as_str()), Some("cancelled"));
    assert_eq!(records[0].provider, Some(ProviderKind::OpenAi));
    assert_eq!(records[0].model.as_deref(), Some(OPENAI_CHEAP_MODEL));
}

#[tokio::test]
async fn test_http_stream_invoke() {
    let (openai, h) = openai_gateway(TestResilience::default()).await;
    openai.mock_stream(&["garden", "ing"], 40, 6).await;
    let server = TestServer::start(h.state.clone()).await;

    let response = server.post_json("/v1/invoke/stream", &invoke_body("tagger", "tagging")).await;
    assert_status(&response, 200);
    let text = response.text().await.unwrap();
    let data: Vec<&str> = text
        .lines()
        .filter_map(|line| line.strip_prefix("data:").map(str::trim_start))
        .collect();
    assert_eq!(data.last(), Some(&"[DONE]"));
    let chunks: Vec<serde_json::Value> = data[..data.len() - 1]
        .iter()
        .map(|d| serde_json::from_str(d).unwrap())
        .collect();
    assert_eq!(chunks[0], json!({"type": "delta", "text": "garden"}));
    assert_eq!(chunks[1], json!({"type": "delta", "text": "ing"}));
    assert_eq!(chunks[2]["type"], "done");
    assert_eq!(chunks[2]["model"], OPENAI_CHEAP_MODEL);
    assert_eq!(chunks[2]["output_tokens"], 6);
    assert_eq!(openai.stream_calls().await, 1);
    assert_eq!(openai.generate_calls().await, 0);

    let records = stored_usage(&h).await;
    assert_eq!(records.len(), 1);
    assert!(records[0].success);
    assert_eq!(records[0].input_tokens, 40);
    assert_eq!(records[0].output_tokens, 6);
    assert_eq!(chunks[2]["usage_id"], json!(records[0].id));
}

#[tokio::test]
async fn test_http_error_log_and_cost_history() {
    let resilience = TestResilience {
        max_retries: 0,
        ..TestResilience::default()
    };
    let (openai, h) = openai_gateway(resilience).await;
    openai.mock_rate_limit(1).await;
    openai.mock_text("ok", 1000, 200).await;
    let server = TestServer::start(h.state.clone()).await;

    let response = server.post_json("/v1/invoke", &invoke_body("tagger", "tagging")).await;
    assert_status(&response, 429);
    let response = server.post_json("/v1/invoke", &invoke_body("tagger", "tagging")).await;
    assert_status(&response, 200);
    h.flush_usage().await;

    let logs = TestServer::json_body(server.get("/admin/ai/logs").await).await;
    assert_eq!(logs["count"], 1);
    assert_eq!(logs["errors"][0]["error_kind"], "rate_limited");

    let logs =
        TestServer::json_body(server.get("/admin/ai/logs?error_kind=rate_limited").await).await;
    assert_eq!(logs["count"], 1);
    let logs = TestServer::json_body(server.get("/admin/ai/logs?error_kind=timeout").await).await;
    assert_eq!(logs["count"], 0);

    let response = server.get("/admin/ai/cost/history?period=weekly").await;
    assert_status(&response, 200);
    let history = TestServer::json_body(response).await;
    assert_eq!(history["period"]["type"], "weekly");
    assert_eq!(history["summary"]["total_requests"], 2);
    assert_eq!(history["history"][0]["total_requests"], 2);
    assert_eq!(history["history"][0]["successful_requests"], 1);
    assert_eq!(history["truncated"], false);
}

#[tokio::test]
async fn test_provider_health_endpoint() {
    let (_openai, h) = openai_gateway(TestResilience::default()).await;
    let server = TestServer::start(h.state.clone()).await;

    let response = server.get("/admin/ai/providers").await;
    assert_status(&response, 200);
    let body = TestServer::json_body(response).await;
    assert_eq!(body, json!([{"provider": "openai", "healthy": true}]));

    let response = server.get("/health").await;
    assert_status(&response, 200);
    let body = TestServer::json_body(response).await;
    assert_eq!(body["status"], "healthy");
}
