//! Route definitions for the gateway API.

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::{handlers, state::AppState};

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(handlers::health_check))
        // Metrics endpoint
        .route("/metrics", get(handlers::metrics_endpoint))
        // Invocation endpoint
        .route("/v1/invoke", post(handlers::invoke))
        .route("/v1/invoke/stream", post(handlers::invoke_stream))
        // Admin endpoints
        .nest("/admin/ai", admin_routes())
        // Apply middleware
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        // Add state
        .with_state(state)
}

/// Policy, catalog and usage administration
fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/policy", get(handlers::get_policy))
        .route("/policy/reload", post(handlers::reload_policy))
        .route(
            "/kill-switch",
            get(handlers::get_kill_switch)
                .post(handlers::activate_kill_switch)
                .delete(handlers::deactivate_kill_switch),
        )
        .route("/features", get(handlers::list_features))
        .route("/features/toggle", post(handlers::toggle_feature))
        .route("/features/:feature", get(handlers::get_feature))
        .route("/overrides", get(handlers::list_overrides))
        .route("/overrides/model", post(handlers::set_model_override))
        .route("/overrides/tier", post(handlers::set_tier_override))
        .route("/overrides/routing", post(handlers::set_routing_override))
        .route("/overrides/:id", delete(handlers::remove_override))
        .route("/models", get(handlers::list_models))
        .route("/providers", get(handlers::list_providers))
        .route("/usage", get(handlers::query_usage))
        .route("/usage/summary", get(handlers::usage_summary))
        .route("/logs", get(handlers::error_logs))
        .route("/cost", get(handlers::cost_summary))
        .route("/cost/history", get(handlers::cost_history_report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_app, TestApp};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
        let response = create_router(app.state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post_json(uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .header("x-admin-user", "ops")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn invoke_body(feature: &str) -> Value {
        json!({
            "feature": feature,
            "purpose": "tagging",
            "payload": {"prompt": "tag this"},
            "user_id": "u-1"
        })
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = test_app();
        let (status, body) = send(&app, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["providers"], 1);
    }

    #[tokio::test]
    async fn test_invoke_endpoint() {
        let app = test_app();
        let (status, body) = send(&app, post_json("/v1/invoke", &invoke_body("tagger"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["provider"], "openai");
        assert_eq!(body["tier"], "CHEAP");
        assert_eq!(body["content"]["value"], "echo: tag this");

        app.state.gateway.recorder().flush().await;
        assert_eq!(app.sink.records().len(), 1);
    }

    #[tokio::test]
    async fn test_invoke_rejects_malformed_body() {
        let app = test_app();
        let request = Request::builder()
            .method("POST")
            .uri("/v1/invoke")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");
    }

    #[tokio::test]
    async fn test_kill_switch_blocks_invoke() {
        let app = test_app();
        let (status, body) = send(
            &app,
            post_json("/admin/ai/kill-switch", &json!({"reason": "incident"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["enabled"], true);
        assert_eq!(body["activated_by"], "ops");

        let (status, body) = send(&app, post_json("/v1/invoke", &invoke_body("tagger"))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "feature_unavailable");

        let request = Request::builder()
            .method("DELETE")
            .uri("/admin/ai/kill-switch")
            .header("x-admin-user", "ops")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["enabled"], false);

        let (status, _) = send(&app, post_json("/v1/invoke", &invoke_body("tagger"))).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_kill_switch_requires_reason() {
        let app = test_app();
        let (status, _) = send(&app, post_json("/admin/ai/kill-switch", &json!({"reason": " "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_feature_toggle_and_policy_view() {
        let app = test_app();
        let (status, body) = send(
            &app,
            post_json(
                "/admin/ai/features/toggle",
                &json!({"feature": "tagger", "enabled": false}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["disabled_features"], json!(["tagger"]));

        let (_, policy) = send(&app, get("/admin/ai/policy")).await;
        assert_eq!(policy["disabled_features"], json!(["tagger"]));

        let (status, _) = send(&app, post_json("/v1/invoke", &invoke_body("tagger"))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        let (status, _) = send(&app, post_json("/v1/invoke", &invoke_body("other"))).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_model_override_lifecycle() {
        let app = test_app();
        let (status, body) = send(
            &app,
            post_json(
                "/admin/ai/overrides/model",
                &json!({"tier": "CHEAP", "model": "gpt-4o"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["model_override_by_tier"]["CHEAP"], "gpt-4o");

        let (_, invocation) = send(&app, post_json("/v1/invoke", &invoke_body("tagger"))).await;
        assert_eq!(invocation["model"], "gpt-4o");
        assert_eq!(invocation["model_overridden"], true);

        let (status, overrides) = send(&app, get("/admin/ai/overrides")).await;
        assert_eq!(status, StatusCode::OK);
        let id = overrides[0]["id"].as_str().unwrap().to_string();

        let request = Request::builder()
            .method("DELETE")
            .uri(format!("/admin/ai/overrides/{id}"))
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["model_override_by_tier"], json!({}));
    }

    #[tokio::test]
    async fn test_routing_override_rejects_duplicates() {
        let app = test_app();
        let (status, _) = send(
            &app,
            post_json(
                "/admin/ai/overrides/routing",
                &json!({"order": ["openai", "openai"]}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_usage_and_cost_endpoints() {
        let app = test_app();
        for feature in ["tagger", "tagger", "muse"] {
            let (status, _) = send(&app, post_json("/v1/invoke", &invoke_body(feature))).await;
            assert_eq!(status, StatusCode::OK);
        }
        app.state.gateway.recorder().flush().await;

        let (status, rows) = send(&app, get("/admin/ai/usage?feature=tagger&limit=1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(rows.as_array().unwrap().len(), 1);

        let (_, summary) = send(&app, get("/admin/ai/usage/summary")).await;
        assert_eq!(summary["total_requests"], 3);
        assert_eq!(summary["requests_by_feature"]["tagger"], 2);

        let (_, cost) = send(&app, get("/admin/ai/cost")).await;
        assert_eq!(cost["total_requests"], 3);
    }

    #[tokio::test]
    async fn test_usage_summary_flags_truncation() {
        let mut app = test_app();
        app.state.summary_limit = 2;
        for _ in 0..3 {
            send(&app, post_json("/v1/invoke", &invoke_body("tagger"))).await;
        }
        app.state.gateway.recorder().flush().await;

        let (status, summary) = send(&app, get("/admin/ai/usage/summary")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(summary["total_requests"], 2);
        assert_eq!(summary["truncated"], true);

        let (_, summary) = send(&app, get("/admin/ai/usage/summary?feature=none")).await;
        assert_eq!(summary["total_requests"], 0);
        assert_eq!(summary["truncated"], false);
    }

    #[tokio::test]
    async fn test_error_log_lists_failures_only() {
        let app = test_app();
        send(&app, post_json("/v1/invoke", &invoke_body("tagger"))).await;
        send(
            &app,
            post_json(
                "/admin/ai/features/toggle",
                &json!({"feature": "muse", "enabled": false}),
            ),
        )
        .await;
        send(&app, post_json("/v1/invoke", &invoke_body("muse"))).await;
        app.state.gateway.recorder().flush().await;

        let (status, body) = send(&app, get("/admin/ai/logs")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
        assert_eq!(body["errors"][0]["feature"], "muse");
        assert_eq!(body["errors"][0]["error_kind"], "blocked");

        let (_, body) = send(&app, get("/admin/ai/logs?feature=tagger")).await;
        assert_eq!(body["count"], 0);
        let (_, body) = send(&app, get("/admin/ai/logs?error_kind=timeout")).await;
        assert_eq!(body["count"], 0);
    }

    #[tokio::test]
    async fn test_cost_history_buckets_by_period() {
        let app = test_app();
        for _ in 0..2 {
            send(&app, post_json("/v1/invoke", &invoke_body("tagger"))).await;
        }
        app.state.gateway.recorder().flush().await;

        let (status, body) = send(&app, get("/admin/ai/cost/history?period=hourly")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["period"]["type"], "hourly");
        assert_eq!(body["summary"]["total_requests"], 2);
        assert_eq!(body["truncated"], false);
        let history = body["history"].as_array().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0]["total_requests"], 2);

        let (_, body) = send(&app, get("/admin/ai/cost/history")).await;
        assert_eq!(body["period"]["type"], "daily");

        let (status, _) = send(&app, get("/admin/ai/cost/history?period=yearly")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = send(
            &app,
            get("/admin/ai/cost/history?start=2026-02-01T00:00:00Z&end=2026-01-01T00:00:00Z"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_feature_listing_endpoints() {
        let app = test_app();
        let (status, _) = send(
            &app,
            post_json(
                "/admin/ai/features/toggle",
                &json!({"feature": "tagger", "enabled": false, "description": "auto tagging"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&app, get("/admin/ai/features")).await;
        assert_eq!(status, StatusCode::OK);
        let features = body["features"].as_array().unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0]["feature"], "tagger");
        assert_eq!(features[0]["enabled"], false);
        assert_eq!(features[0]["description"], "auto tagging");
        assert_eq!(features[0]["updated_by"], "ops");

        let (status, flag) = send(&app, get("/admin/ai/features/tagger")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(flag["description"], "auto tagging");

        let (status, body) = send(&app, get("/admin/ai/features/unknown")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }

    #[tokio::test]
    async fn test_stream_endpoint_sends_events_then_done() {
        let app = test_app();
        let response = create_router(app.state.clone())
            .oneshot(post_json("/v1/invoke/stream", &invoke_body("tagger")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream"));

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        let data: Vec<&str> = text
            .lines()
            .filter_map(|line| line.strip_prefix("data:").map(str::trim_start))
            .collect();
        assert_eq!(data.len(), 4);
        let first: Value = serde_json::from_str(data[0]).unwrap();
        assert_eq!(first, json!({"type": "delta", "text": "echo: "}));
        let done: Value = serde_json::from_str(data[2]).unwrap();
        assert_eq!(done["type"], "done");
        assert_eq!(done["provider"], "openai");
        assert_eq!(done["input_tokens"], 100);
        assert_eq!(data[3], "[DONE]");

        app.state.gateway.recorder().flush().await;
        let records = app.sink.records();
        assert_eq!(records.len(), 1);
        assert!(records[0].success);
    }

    #[tokio::test]
    async fn test_stream_endpoint_blocked_returns_json_error() {
        let app = test_app();
        send(
            &app,
            post_json("/admin/ai/kill-switch", &json!({"reason": "incident"})),
        )
        .await;
        let (status, body) =
            send(&app, post_json("/v1/invoke/stream", &invoke_body("tagger"))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "feature_unavailable");
    }

    #[tokio::test]
    async fn test_catalog_and_providers() {
        let app = test_app();
        let (status, catalog) = send(&app, get("/admin/ai/models")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(!catalog["models"].as_array().unwrap().is_empty());
        assert_eq!(catalog["purposes"].as_array().unwrap().len(), 6);

        let (status, providers) = send(&app, get("/admin/ai/providers")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(providers, json!([{"provider": "openai", "healthy": true}]));
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let app = test_app();
        send(&app, post_json("/v1/invoke", &invoke_body("tagger"))).await;
        app.state.gateway.recorder().flush().await;

        let response = create_router(app.state.clone())
            .oneshot(get("/metrics"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("ai_gateway_invocations_total"));
    }

    #[tokio::test]
    async fn test_request_id_is_echoed() {
        let app = test_app();
        let request = Request::builder()
            .uri("/health")
            .header("x-request-id", "req-7")
            .body(Body::empty())
            .unwrap();
        let response = create_router(app.state.clone()).oneshot(request).await.unwrap();
        assert_eq!(response.headers()["x-request-id"], "req-7");
    }
}
