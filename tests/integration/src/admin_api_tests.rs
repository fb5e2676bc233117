//! Admin API integration tests
//!
//! Every admin write goes through the SQLite policy store before the live
//! policy changes, so these tests check both the HTTP responses and the
//! behavior of subsequent invocations.

use crate::fixtures::*;
use crate::helpers::*;
use crate::mock_providers::*;
use gateway_core::{PolicyStore, PolicyWrite, ProviderKind, Tier};
use pretty_assertions::assert_eq;
use serde_json::json;

async fn setup() -> (MockProvider, TestGateway, TestServer) {
    init_tracing();
    let openai = MockProvider::start().await;
    let gateway = TestGateway::new(
        &[(ProviderKind::OpenAi, openai.url())],
        TestResilience::default(),
    )
    .await;
    let server = TestServer::start(gateway.state.clone()).await;
    (openai, gateway, server)
}

#[tokio::test]
async fn test_kill_switch_lifecycle_over_http() {
    let (openai, h, server) = setup().await;
    openai.mock_text("ok", 10, 5).await;

    let response = server
        .admin_post("/admin/ai/kill-switch", &json!({"reason": "provider outage"}), "alice")
        .await;
    assert_status(&response, 200);
    let status = TestServer::json_body(response).await;
    assert_eq!(status["enabled"], true);
    assert_eq!(status["reason"], "provider outage");
    assert_eq!(status["activated_by"], "alice");
    assert!(status["activated_at"].is_string());

    let response = server.post_json("/v1/invoke", &invoke_body("tagger", "tagging")).await;
    assert_status(&response, 503);
    let body = TestServer::json_body(response).await;
    assert_eq!(body["error"], "feature_unavailable");

    let health = TestServer::json_body(server.get("/health").await).await;
    assert_eq!(health["status"], "degraded");
    assert_eq!(health["kill_switch_enabled"], true);

    let response = server.admin_delete("/admin/ai/kill-switch", "bob").await;
    assert_status(&response, 200);
    let status = TestServer::json_body(response).await;
    assert_eq!(status["enabled"], false);
    assert!(status["reason"].is_null());

    let response = server.post_json("/v1/invoke", &invoke_body("tagger", "tagging")).await;
    assert_status(&response, 200);
    assert_eq!(openai.generate_calls().await, 1);

    let kill_switch = h.admin.kill_switch_status().await.unwrap();
    assert!(!kill_switch.enabled);
}

#[tokio::test]
async fn test_kill_switch_requires_reason() {
    let (_openai, h, server) = setup().await;

    let response = server
        .admin_post("/admin/ai/kill-switch", &json!({"reason": "  "}), "alice")
        .await;
    assert_status(&response, 400);
    assert!(!h.admin.policy().kill_switch_enabled);
}

#[tokio::test]
async fn test_feature_toggle_blocks_only_that_feature() {
    let (openai, _h, server) = setup().await;
    openai.mock_text("ok", 10, 5).await;

    let response = server
        .admin_post(
            "/admin/ai/features/toggle",
            &json!({"feature": "tagger", "enabled": false}),
            "alice",
        )
        .await;
    assert_status(&response, 200);
    let policy = TestServer::json_body(response).await;
    assert_eq!(policy["disabled_features"], json!(["tagger"]));

    let response = server.post_json("/v1/invoke", &invoke_body("tagger", "tagging")).await;
    assert_status(&response, 503);
    let response = server.post_json("/v1/invoke", &invoke_body("classifier", "classification")).await;
    assert_status(&response, 200);

    let response = server
        .admin_post(
            "/admin/ai/features/toggle",
            &json!({"feature": "tagger", "enabled": true}),
            "alice",
        )
        .await;
    assert_status(&response, 200);
    let response = server.post_json("/v1/invoke", &invoke_body("tagger", "tagging")).await;
    assert_status(&response, 200);
}

#[tokio::test]
async fn test_feature_flags_listed_with_descriptions() {
    let (_openai, _h, server) = setup().await;

    let response = server
        .admin_post(
            "/admin/ai/features/toggle",
            &json!({"feature": "tagger", "enabled": false, "description": "auto tagging"}),
            "alice",
        )
        .await;
    assert_status(&response, 200);
    let response = server
        .admin_post(
            "/admin/ai/features/toggle",
            &json!({"feature": "tagger", "enabled": true}),
            "bob",
        )
        .await;
    assert_status(&response, 200);

    let body = TestServer::json_body(server.get("/admin/ai/features").await).await;
    let features = body["features"].as_array().unwrap();
    assert_eq!(features.len(), 1);
    assert_eq!(features[0]["enabled"], true);
    assert_eq!(features[0]["description"], "auto tagging");
    assert_eq!(features[0]["updated_by"], "bob");

    let response = server.get("/admin/ai/features/tagger").await;
    assert_status(&response, 200);
    let response = server.get("/admin/ai/features/digest").await;
    assert_status(&response, 404);
}

#[tokio::test]
async fn test_model_override_pins_model_until_removed() {
    let (openai, _h, server) = setup().await;
    openai.mock_text("ok", 1000, 1000).await;

    let response = server
        .admin_post(
            "/admin/ai/overrides/model",
            &json!({"tier": "CHEAP", "model": "gpt-4.1-nano"}),
            "alice",
        )
        .await;
    assert_status(&response, 200);

    let body = TestServer::json_body(
        server.post_json("/v1/invoke", &invoke_body("tagger", "tagging")).await,
    )
    .await;
    assert_eq!(body["model"], "gpt-4.1-nano");
    assert_eq!(body["model_overridden"], true);
    assert_eq!(body["estimated_cost"], 0.0);
    assert_eq!(openai.generate_bodies().await[0]["model"], "gpt-4.1-nano");

    let overrides = TestServer::json_body(server.get("/admin/ai/overrides").await).await;
    let rows = overrides.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["kind"], "model");
    assert_eq!(rows[0]["value"], "gpt-4.1-nano");
    assert_eq!(rows[0]["created_by"], "alice");
    let id = rows[0]["id"].as_str().unwrap().to_string();

    let response = server.admin_delete(&format!("/admin/ai/overrides/{id}"), "alice").await;
    assert_status(&response, 200);
    let policy = TestServer::json_body(response).await;
    assert_eq!(policy["model_override_by_tier"], json!({}));

    let body = TestServer::json_body(
        server.post_json("/v1/invoke", &invoke_body("tagger", "tagging")).await,
    )
    .await;
    assert_eq!(body["model"], OPENAI_CHEAP_MODEL);
    assert_eq!(body["model_overridden"], false);

    let response = server.admin_delete("/admin/ai/overrides/no-such-id", "alice").await;
    assert_status(&response, 400);
}

#[tokio::test]
async fn test_tier_override_beats_request_hint() {
    let (openai, _h, server) = setup().await;
    openai.mock_text("ok", 10, 5).await;

    let response = server
        .admin_post(
            "/admin/ai/overrides/tier",
            &json!({"feature": "tagger", "tier": "EXPENSIVE"}),
            "alice",
        )
        .await;
    assert_status(&response, 200);

    let mut request = invoke_body("tagger", "tagging");
    request["tier_hint"] = json!("CHEAP");
    let body = TestServer::json_body(server.post_json("/v1/invoke", &request).await).await;
    assert_eq!(body["tier"], "EXPENSIVE");
    assert_eq!(body["model"], "gpt-4-turbo");
}

#[tokio::test]
async fn test_routing_override_validation() {
    let (_openai, h, server) = setup().await;

    let response = server
        .admin_post(
            "/admin/ai/overrides/routing",
            &json!({"order": ["anthropic", "anthropic"]}),
            "alice",
        )
        .await;
    assert_status(&response, 400);
    assert!(h.admin.policy().provider_routing_order.is_empty());

    let response = server
        .admin_post(
            "/admin/ai/overrides/routing",
            &json!({"order": ["anthropic", "openai"]}),
            "alice",
        )
        .await;
    assert_status(&response, 200);
    let policy = TestServer::json_body(response).await;
    assert_eq!(policy["provider_routing_order"], json!(["anthropic", "openai"]));

    let response = server
        .admin_post("/admin/ai/overrides/routing", &json!({"order": []}), "alice")
        .await;
    assert_status(&response, 200);
    assert!(h.admin.policy().provider_routing_order.is_empty());
}

#[tokio::test]
async fn test_reload_picks_up_out_of_band_writes() {
    let (openai, h, server) = setup().await;
    openai.mock_text("ok", 10, 5).await;

    h.policy_store
        .write_policy_field(PolicyWrite::model(Tier::Cheap, "gpt-4.1-nano", "migration"))
        .await
        .unwrap();

    let policy = TestServer::json_body(server.get("/admin/ai/policy").await).await;
    assert_eq!(policy["model_override_by_tier"], json!({}));

    let response = server.admin_post("/admin/ai/policy/reload", &json!({}), "alice").await;
    assert_status(&response, 200);
    let policy = TestServer::json_body(response).await;
    assert_eq!(policy["model_override_by_tier"], json!({"CHEAP": "gpt-4.1-nano"}));

    let body = TestServer::json_body(
        server.post_json("/v1/invoke", &invoke_body("tagger", "tagging")).await,
    )
    .await;
    assert_eq!(body["model"], "gpt-4.1-nano");
}

#[tokio::test]
async fn test_policy_survives_restart() {
    let (_openai, h, _server) = setup().await;
    h.admin.toggle_feature("tagger", false, "alice").await.unwrap();
    h.admin
        .set_tier_override("digest", Tier::Medium, "alice")
        .await
        .unwrap();

    // A second admin over the same store sees the same policy after boot
    let fresh = gateway_engine::PolicyAdmin::new(
        std::sync::Arc::clone(&h.policy_store),
        std::sync::Arc::new(gateway_routing::OverrideResolver::new(
            std::sync::Arc::new(gateway_routing::ModelCatalog::standard()),
            [ProviderKind::OpenAi],
        )),
    );
    assert!(fresh.load_at_boot().await);
    let policy = fresh.policy();
    assert!(policy.is_feature_disabled("tagger"));
    assert_eq!(policy.tier_override_by_feature.get("digest"), Some(&Tier::Medium));
}

#[tokio::test]
async fn test_catalog_and_models_endpoint() {
    let (_openai, _h, server) = setup().await;

    let response = server.get("/admin/ai/models").await;
    assert_status(&response, 200);
    let catalog = TestServer::json_body(response).await;
    let models = catalog["models"].as_array().unwrap();
    assert!(models.iter().any(|m| m["model_id"] == OPENAI_CHEAP_MODEL));
    assert_eq!(catalog["purposes"].as_array().unwrap().len(), 6);
}

#[tokio::test]
async fn test_metrics_count_invocations() {
    let (openai, _h, server) = setup().await;
    openai.mock_text("ok", 10, 5).await;

    let response = server.post_json("/v1/invoke", &invoke_body("tagger", "tagging")).await;
    assert_status(&response, 200);

    let response = server.get("/metrics").await;
    assert_status(&response, 200);
    let text = response.text().await.unwrap();
    assert!(text.contains("gateway_"));
}
