//! Test fixtures and sample data for integration tests

use gateway_engine::{InvocationRequest, Payload};
use gateway_core::Purpose;
use serde_json::{json, Value};

/// Catalog CHEAP model served by OpenAI
pub const OPENAI_CHEAP_MODEL: &str = "gpt-4o-mini";

/// Tagging request for a feature
pub fn tagging_request(feature: &str) -> InvocationRequest {
    InvocationRequest::new(feature, Purpose::Tagging, Payload::text("Tag this note about gardening"))
        .with_user("user-1")
}

/// Classification request for a feature
pub fn classification_request(feature: &str) -> InvocationRequest {
    InvocationRequest::new(
        feature,
        Purpose::Classification,
        Payload::text("Is this note about work or home?"),
    )
}

/// `POST /v1/invoke` body
pub fn invoke_body(feature: &str, purpose: &str) -> Value {
    json!({
        "feature": feature,
        "purpose": purpose,
        "payload": {"prompt": "Summarize my week"},
        "user_id": "user-1"
    })
}

/// `POST /v1/invoke` body asking for a JSON object
pub fn object_invoke_body(feature: &str) -> Value {
    json!({
        "feature": feature,
        "purpose": "insight_generation",
        "payload": {
            "prompt": "Extract insights",
            "format": {"type": "object", "schema": {"type": "object"}}
        }
    })
}

/// Insight object returned by mock providers
pub fn sample_insight() -> Value {
    json!({"insights": ["sleep more", "walk daily"], "confidence": 0.8})
}
