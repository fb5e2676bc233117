//! HTTP request handlers for the gateway API.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use chrono::{DateTime, Duration, Utc};
use futures::stream::StreamExt;
use gateway_core::{
    FeatureFlag, KillSwitchStatus, OverrideEntry, OverridePolicy, ProviderKind, Tier, UsageQuery,
    UsageRecord,
};
use gateway_engine::{Invocation, InvocationRequest};
use gateway_routing::{ModelDescriptor, PurposeProfile};
use gateway_telemetry::{cost_history, CostBucket, CostPeriod, UsageSummary};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::{
    error::ApiError,
    extractors::{AdminUser, JsonBody, RequestId},
    health::{assess, HealthResponse, ProviderHealth},
    state::AppState,
};

/// Rows returned by `GET /admin/ai/usage` without an explicit limit
pub const DEFAULT_USAGE_PAGE: usize = 100;

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Response {
    let providers = state.gateway.providers().len();
    let kill_switch_enabled = state.admin.policy().kill_switch_enabled;
    let status = assess(providers, kill_switch_enabled);
    let body = HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
        providers,
        kill_switch_enabled,
    };
    (status.http_status(), Json(body)).into_response()
}

/// Prometheus metrics endpoint
pub async fn metrics_endpoint(State(state): State<AppState>) -> Result<Response, ApiError> {
    let body = state
        .metrics
        .render()
        .map_err(|e| ApiError::internal(format!("Failed to render metrics: {e}")))?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response())
}

/// Run one invocation through the gateway
#[instrument(skip(state, request), fields(request_id = %request_id.0, feature = %request.feature, purpose = %request.purpose))]
pub async fn invoke(
    State(state): State<AppState>,
    request_id: RequestId,
    JsonBody(request): JsonBody<InvocationRequest>,
) -> Result<Json<Invocation>, ApiError> {
    if request.feature.trim().is_empty() {
        return Err(ApiError::bad_request("feature is required"));
    }
    let invocation = state.gateway.invoke(request).await?;
    debug!(
        provider = %invocation.provider,
        model = %invocation.model,
        cost = invocation.estimated_cost,
        "Invocation served"
    );
    Ok(Json(invocation))
}

/// Stream one text invocation as server-sent events.
///
/// Each event carries a JSON chunk; a failure mid-stream is sent as an
/// `error` event. The stream always ends with `[DONE]`.
#[instrument(skip(state, request), fields(request_id = %request_id.0, feature = %request.feature, purpose = %request.purpose))]
pub async fn invoke_stream(
    State(state): State<AppState>,
    request_id: RequestId,
    JsonBody(request): JsonBody<InvocationRequest>,
) -> Result<Response, ApiError> {
    if request.feature.trim().is_empty() {
        return Err(ApiError::bad_request("feature is required"));
    }
    let chunks = state.gateway.generate_stream(request).await?;

    let events = chunks.map(|chunk| {
        let event = match chunk {
            Ok(chunk) => Event::default().data(serde_json::to_string(&chunk).unwrap_or_default()),
            Err(err) => {
                let err = ApiError::from(err);
                let body = serde_json::json!({"error": err.code(), "message": err.to_string()});
                Event::default().event("error").data(body.to_string())
            }
        };
        Ok::<_, Infallible>(event)
    });
    let done =
        futures::stream::once(async { Ok::<_, Infallible>(Event::default().data("[DONE]")) });

    Ok(Sse::new(events.chain(done))
        .keep_alive(KeepAlive::default())
        .into_response())
}

/// Current in-memory policy snapshot
pub async fn get_policy(State(state): State<AppState>) -> Json<OverridePolicy> {
    Json(policy_body(&state.admin.policy()))
}

/// Rebuild the policy from the store
#[instrument(skip(state))]
pub async fn reload_policy(
    State(state): State<AppState>,
    AdminUser(actor): AdminUser,
) -> Result<Json<OverridePolicy>, ApiError> {
    let policy = state.admin.reload().await?;
    info!(actor = %actor, "Policy reloaded on request");
    Ok(Json(policy_body(&policy)))
}

/// Kill switch row with audit fields
pub async fn get_kill_switch(
    State(state): State<AppState>,
) -> Result<Json<KillSwitchStatus>, ApiError> {
    Ok(Json(state.admin.kill_switch_status().await?))
}

/// `POST /admin/ai/kill-switch` body
#[derive(Debug, Deserialize)]
pub struct KillSwitchRequest {
    /// Why traffic is being stopped
    pub reason: String,
}

/// Block all AI traffic
#[instrument(skip(state, body))]
pub async fn activate_kill_switch(
    State(state): State<AppState>,
    AdminUser(actor): AdminUser,
    JsonBody(body): JsonBody<KillSwitchRequest>,
) -> Result<Json<KillSwitchStatus>, ApiError> {
    state.admin.activate_kill_switch(body.reason, actor).await?;
    Ok(Json(state.admin.kill_switch_status().await?))
}

/// Resume AI traffic
#[instrument(skip(state))]
pub async fn deactivate_kill_switch(
    State(state): State<AppState>,
    AdminUser(actor): AdminUser,
) -> Result<Json<KillSwitchStatus>, ApiError> {
    state.admin.deactivate_kill_switch(actor).await?;
    Ok(Json(state.admin.kill_switch_status().await?))
}

/// `POST /admin/ai/features/toggle` body
#[derive(Debug, Deserialize)]
pub struct FeatureToggleRequest {
    /// Feature name
    pub feature: String,
    /// New state
    pub enabled: bool,
    /// Replacement description; omitted keeps the stored one
    #[serde(default)]
    pub description: Option<String>,
}

/// Enable or disable one feature
#[instrument(skip(state, body), fields(feature = %body.feature, enabled = body.enabled))]
pub async fn toggle_feature(
    State(state): State<AppState>,
    AdminUser(actor): AdminUser,
    JsonBody(body): JsonBody<FeatureToggleRequest>,
) -> Result<Json<OverridePolicy>, ApiError> {
    let policy = state
        .admin
        .set_feature(body.feature, body.enabled, body.description, actor)
        .await?;
    Ok(Json(policy_body(&policy)))
}

/// `GET /admin/ai/features` body
#[derive(Debug, Serialize)]
pub struct FeaturesResponse {
    /// Every feature flag row, ordered by name
    pub features: Vec<FeatureFlag>,
}

/// Feature flag rows
pub async fn list_features(
    State(state): State<AppState>,
) -> Result<Json<FeaturesResponse>, ApiError> {
    Ok(Json(FeaturesResponse {
        features: state.admin.list_features().await?,
    }))
}

/// One feature flag row
pub async fn get_feature(
    State(state): State<AppState>,
    Path(feature): Path<String>,
) -> Result<Json<FeatureFlag>, ApiError> {
    state
        .admin
        .feature(&feature)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("no flag recorded for feature {feature}")))
}

/// `POST /admin/ai/overrides/model` body
#[derive(Debug, Deserialize)]
pub struct ModelOverrideRequest {
    /// Tier to pin
    pub tier: Tier,
    /// Model id served for the tier
    pub model: String,
}

/// Pin a tier to a model
#[instrument(skip(state, body), fields(tier = %body.tier, model = %body.model))]
pub async fn set_model_override(
    State(state): State<AppState>,
    AdminUser(actor): AdminUser,
    JsonBody(body): JsonBody<ModelOverrideRequest>,
) -> Result<Json<OverridePolicy>, ApiError> {
    let policy = state
        .admin
        .set_model_override(body.tier, body.model, actor)
        .await?;
    Ok(Json(policy_body(&policy)))
}

/// `POST /admin/ai/overrides/tier` body
#[derive(Debug, Deserialize)]
pub struct TierOverrideRequest {
    /// Feature to pin
    pub feature: String,
    /// Tier the feature runs at
    pub tier: Tier,
}

/// Pin a feature to a tier
#[instrument(skip(state, body), fields(feature = %body.feature, tier = %body.tier))]
pub async fn set_tier_override(
    State(state): State<AppState>,
    AdminUser(actor): AdminUser,
    JsonBody(body): JsonBody<TierOverrideRequest>,
) -> Result<Json<OverridePolicy>, ApiError> {
    let policy = state
        .admin
        .set_tier_override(body.feature, body.tier, actor)
        .await?;
    Ok(Json(policy_body(&policy)))
}

/// `POST /admin/ai/overrides/routing` body
#[derive(Debug, Deserialize)]
pub struct RoutingOverrideRequest {
    /// Provider preference, most preferred first; empty restores the default
    #[serde(default)]
    pub order: Vec<ProviderKind>,
}

/// Replace the provider routing order
#[instrument(skip(state, body))]
pub async fn set_routing_override(
    State(state): State<AppState>,
    AdminUser(actor): AdminUser,
    JsonBody(body): JsonBody<RoutingOverrideRequest>,
) -> Result<Json<OverridePolicy>, ApiError> {
    let policy = state.admin.set_routing_override(&body.order, actor).await?;
    Ok(Json(policy_body(&policy)))
}

/// Enabled override rows, newest first
pub async fn list_overrides(
    State(state): State<AppState>,
) -> Result<Json<Vec<OverrideEntry>>, ApiError> {
    Ok(Json(state.admin.list_overrides().await?))
}

/// Disable one override row
#[instrument(skip(state))]
pub async fn remove_override(
    State(state): State<AppState>,
    AdminUser(actor): AdminUser,
    Path(id): Path<String>,
) -> Result<Json<OverridePolicy>, ApiError> {
    let policy = state.admin.remove_override(&id).await?;
    info!(actor = %actor, id = %id, "Override removed on request");
    Ok(Json(policy_body(&policy)))
}

/// `GET /admin/ai/models` body
#[derive(Debug, Serialize)]
pub struct CatalogResponse {
    /// Every model offering
    pub models: Vec<ModelDescriptor>,
    /// Purpose defaults
    pub purposes: Vec<PurposeProfile>,
}

/// Static model catalog
pub async fn list_models(State(state): State<AppState>) -> Json<CatalogResponse> {
    let catalog = state.gateway.resolver().catalog();
    let mut purposes: Vec<_> = catalog.profiles().copied().collect();
    purposes.sort_by_key(|p| p.purpose.as_str());
    Json(CatalogResponse {
        models: catalog.descriptors().to_vec(),
        purposes,
    })
}

/// Probe every registered provider
#[instrument(skip(state))]
pub async fn list_providers(State(state): State<AppState>) -> Json<Vec<ProviderHealth>> {
    let report = state
        .gateway
        .providers()
        .health()
        .await
        .into_iter()
        .map(|(provider, healthy)| ProviderHealth { provider, healthy })
        .collect();
    Json(report)
}

/// Stored usage records, newest first
pub async fn query_usage(
    State(state): State<AppState>,
    Query(mut query): Query<UsageQuery>,
) -> Result<Json<Vec<UsageRecord>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_USAGE_PAGE);
    query.limit = Some(limit.min(state.summary_limit));
    Ok(Json(state.usage.query_usage(&query).await?))
}

/// `GET /admin/ai/logs` body
#[derive(Debug, Serialize)]
pub struct ErrorLogResponse {
    /// Failed invocations, newest first
    pub errors: Vec<UsageRecord>,
    /// Rows returned
    pub count: usize,
}

/// Failed invocations, newest first
pub async fn error_logs(
    State(state): State<AppState>,
    Query(query): Query<UsageQuery>,
) -> Result<Json<ErrorLogResponse>, ApiError> {
    let mut query = query.failures();
    let limit = query.limit.unwrap_or(DEFAULT_USAGE_PAGE);
    query.limit = Some(limit.min(state.summary_limit));
    let errors = state.usage.query_usage(&query).await?;
    Ok(Json(ErrorLogResponse {
        count: errors.len(),
        errors,
    }))
}

/// `GET /admin/ai/usage/summary` body
#[derive(Debug, Serialize)]
pub struct UsageSummaryResponse {
    /// Totals over the summarized rows
    #[serde(flatten)]
    pub summary: UsageSummary,
    /// Whether more rows matched than the summary row cap
    pub truncated: bool,
}

/// Summary over stored usage records
pub async fn usage_summary(
    State(state): State<AppState>,
    Query(query): Query<UsageQuery>,
) -> Result<Json<UsageSummaryResponse>, ApiError> {
    let (records, truncated) = bounded_records(&state, query).await?;
    Ok(Json(UsageSummaryResponse {
        summary: UsageSummary::from_records(&records),
        truncated,
    }))
}

/// `GET /admin/ai/cost/history` query
#[derive(Debug, Default, Deserialize)]
pub struct CostHistoryQuery {
    /// Bucket width, daily by default
    #[serde(default)]
    pub period: CostPeriod,
    /// Inclusive lower bound; 30 days before `end` by default
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    /// Inclusive upper bound; now by default
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
}

/// Window a cost history covers
#[derive(Debug, Serialize)]
pub struct CostWindow {
    /// Bucket width
    #[serde(rename = "type")]
    pub period: CostPeriod,
    /// Inclusive lower bound
    pub start: DateTime<Utc>,
    /// Inclusive upper bound
    pub end: DateTime<Utc>,
}

/// `GET /admin/ai/cost/history` body
#[derive(Debug, Serialize)]
pub struct CostHistoryResponse {
    /// Totals over the window
    pub summary: UsageSummary,
    /// Per-period spend, oldest first
    pub history: Vec<CostBucket>,
    /// Window and bucket width
    pub period: CostWindow,
    /// Whether more rows matched than the summary row cap
    pub truncated: bool,
}

/// Spend bucketed by period over a window
pub async fn cost_history_report(
    State(state): State<AppState>,
    Query(params): Query<CostHistoryQuery>,
) -> Result<Json<CostHistoryResponse>, ApiError> {
    let end = params.end.unwrap_or_else(Utc::now);
    let start = params.start.unwrap_or(end - Duration::days(30));
    if start > end {
        return Err(ApiError::bad_request("start must not be after end"));
    }

    let query = UsageQuery {
        start: Some(start),
        end: Some(end),
        ..UsageQuery::default()
    };
    let (records, truncated) = bounded_records(&state, query).await?;
    Ok(Json(CostHistoryResponse {
        summary: UsageSummary::from_records(&records),
        history: cost_history(&records, params.period),
        period: CostWindow {
            period: params.period,
            start,
            end,
        },
        truncated,
    }))
}

/// Newest rows up to the summary cap, and whether more matched
async fn bounded_records(
    state: &AppState,
    mut query: UsageQuery,
) -> Result<(Vec<UsageRecord>, bool), ApiError> {
    query.limit = Some(state.summary_limit.saturating_add(1));
    let mut records = state.usage.query_usage(&query).await?;
    let truncated = records.len() > state.summary_limit;
    if truncated {
        records.truncate(state.summary_limit);
        warn!(limit = state.summary_limit, "Usage rows beyond the summary cap were left out");
    }
    Ok((records, truncated))
}

/// Live totals since start
pub async fn cost_summary(State(state): State<AppState>) -> Json<UsageSummary> {
    Json(state.ledger.summary())
}

fn policy_body(policy: &Arc<OverridePolicy>) -> OverridePolicy {
    OverridePolicy::clone(policy)
}
