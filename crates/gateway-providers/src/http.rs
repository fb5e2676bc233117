//! HTTP provider client.
//!
//! Speaks the gateway's uniform JSON shape to a provider sidecar:
//! - `POST {base_url}/v1/generate` with a [`GenerateRequest`] body
//! - `POST {base_url}/v1/generate/stream` with the same body, answered as
//!   server-sent events carrying [`StreamEvent`] JSON and a final `[DONE]`
//! - `GET {base_url}/health` for liveness
//!
//! The sidecar owns the vendor wire format. This client owns authentication,
//! the transport timeout, and the mapping of HTTP failures onto
//! [`GatewayError`].

use async_stream::try_stream;
use async_trait::async_trait;
use futures::StreamExt;
use gateway_core::{
    GatewayError, GenerateOutput, GenerateRequest, ModelProvider, ProviderKind, ProviderStream,
    StreamEvent,
};
use reqwest::{header, Client, StatusCode};
use reqwest_eventsource::{retry, Event, EventSource};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, trace, warn};

/// Timeout applied by the transport when none is configured
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP provider configuration
#[derive(Debug, Clone)]
pub struct HttpProviderConfig {
    /// Provider served by this endpoint
    pub kind: ProviderKind,
    /// Base URL of the sidecar, without trailing slash
    pub base_url: String,
    /// Bearer token
    pub api_key: Option<SecretString>,
    /// Transport timeout
    pub timeout: Duration,
}

impl HttpProviderConfig {
    /// Create a configuration without credentials
    #[must_use]
    pub fn new(kind: ProviderKind, base_url: impl Into<String>) -> Self {
        Self {
            kind,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    /// Set the API key
    #[must_use]
    pub fn with_api_key(mut self, api_key: SecretString) -> Self {
        self.api_key = Some(api_key);
        self
    }

    /// Set the transport timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Provider client over HTTP
#[derive(Debug, Clone)]
pub struct HttpProvider {
    config: HttpProviderConfig,
    client: Client,
}

impl HttpProvider {
    /// Create a new HTTP provider
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(config: HttpProviderConfig) -> Result<Self, GatewayError> {
        if config.base_url.is_empty() {
            return Err(GatewayError::configuration(format!(
                "provider {} has no base URL",
                config.kind
            )));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(32)
            .build()
            .map_err(|e| GatewayError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    /// Configuration in use
    #[must_use]
    pub fn config(&self) -> &HttpProviderConfig {
        &self.config
    }

    fn generate_url(&self) -> String {
        format!("{}/v1/generate", self.config.base_url)
    }

    fn stream_url(&self) -> String {
        format!("{}/v1/generate/stream", self.config.base_url)
    }

    fn health_url(&self) -> String {
        format!("{}/health", self.config.base_url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.bearer_auth(key.expose_secret()),
            None => request,
        }
    }

    fn map_transport_error(&self, error: &reqwest::Error) -> GatewayError {
        if error.is_timeout() {
            return GatewayError::timeout(self.config.timeout);
        }
        GatewayError::provider(
            self.config.kind,
            format!("Request failed: {error}"),
            None,
            true,
        )
    }

    fn map_status(&self, status: StatusCode, retry_after: Option<Duration>, body: &str) -> GatewayError {
        if status == StatusCode::TOO_MANY_REQUESTS {
            return GatewayError::rate_limited(self.config.kind, retry_after);
        }

        let message = serde_json::from_str::<ErrorBody>(body)
            .map(|parsed| parsed.error.message)
            .unwrap_or_else(|_| format!("HTTP {status}: {body}"));

        GatewayError::provider(
            self.config.kind,
            message,
            Some(status.as_u16()),
            status.is_server_error(),
        )
    }

    async fn map_open_error(&self, error: reqwest_eventsource::Error) -> GatewayError {
        match error {
            reqwest_eventsource::Error::InvalidStatusCode(status, response) => {
                let hint = retry_after(response.headers());
                let body = response.text().await.unwrap_or_default();
                warn!(
                    provider = %self.config.kind,
                    status = %status,
                    "Provider refused the stream"
                );
                self.map_status(status, hint, &body)
            }
            reqwest_eventsource::Error::Transport(e) => self.map_transport_error(&e),
            other => GatewayError::provider(
                self.config.kind,
                format!("Failed to open stream: {other}"),
                None,
                false,
            ),
        }
    }
}

fn retry_after(headers: &header::HeaderMap) -> Option<Duration> {
    headers
        .get(header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[async_trait]
impl ModelProvider for HttpProvider {
    fn kind(&self) -> ProviderKind {
        self.config.kind
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateOutput, GatewayError> {
        debug!(
            provider = %self.config.kind,
            model = %request.model,
            max_tokens = request.max_tokens,
            "Sending generate request"
        );

        let response = self
            .authorize(self.client.post(self.generate_url()))
            .header(header::CONTENT_TYPE, "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let hint = retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            warn!(
                provider = %self.config.kind,
                status = %status,
                "Provider returned an error status"
            );
            return Err(self.map_status(status, hint, &body));
        }

        let output: GenerateOutput = response.json().await.map_err(|e| {
            GatewayError::provider(
                self.config.kind,
                format!("Failed to parse response: {e}"),
                None,
                false,
            )
        })?;

        if !output.content.matches(&request.format) {
            return Err(GatewayError::provider(
                self.config.kind,
                "Response content does not match the requested format",
                None,
                false,
            ));
        }

        Ok(output)
    }

    async fn generate_stream(
        &self,
        request: GenerateRequest,
    ) -> Result<ProviderStream, GatewayError> {
        debug!(
            provider = %self.config.kind,
            model = %request.model,
            max_tokens = request.max_tokens,
            "Opening generate stream"
        );

        let request_builder = self
            .authorize(self.client.post(self.stream_url()))
            .header(header::CONTENT_TYPE, "application/json")
            .json(&request);

        let mut event_source = EventSource::new(request_builder).map_err(|e| {
            GatewayError::internal(format!("Failed to create event source: {e}"))
        })?;
        event_source.set_retry_policy(Box::new(retry::Never));

        // Status failures surface here so the caller can retry the open
        match event_source.next().await {
            Some(Ok(Event::Open)) => trace!(provider = %self.config.kind, "Provider stream opened"),
            Some(Ok(Event::Message(_))) | None => {
                return Err(GatewayError::provider(
                    self.config.kind,
                    "Provider stream did not open",
                    None,
                    true,
                ));
            }
            Some(Err(e)) => return Err(self.map_open_error(e).await),
        }

        let kind = self.config.kind;
        let stream = try_stream! {
            let mut es = event_source;

            while let Some(event) = es.next().await {
                match event {
                    Ok(Event::Open) => {}
                    Ok(Event::Message(msg)) => {
                        let data = msg.data.trim();
                        if data == "[DONE]" {
                            break;
                        }

                        match serde_json::from_str::<StreamEvent>(data) {
                            Ok(event) => {
                                let done = matches!(event, StreamEvent::Done { .. });
                                yield event;
                                if done {
                                    break;
                                }
                            }
                            Err(e) => {
                                warn!(provider = %kind, error = %e, data = %data, "Skipping unreadable stream event");
                            }
                        }
                    }
                    Err(reqwest_eventsource::Error::StreamEnded) => break,
                    Err(e) => {
                        error!(provider = %kind, error = %e, "Provider stream error");
                        Err(GatewayError::provider(kind, format!("Stream error: {e}"), None, true))?;
                    }
                }
            }
            es.close();
        };

        Ok(Box::pin(stream))
    }

    async fn health_check(&self) -> bool {
        match self
            .authorize(self.client.get(self.health_url()))
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                warn!(provider = %self.config.kind, status = %resp.status(), "Provider health check failed");
                false
            }
            Err(e) => {
                warn!(provider = %self.config.kind, error = %e, "Provider health check error");
                false
            }
        }
    }
}
