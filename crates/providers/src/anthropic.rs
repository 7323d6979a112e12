//! Anthropic Messages API provider.
//!
//! Features:
//! - `x-api-key` header authentication (first-party API, Bedrock proxies)
//! - Bearer authentication + `rawPredict` URLs for Vertex AI
//! - `anthropic-beta` header carrying the computer-use flag
//! - System prompt as top-level field
//! - The conversation is already in wire shape and is sent as-is

use async_trait::async_trait;
use deskpilot_core::error::ProviderError;
use deskpilot_core::provider::{ProviderRequest, RawResponse};
use tracing::{debug, warn};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const VERTEX_ANTHROPIC_VERSION: &str = "vertex-2023-10-16";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

/// How requests are addressed and authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Endpoint {
    /// `{base_url}/v1/messages` with `x-api-key`
    Messages { base_url: String, api_key: String },
    /// Vertex AI `rawPredict` with a Bearer access token
    Vertex {
        project: String,
        region: String,
        access_token: String,
    },
}

/// Anthropic Messages API provider.
pub struct AnthropicProvider {
    name: String,
    endpoint: Endpoint,
    client: reqwest::Client,
}

impl AnthropicProvider {
    /// Create a provider for the first-party API.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            name: "anthropic".into(),
            endpoint: Endpoint::Messages {
                base_url: DEFAULT_BASE_URL.into(),
                api_key: api_key.into(),
            },
            client: build_client(),
        }
    }

    /// Create a provider for Claude on Vertex AI.
    pub fn vertex(
        project: impl Into<String>,
        region: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            name: "vertex".into(),
            endpoint: Endpoint::Vertex {
                project: project.into(),
                region: region.into(),
                access_token: access_token.into(),
            },
            client: build_client(),
        }
    }

    /// Use a custom base URL (e.g., for testing or proxies).
    ///
    /// Has no effect on Vertex providers, whose URL is derived from the project.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        if let Endpoint::Messages { base_url, .. } = &mut self.endpoint {
            *base_url = url.into().trim_end_matches('/').to_string();
        }
        self
    }

    /// Override the reported provider name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// The URL a request for `model` is posted to.
    fn url(&self, model: &str) -> String {
        match &self.endpoint {
            Endpoint::Messages { base_url, .. } => format!("{base_url}/v1/messages"),
            Endpoint::Vertex {
                project, region, ..
            } => format!(
                "https://{region}-aiplatform.googleapis.com/v1/projects/{project}/locations/{region}/publishers/anthropic/models/{model}:rawPredict"
            ),
        }
    }

    /// Build the JSON body.
    ///
    /// Vertex carries the model in the URL and the API version in the body.
    fn build_body(&self, request: &ProviderRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "messages": request.messages,
            "max_tokens": request.max_tokens,
        });

        match self.endpoint {
            Endpoint::Messages { .. } => body["model"] = serde_json::json!(request.model),
            Endpoint::Vertex { .. } => {
                body["anthropic_version"] = serde_json::json!(VERTEX_ANTHROPIC_VERSION)
            }
        }

        if !request.system.is_empty() {
            body["system"] = serde_json::json!(request.system);
        }

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(request.tools);
        }

        body
    }
}

fn build_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(300)) // screenshots make requests large and slow
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "Falling back to default HTTP client");
            reqwest::Client::new()
        })
}

#[async_trait]
impl deskpilot_core::Provider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<RawResponse, ProviderError> {
        let url = self.url(&request.model);
        let body = self.build_body(&request);

        debug!(
            provider = %self.name,
            model = %request.model,
            messages = request.messages.len(),
            "Sending messages request"
        );

        let mut builder = self
            .client
            .post(&url)
            .header("Content-Type", "application/json");

        builder = match &self.endpoint {
            Endpoint::Messages { api_key, .. } => builder
                .header("x-api-key", api_key)
                .header("anthropic-version", ANTHROPIC_VERSION),
            Endpoint::Vertex { access_token, .. } => builder.bearer_auth(access_token),
        };

        if !request.betas.is_empty() {
            builder = builder.header("anthropic-beta", request.betas.join(","));
        }

        let response = builder
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            return Err(ProviderError::RateLimited { retry_after_secs });
        }
        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(format!(
                "{} rejected the credentials (status {status})",
                self.name
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if !(200..300).contains(&status) {
            warn!(status, body = %text, "Messages API error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: text,
            });
        }

        Ok(RawResponse { status, body: text })
    }
}
