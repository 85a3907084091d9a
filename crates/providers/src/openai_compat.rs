//! OpenAI-compatible completion service.
//!
//! Works with OpenAI, OpenRouter, Ollama, vLLM and any other endpoint that
//! exposes `/chat/completions`. Only non-streaming completions are used: one
//! request per (session, query) pair, first choice wins.
//!
//! Status classification:
//! - 429 → [`ProviderError::RateLimited`]
//! - 503 / 504 → [`ProviderError::ServiceUnavailable`]
//! - other non-success → [`ProviderError::RequestFailed`] with the
//!   service-reported message, or `"API call failed: <status>"`
//! - connection/timeout failures → [`ProviderError::Transport`]

use async_trait::async_trait;
use convoquery_config::AppConfig;
use convoquery_core::error::ProviderError;
use convoquery_core::provider::*;
use convoquery_core::sanitize::sanitize;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// An OpenAI-compatible completion service.
pub struct OpenAiCompatService {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatService {
    /// Create a new service. The credential is sanitized and trimmed before
    /// it is ever placed in a header.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: &str,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: sanitize(api_key).trim().to_string(),
            client,
        }
    }

    /// Create a service from the endpoint settings of a config.
    pub fn from_config(config: &AppConfig, api_key: &str) -> Self {
        Self::new(
            config.provider.clone(),
            config.base_url.clone(),
            api_key,
            config.request_timeout(),
        )
    }

    /// A connector that builds a service for whatever credential a run is
    /// started with.
    pub fn connector(
        config: &AppConfig,
    ) -> impl Fn(&str) -> Arc<dyn CompletionService> + Send + Sync + use<> {
        let config = config.clone();
        move |api_key: &str| {
            Arc::new(Self::from_config(&config, api_key)) as Arc<dyn CompletionService>
        }
    }

    /// Convert prompt messages to the OpenAI wire format.
    fn to_api_messages(messages: &[PromptMessage]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: match m.role {
                    Role::System => "system".into(),
                    Role::User => "user".into(),
                },
                content: Some(m.content.clone()),
            })
            .collect()
    }

    /// Classify a non-success status using the response body.
    fn classify_failure(status: u16, body: &str) -> ProviderError {
        let reported = serde_json::from_str::<ApiErrorBody>(body)
            .ok()
            .map(|b| b.error.message)
            .filter(|m| !m.trim().is_empty());

        match status {
            429 => ProviderError::RateLimited(
                reported.unwrap_or_else(|| "Rate limit exceeded".into()),
            ),
            503 | 504 => ProviderError::ServiceUnavailable {
                status_code: status,
            },
            _ => match reported {
                Some(message) => ProviderError::RequestFailed {
                    status_code: Some(status),
                    message,
                },
                None => ProviderError::api_call_failed(status),
            },
        }
    }
}

#[async_trait]
impl CompletionService for OpenAiCompatService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<CompletionResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "temperature": request.temperature,
            "stream": false,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        debug!(service = %self.name, model = %request.model, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = response.status().as_u16();

        if !response.status().is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Completion service returned error");
            return Err(Self::classify_failure(status, &error_body));
        }

        let api_response: ApiResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::RequestFailed {
                    status_code: Some(status),
                    message: format!("Failed to parse response: {e}"),
                })?;

        let choice = api_response.choices.into_iter().next().ok_or_else(|| {
            ProviderError::RequestFailed {
                status_code: Some(status),
                message: "No choices in response".into(),
            }
        })?;

        let content = choice
            .message
            .content
            .ok_or_else(|| ProviderError::RequestFailed {
                status_code: Some(status),
                message: "Choice carries no message text".into(),
            })?;

        let usage = api_response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(CompletionResponse {
            content,
            model: api_response.model.unwrap_or(request.model),
            usage,
        })
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        Ok(response.status().is_success())
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

/// `{"error": {"message": "..."}}`
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}
