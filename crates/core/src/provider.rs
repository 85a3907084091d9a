//! CompletionService trait — the abstraction over natural-language
//! completion backends.
//!
//! A service takes a short system + user prompt and returns generated text.
//! The engine never sees HTTP: status codes are classified into
//! [`ProviderError`] by the implementation.
//!
//! Implementations: OpenAI-compatible HTTP endpoints (`convoquery-providers`)
//! and stub services in tests.

use crate::error::ProviderError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Who authored a prompt message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// One message of a prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A request for one (session, query) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The model to use (e.g., "gpt-4o-mini")
    pub model: String,

    /// System instruction followed by the user instruction
    pub messages: Vec<PromptMessage>,

    /// Sampling temperature; kept low for extraction-style answers
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Output-token cap
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.1
}

/// The first generated choice of a successful completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Generated text, unsanitized
    pub content: String,

    /// Which model actually responded (may differ from requested)
    #[serde(default)]
    pub model: String,

    /// Token usage statistics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// Token usage information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The remote completion capability the engine dispatches to.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// A human-readable name (e.g., "openai", "openrouter").
    fn name(&self) -> &str;

    /// Send a request and get the first generated choice back.
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<CompletionResponse, ProviderError>;

    /// Health check: can we reach the service?
    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_defaults_to_low_temperature() {
        let req: CompletionRequest = serde_json::from_str(
            r#"{"model":"m","messages":[{"role":"user","content":"hi"}]}"#,
        )
        .unwrap();
        assert!((req.temperature - 0.1).abs() < f32::EPSILON);
        assert_eq!(req.max_tokens, None);
        assert_eq!(req.messages[0].role, Role::User);
    }

    #[test]
    fn prompt_message_serialization() {
        let msg = PromptMessage::system("be brief");
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"role":"system","content":"be brief"}"#);
    }
}
