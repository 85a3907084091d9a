//! Completion client. Turns a (session, query) pair into one request to the
//! completion service and a sanitized answer string.

use crate::grouper::SessionGroup;
use crate::prompt::PromptBuilder;
use convoquery_config::AppConfig;
use convoquery_core::error::ProviderError;
use convoquery_core::message::Query;
use convoquery_core::provider::{CompletionRequest, CompletionService};
use convoquery_core::sanitize::sanitize;
use std::sync::Arc;
use tracing::debug;

/// Request settings shared by every call of a run.
#[derive(Debug, Clone)]
pub struct RequestSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl RequestSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

impl Default for RequestSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Wraps a [`CompletionService`] with prompt construction and answer
/// sanitization.
#[derive(Clone)]
pub struct CompletionClient {
    service: Arc<dyn CompletionService>,
    prompts: PromptBuilder,
    settings: RequestSettings,
}

impl CompletionClient {
    pub fn new(
        service: Arc<dyn CompletionService>,
        prompts: PromptBuilder,
        settings: RequestSettings,
    ) -> Self {
        Self {
            service,
            prompts,
            settings,
        }
    }

    pub fn service_name(&self) -> &str {
        self.service.name()
    }

    /// The request that would be sent for this pair.
    pub fn request_for(&self, session: &SessionGroup, query: &Query) -> CompletionRequest {
        CompletionRequest {
            model: self.settings.model.clone(),
            messages: self.prompts.build(session, query),
            temperature: self.settings.temperature,
            max_tokens: Some(self.settings.max_tokens),
        }
    }

    /// Ask the service and return the sanitized, trimmed answer.
    ///
    /// Classified service failures are propagated unchanged.
    pub async fn answer(
        &self,
        session: &SessionGroup,
        query: &Query,
    ) -> Result<String, ProviderError> {
        let request = self.request_for(session, query);
        let response = self.service.complete(request).await?;

        debug!(
            session_id = %session.session_id,
            query = %query.name,
            model = %response.model,
            tokens = response.usage.map(|u| u.total_tokens),
            "Completion received"
        );

        Ok(sanitize(&response.content).trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use convoquery_core::message::Message;
    use convoquery_core::provider::CompletionResponse;
    use std::sync::Mutex;

    /// Echoes a fixed reply and keeps the last request.
    struct RecordingService {
        reply: Result<String, ProviderError>,
        last: Mutex<Option<CompletionRequest>>,
    }

    #[async_trait]
    impl CompletionService for RecordingService {
        fn name(&self) -> &str {
            "recording"
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<CompletionResponse, ProviderError> {
            *self.last.lock().unwrap() = Some(request);
            self.reply.clone().map(|content| CompletionResponse {
                content,
                model: "stub".into(),
                usage: None,
            })
        }
    }

    fn client(reply: Result<String, ProviderError>) -> (CompletionClient, Arc<RecordingService>) {
        let service = Arc::new(RecordingService {
            reply,
            last: Mutex::new(None),
        });
        let client = CompletionClient::new(
            service.clone(),
            PromptBuilder::default(),
            RequestSettings {
                model: "gpt-test".into(),
                temperature: 0.1,
                max_tokens: 128,
            },
        );
        (client, service)
    }

    fn session() -> SessionGroup {
        SessionGroup {
            session_id: "s1".into(),
            messages: vec![Message::new("s1", "user", "hello", "2024-01-01", "P1")],
        }
    }

    #[tokio::test]
    async fn answer_is_sanitized_and_trimmed() {
        let (client, _) = client(Ok("  \u{201C}Refund\u{201D}\n".into()));
        let answer = client
            .answer(&session(), &Query::new("Intent", "What is wanted?"))
            .await
            .unwrap();
        assert_eq!(answer, "Refund");
    }

    #[tokio::test]
    async fn request_carries_settings() {
        let (client, service) = client(Ok("ok".into()));
        client
            .answer(&session(), &Query::new("Intent", "What is wanted?"))
            .await
            .unwrap();

        let request = service.last.lock().unwrap().clone().unwrap();
        assert_eq!(request.model, "gpt-test");
        assert_eq!(request.max_tokens, Some(128));
        assert_eq!(request.messages.len(), 2);
    }

    #[tokio::test]
    async fn failures_propagate_unchanged() {
        let (client, _) = client(Err(ProviderError::Transport("reset".into())));
        let err = client
            .answer(&session(), &Query::new("Intent", "What is wanted?"))
            .await
            .unwrap_err();
        assert_eq!(err, ProviderError::Transport("reset".into()));
    }
}
