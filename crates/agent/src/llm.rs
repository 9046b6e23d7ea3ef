//! Chat-completion client with ordered multi-model fallback.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use wayfarer_core::config::LlmConfig;

/// Longest slice of an error body carried into logs.
const ERROR_BODY_PREVIEW: usize = 200;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Completion {
    pub model: String,
    pub content: String,
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("response envelope is missing `{0}`")]
    Envelope(&'static str),
    #[error("response content is empty")]
    EmptyContent,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Tries `models` in order and returns the first non-empty completion.
    ///
    /// `None` means every candidate failed; failures are logged, not raised.
    async fn generate(&self, system: &str, user: &str, models: &[String]) -> Option<Completion>;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Option<Vec<ChatChoice>>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// OpenAI-compatible `/chat/completions` client.
pub struct ReasoningClient {
    http: Client,
    endpoint: String,
    api_key: Option<SecretString>,
    temperature: f32,
    max_tokens: u32,
}

impl ReasoningClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let http = Client::builder().timeout(Duration::from_secs(config.timeout_secs)).build()?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    pub async fn complete_with_model(
        &self,
        model: &str,
        system: &str,
        user: &str,
    ) -> Result<String, LlmError> {
        let body = ChatRequest {
            model,
            messages: [
                ChatMessage { role: "system", content: system },
                ChatMessage { role: "user", content: user },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let mut request = self.http.post(&self.endpoint).json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: body.chars().take(ERROR_BODY_PREVIEW).collect(),
            });
        }

        let envelope: ChatResponse = response.json().await?;
        let content = envelope
            .choices
            .ok_or(LlmError::Envelope("choices"))?
            .into_iter()
            .next()
            .ok_or(LlmError::Envelope("choices[0]"))?
            .message
            .ok_or(LlmError::Envelope("choices[0].message"))?
            .content
            .ok_or(LlmError::Envelope("choices[0].message.content"))?;

        if content.trim().is_empty() {
            return Err(LlmError::EmptyContent);
        }
        Ok(content)
    }
}

#[async_trait]
impl LlmClient for ReasoningClient {
    async fn generate(&self, system: &str, user: &str, models: &[String]) -> Option<Completion> {
        for model in models {
            info!(event_name = "agent.llm.attempt", model = %model, "trying model");
            match self.complete_with_model(model, system, user).await {
                Ok(content) => {
                    info!(event_name = "agent.llm.succeeded", model = %model, "model responded");
                    return Some(Completion { model: model.clone(), content });
                }
                Err(error) => {
                    warn!(
                        event_name = "agent.llm.failed",
                        model = %model,
                        error = %error,
                        "model attempt failed; trying next candidate"
                    );
                }
            }
        }

        warn!(
            event_name = "agent.llm.exhausted",
            candidates = models.len(),
            "all candidate models failed"
        );
        None
    }
}
