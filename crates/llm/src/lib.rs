//! Chat completion and embedding client (C2).
//!
//! `LlmProvider` is the trait boundary every other component talks to.
//! `OpenAiClient` builds requests by hand with `reqwest` + `serde_json::json!`
//! rather than pulling in a provider SDK — unlike the rest of this crate's
//! error handling, an empty completion is a *raised*, typed failure
//! (`LlmError::EmptyCompletion`), because callers that need deterministic
//! structured output (intent classification, query generation) must be able
//! to match on it rather than silently treat blank text as a valid answer.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{instrument, warn};

/// Role in a chat conversation, matching the OpenAI chat-completions shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One turn of conversation history, reused verbatim as the session's
/// persisted history shape (see `scholarqa-server`).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: ChatRole::System, content: content.into() }
    }
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, content: content.into() }
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("request to LLM provider failed: {0}")]
    RequestFailed(String),
    #[error("LLM provider returned no content")]
    EmptyCompletion,
    #[error("could not parse LLM provider response: {0}")]
    InvalidResponse(String),
    /// The request did not complete within the configured per-call timeout
    /// (spec §5). Treated the same as any other `RequestFailed` by callers —
    /// `classify` falls back to `OPEN_QUESTION`, others propagate `Err`.
    #[error("request to LLM provider timed out after {0:?}")]
    Timeout(Duration),
}

/// Maximum conversation turns kept ahead of a request (spec §3: bounded
/// window, at most ten).
pub const MAX_HISTORY_TURNS: usize = 10;

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Completes a chat using up to the last ten history turns, prepended
    /// after the system prompt, followed by the user turn. Deterministic
    /// callers (intent classification, query generation) pass
    /// `temperature = Some(0.0)`; prose callers (answer synthesis) pass
    /// `None` to use the provider's default sampling.
    async fn chat(
        &self,
        system_prompt: &str,
        user_content: &str,
        history: &[ChatMessage],
        temperature: Option<f32>,
    ) -> Result<String, LlmError>;

    /// Returns the embedding for `text`, or an empty vector for empty
    /// input (spec §4.2).
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError>;
}

pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    chat_model: String,
    embedding_model: String,
    per_call_timeout: Duration,
}

impl OpenAiClient {
    pub fn new(
        api_key: impl Into<String>,
        chat_model: impl Into<String>,
        embedding_model: impl Into<String>,
        per_call_timeout: Duration,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            chat_model: chat_model.into(),
            embedding_model: embedding_model.into(),
            per_call_timeout,
        }
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.api_key)
    }
}

#[async_trait]
impl LlmProvider for OpenAiClient {
    #[instrument(skip(self, system_prompt, user_content, history), fields(model = %self.chat_model, history_len = history.len()))]
    async fn chat(
        &self,
        system_prompt: &str,
        user_content: &str,
        history: &[ChatMessage],
        temperature: Option<f32>,
    ) -> Result<String, LlmError> {
        match tokio::time::timeout(
            self.per_call_timeout,
            self.chat_uncapped(system_prompt, user_content, history, temperature),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout(self.per_call_timeout)),
        }
    }

    #[instrument(skip(self, text), fields(model = %self.embedding_model, text_len = text.len()))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        if text.is_empty() {
            return Ok(Vec::new());
        }
        match tokio::time::timeout(self.per_call_timeout, self.embed_uncapped(text)).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout(self.per_call_timeout)),
        }
    }
}

impl OpenAiClient {
    async fn chat_uncapped(
        &self,
        system_prompt: &str,
        user_content: &str,
        history: &[ChatMessage],
        temperature: Option<f32>,
    ) -> Result<String, LlmError> {
        let mut messages = vec![json!({ "role": "system", "content": system_prompt })];
        let start = history.len().saturating_sub(MAX_HISTORY_TURNS);
        for turn in &history[start..] {
            messages.push(json!({
                "role": match turn.role {
                    ChatRole::System => "system",
                    ChatRole::User => "user",
                    ChatRole::Assistant => "assistant",
                },
                "content": turn.content,
            }));
        }
        messages.push(json!({ "role": "user", "content": user_content }));

        let mut payload = json!({ "model": self.chat_model, "messages": messages });
        if let Some(t) = temperature {
            payload["temperature"] = json!(t);
        }

        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", self.bearer())
            .json(&payload)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        if !status.is_success() {
            return Err(LlmError::RequestFailed(format!("{status}: {body}")));
        }

        let content = body
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|v| v.as_str());

        match content {
            Some(text) if !text.trim().is_empty() => Ok(text.to_string()),
            _ => {
                warn!("chat completion returned no content");
                Err(LlmError::EmptyCompletion)
            }
        }
    }

    async fn embed_uncapped(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let payload = json!({ "model": self.embedding_model, "input": text });
        let response = self
            .client
            .post("https://api.openai.com/v1/embeddings")
            .header("Authorization", self.bearer())
            .json(&payload)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        if !status.is_success() {
            return Err(LlmError::RequestFailed(format!("{status}: {body}")));
        }

        let embedding = body
            .get("data")
            .and_then(|d| d.get(0))
            .and_then(|d| d.get("embedding"))
            .and_then(|v| v.as_array())
            .ok_or_else(|| LlmError::InvalidResponse("missing embedding field".to_string()))?;

        Ok(embedding.iter().filter_map(|v| v.as_f64()).map(|v| v as f32).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_message_constructors_set_role() {
        let m = ChatMessage::user("hi");
        assert_eq!(m.role, ChatRole::User);
        assert_eq!(m.content, "hi");
    }

    #[test]
    fn max_history_turns_matches_spec_bound() {
        assert_eq!(MAX_HISTORY_TURNS, 10);
    }

    #[test]
    fn timeout_error_message_names_the_configured_duration() {
        let err = LlmError::Timeout(Duration::from_secs(10));
        assert!(err.to_string().contains("10s"));
    }

    #[tokio::test]
    async fn embed_of_empty_text_returns_before_touching_the_network() {
        // Empty input short-circuits ahead of the timeout-wrapped request,
        // so this must resolve immediately even with an unreachable API key.
        let client = OpenAiClient::new("sk-test", "gpt-4o-mini", "text-embedding-3-large", Duration::from_millis(1));
        let embedding = client.embed("").await.unwrap();
        assert!(embedding.is_empty());
    }
}
