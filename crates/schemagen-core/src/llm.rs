//! LLM collaborator interface and an OpenAI-compatible client.
//!
//! The rest of the crate only needs [`LlmClient::complete`]: one system
//! instruction plus one user message in, generated text out.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Errors from the LLM service.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("OPENAI_API_KEY not set. Please set it in your .env file or environment.")]
    MissingApiKey,

    #[error("LLM request timed out after {secs} seconds")]
    Timeout { secs: u64 },

    #[error("LLM transport error: {0}")]
    Transport(String),

    #[error("LLM API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("malformed LLM response: {0}")]
    MalformedResponse(String),
}

/// Narrow LLM interface used by the generator and the repair requester.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError>;
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Role-tagged chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
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

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// OpenAI-compatible client
// ---------------------------------------------------------------------------

/// Configuration for [`OpenAiClient`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmConfig {
    /// API key; `None` makes every request fail with [`LlmError::MissingApiKey`].
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Base URL of a chat-completions compatible API.
    pub base_url: String,

    pub model: String,

    pub temperature: f32,

    pub max_tokens: Option<u32>,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            max_tokens: None,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completions client for OpenAI and API-compatible servers.
pub struct OpenAiClient {
    config: LlmConfig,
    http_client: reqwest::Client,
}

impl OpenAiClient {
    /// Build a client. Fails early when no API key is configured.
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        if config.api_key.as_deref().map_or(true, str::is_empty) {
            error!("OPENAI_API_KEY not found in environment variables");
            return Err(LlmError::MissingApiKey);
        }

        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("schemagen/", env!("CARGO_PKG_VERSION")));
        if config.timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.timeout_secs));
        }
        let http_client = builder
            .build()
            .map_err(|e| LlmError::Transport(format!("failed to create HTTP client: {e}")))?;

        info!(model = %config.model, "initialized LLM client");
        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// Send a full role-tagged conversation and return the reply text.
    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(LlmError::MissingApiKey)?;

        let url = completions_url(&self.config.base_url);
        let body = CompletionRequest {
            model: &self.config.model,
            messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        info!(messages = messages.len(), model = %self.config.model, "calling LLM");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!(status = status.as_u16(), "LLM API request failed");
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let raw = response.text().await.map_err(|e| self.map_transport(e))?;
        let content = parse_completion(&raw)?;
        if content.is_empty() {
            warn!("LLM returned empty response");
        } else {
            debug!(chars = content.len(), "LLM response received");
        }
        Ok(content)
    }

    fn map_transport(&self, e: reqwest::Error) -> LlmError {
        if e.is_timeout() {
            LlmError::Timeout {
                secs: self.config.timeout_secs,
            }
        } else {
            LlmError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let messages = [ChatMessage::system(system), ChatMessage::user(user)];
        self.chat(&messages).await
    }
}

fn completions_url(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

/// Extract the first choice's content. A missing or null content is `""`.
fn parse_completion(raw: &str) -> Result<String, LlmError> {
    let response: CompletionResponse =
        serde_json::from_str(raw).map_err(|e| LlmError::MalformedResponse(e.to_string()))?;
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::MalformedResponse("no choices in response".to_string()))?;
    Ok(choice.message.content.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_config_default() {
        let config = LlmConfig::default();
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.base_url, "https://api.openai.com/v1");
        assert!((config.temperature - 0.7).abs() < f32::EPSILON);
        assert!(config.max_tokens.is_none());
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_new_without_key_fails() {
        assert!(matches!(
            OpenAiClient::new(LlmConfig::default()),
            Err(LlmError::MissingApiKey)
        ));

        let config = LlmConfig {
            api_key: Some(String::new()),
            ..Default::default()
        };
        assert!(matches!(
            OpenAiClient::new(config),
            Err(LlmError::MissingApiKey)
        ));
    }

    #[test]
    fn test_new_with_key_succeeds() {
        let config = LlmConfig {
            api_key: Some("sk-test".to_string()),
            ..Default::default()
        };
        let client = OpenAiClient::new(config).expect("client");
        assert_eq!(client.config().model, "gpt-4o-mini");
    }

    #[test]
    fn test_api_key_is_never_serialized() {
        let config = LlmConfig {
            api_key: Some("sk-secret".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_string(&config).expect("serialize");
        assert!(!json.contains("sk-secret"));
    }

    #[test]
    fn test_completions_url_trims_trailing_slash() {
        assert_eq!(
            completions_url("https://api.openai.com/v1/"),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            completions_url("http://localhost:11434/v1"),
            "http://localhost:11434/v1/chat/completions"
        );
    }

    #[test]
    fn test_request_body_shape() {
        let messages = [ChatMessage::system("be terse"), ChatMessage::user("hi")];
        let body = CompletionRequest {
            model: "gpt-4o-mini",
            messages: &messages,
            temperature: 0.5,
            max_tokens: None,
        };
        let json = serde_json::to_value(&body).expect("serialize");
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["messages"][1]["content"], "hi");
        assert!(json.get("max_tokens").is_none());
    }

    #[test]
    fn test_parse_completion_extracts_first_choice() {
        let raw = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"model A {}"}}]}"#;
        assert_eq!(parse_completion(raw).unwrap(), "model A {}");
    }

    #[test]
    fn test_parse_completion_null_content_is_empty() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        assert_eq!(parse_completion(raw).unwrap(), "");
    }

    #[test]
    fn test_parse_completion_rejects_empty_choices() {
        let raw = r#"{"choices":[]}"#;
        assert!(matches!(
            parse_completion(raw),
            Err(LlmError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_parse_completion_rejects_garbage() {
        assert!(matches!(
            parse_completion("<html>bad gateway</html>"),
            Err(LlmError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_error() {
        let config = LlmConfig {
            api_key: Some("sk-test".to_string()),
            base_url: "http://127.0.0.1:1".to_string(),
            timeout_secs: 5,
            ..Default::default()
        };
        let client = OpenAiClient::new(config).expect("client");
        let err = client.complete("system", "user").await.unwrap_err();
        assert!(matches!(
            err,
            LlmError::Transport(_) | LlmError::Timeout { .. }
        ));
    }
}
