//! OpenAI Chat Completions client.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{ERROR_SENTINEL, LlmError, TextGenerator};

/// Connection settings for [`OpenAiGenerator`].
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
    /// API root without trailing slash, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
}

impl OpenAiConfig {
    pub const DEFAULT_MODEL: &str = "gpt-4o";
    pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: Self::DEFAULT_MODEL.to_string(),
            base_url: Self::DEFAULT_BASE_URL.to_string(),
        }
    }
}

/// [`TextGenerator`] backed by the OpenAI Chat Completions API.
pub struct OpenAiGenerator {
    config: OpenAiConfig,
    http: Client,
}

impl OpenAiGenerator {
    pub fn new(config: OpenAiConfig) -> Self {
        Self {
            config,
            http: Client::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    /// Build the request body: one user message, no tools.
    fn build_request_body(&self, prompt: &str, temperature: f32) -> serde_json::Value {
        serde_json::json!({
            "model": self.config.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": temperature
        })
    }

    async fn try_complete(&self, prompt: &str, temperature: f32) -> Result<String, LlmError> {
        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&self.build_request_body(prompt, temperature))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatResponse = response.json().await?;
        first_message_content(body)
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn complete(&self, prompt: &str, temperature: f32) -> String {
        debug!(model = %self.config.model, prompt_len = prompt.len(), "complete: called");
        match self.try_complete(prompt, temperature).await {
            Ok(text) => text,
            Err(e) => {
                warn!(model = %self.config.model, error = %e, "completion failed");
                ERROR_SENTINEL.to_string()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

fn first_message_content(body: ChatResponse) -> Result<String, LlmError> {
    body.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| LlmError::InvalidResponse("no message content in response".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator(base_url: &str) -> OpenAiGenerator {
        OpenAiGenerator::new(OpenAiConfig {
            base_url: base_url.to_string(),
            ..OpenAiConfig::new("sk-test")
        })
    }

    #[test]
    fn config_defaults() {
        let cfg = OpenAiConfig::new("key");
        assert_eq!(cfg.model, "gpt-4o");
        assert_eq!(cfg.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let g = generator("http://localhost:9999/v1/");
        assert_eq!(g.endpoint(), "http://localhost:9999/v1/chat/completions");
    }

    #[test]
    fn request_body_shape() {
        let g = generator("http://localhost");
        let body = g.build_request_body("plan it", 0.1);
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "plan it");
        let temp = body["temperature"].as_f64().unwrap();
        assert!((temp - 0.1).abs() < 1e-6);
    }

    #[test]
    fn extracts_first_choice() {
        let body: ChatResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"role": "assistant", "content": "[]"}}]}"#,
        )
        .unwrap();
        assert_eq!(first_message_content(body).unwrap(), "[]");
    }

    #[test]
    fn empty_choices_is_invalid() {
        let body: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(
            first_message_content(body),
            Err(LlmError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_service_returns_sentinel() {
        // Port 1 on loopback refuses connections.
        let g = generator("http://127.0.0.1:1/v1");
        assert_eq!(g.complete("hello", 0.1).await, ERROR_SENTINEL);
    }
}
