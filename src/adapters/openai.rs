use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::adapters::llm::{http_client, BackendConfig, BackendError, ReviewBackend};

const PROVIDER: &str = "openai";
const DEFAULT_MODEL: &str = "gpt-4o";

pub struct OpenAiBackend {
    client: reqwest::Client,
    config: BackendConfig,
    base_url: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: usize,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl OpenAiBackend {
    pub fn new(config: BackendConfig) -> Result<Self, BackendError> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());

        Ok(Self {
            client: http_client("openai")?,
            config,
            base_url,
        })
    }
}

#[async_trait]
impl ReviewBackend for OpenAiBackend {
    async fn submit_prompt(&self, prompt: &str) -> Result<String, BackendError> {
        let request = ChatRequest {
            model: self.config.model.as_deref().unwrap_or(DEFAULT_MODEL),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|source| BackendError::Http {
                provider: PROVIDER,
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Api {
                provider: PROVIDER,
                status,
                body,
            });
        }

        let parsed: ChatResponse =
            response.json().await.map_err(|source| BackendError::Http {
                provider: PROVIDER,
                source,
            })?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(BackendError::EmptyResponse { provider: PROVIDER });
        }

        Ok(text)
    }

    fn name(&self) -> &'static str {
        PROVIDER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_url: &str) -> BackendConfig {
        BackendConfig {
            api_key: "key".to_string(),
            model: Some("gpt-4o-mini".to_string()),
            base_url: Some(base_url.to_string()),
            max_tokens: 1000,
            temperature: 0.2,
        }
    }

    #[tokio::test]
    async fn extracts_first_choice() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer key")
            .with_status(200)
            .with_body(
                r#"{"choices": [{"message": {"content": "{\"hasReview\": false}"}}]}"#,
            )
            .create_async()
            .await;

        let backend = OpenAiBackend::new(config(&server.url())).unwrap();
        let text = backend.submit_prompt("review this").await.unwrap();
        assert_eq!(text, r#"{"hasReview": false}"#);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn surfaces_api_error_kind() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(500)
            .with_body("upstream error")
            .create_async()
            .await;

        let backend = OpenAiBackend::new(config(&server.url())).unwrap();
        let err = backend.submit_prompt("review this").await.unwrap_err();
        assert!(matches!(err, BackendError::Api { .. }));
    }
}
