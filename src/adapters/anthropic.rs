use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::adapters::llm::{http_client, BackendConfig, BackendError, ReviewBackend};

const PROVIDER: &str = "anthropic";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

pub struct AnthropicBackend {
    client: reqwest::Client,
    config: BackendConfig,
    base_url: String,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: usize,
    temperature: f32,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: String,
}

impl AnthropicBackend {
    pub fn new(config: BackendConfig) -> Result<Self, BackendError> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| "https://api.anthropic.com/v1".to_string());

        Ok(Self {
            client: http_client("anthropic")?,
            config,
            base_url,
        })
    }
}

#[async_trait]
impl ReviewBackend for AnthropicBackend {
    async fn submit_prompt(&self, prompt: &str) -> Result<String, BackendError> {
        let request = MessagesRequest {
            model: self.config.model.as_deref().unwrap_or(DEFAULT_MODEL),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
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

        let parsed: MessagesResponse =
            response.json().await.map_err(|source| BackendError::Http {
                provider: PROVIDER,
                source,
            })?;

        let text = parsed
            .content
            .into_iter()
            .find(|block| block.block_type == "text")
            .map(|block| block.text)
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
