use async_trait::async_trait;
use thiserror::Error;

use crate::config::Settings;

/// Everything a backend needs, resolved up front. Adapters never read the
/// environment themselves.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub api_key: String,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub max_tokens: usize,
    pub temperature: f32,
}

impl BackendConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            api_key: settings.ai_api_key.clone(),
            model: settings.model.clone(),
            base_url: settings.ai_base_url.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
        }
    }
}

/// `UnknownProvider` is a configuration error and aborts the run before any
/// PR interaction; the remaining kinds occur per call and are isolated to
/// the file being reviewed.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("unknown review provider {0:?} (expected \"anthropic\" or \"openai\")")]
    UnknownProvider(String),

    #[error("{provider} request failed: {source}")]
    Http {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} API error ({status}): {body}")]
    Api {
        provider: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("{provider} returned an empty response")]
    EmptyResponse { provider: &'static str },
}

impl BackendError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, BackendError::UnknownProvider(_))
    }
}

/// The single capability the pipeline needs from any LLM vendor.
#[async_trait]
pub trait ReviewBackend: Send + Sync {
    async fn submit_prompt(&self, prompt: &str) -> Result<String, BackendError>;
    fn name(&self) -> &'static str;
}

/// Selects a backend by provider name, failing closed on unrecognized names.
pub fn create_backend(
    provider: &str,
    config: &BackendConfig,
) -> Result<Box<dyn ReviewBackend>, BackendError> {
    match provider.trim().to_ascii_lowercase().as_str() {
        "anthropic" => Ok(Box::new(crate::adapters::AnthropicBackend::new(
            config.clone(),
        )?)),
        "openai" => Ok(Box::new(crate::adapters::OpenAiBackend::new(
            config.clone(),
        )?)),
        other => Err(BackendError::UnknownProvider(other.to_string())),
    }
}

pub(crate) fn http_client(provider: &'static str) -> Result<reqwest::Client, BackendError> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(120))
        .build()
        .map_err(|source| BackendError::Http { provider, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> BackendConfig {
        BackendConfig {
            api_key: "key".to_string(),
            model: None,
            base_url: None,
            max_tokens: 4000,
            temperature: 0.2,
        }
    }

    #[test]
    fn selects_backend_by_name() {
        assert_eq!(create_backend("anthropic", &config()).unwrap().name(), "anthropic");
        assert_eq!(create_backend("OpenAI", &config()).unwrap().name(), "openai");
    }

    #[test]
    fn fails_closed_on_unknown_provider() {
        match create_backend("mistral", &config()) {
            Ok(_) => panic!("expected an unknown-provider error"),
            Err(err) => {
                assert!(matches!(err, BackendError::UnknownProvider(_)));
                assert!(err.is_configuration());
                assert!(err.to_string().contains("mistral"));
            }
        }
    }
}
