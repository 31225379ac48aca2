use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Non-secret knobs, loadable from `.diffsentry.yml`. Secrets only ever
/// arrive through the environment and are resolved into [`Settings`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_provider")]
    pub provider: String,

    pub model: Option<String>,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    pub trigger_label: Option<String>,
    pub repository: Option<String>,

    pub github_api_url: Option<String>,
    pub ai_base_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            trigger_label: None,
            repository: None,
            github_api_url: None,
            ai_base_url: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = PathBuf::from(".diffsentry.yml");
        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_yaml::from_str(&content)?;
            return Ok(config);
        }

        let alt_config_path = PathBuf::from(".diffsentry.yaml");
        if alt_config_path.exists() {
            let content = std::fs::read_to_string(&alt_config_path)?;
            let config: Config = serde_yaml::from_str(&content)?;
            return Ok(config);
        }

        if let Some(home_dir) = dirs::home_dir() {
            let home_config = home_dir.join(".diffsentry.yml");
            if home_config.exists() {
                let content = std::fs::read_to_string(&home_config)?;
                let config: Config = serde_yaml::from_str(&content)?;
                return Ok(config);
            }
        }

        Ok(Config::default())
    }

    /// Environment variables override file values for everything but secrets,
    /// which live only in the environment.
    pub fn apply_env(&mut self) {
        if let Some(provider) = non_empty_env("AI_PROVIDER") {
            self.provider = provider;
        }
        if let Some(model) = non_empty_env("AI_MODEL") {
            self.model = Some(model);
        }
        if let Some(label) = non_empty_env("TRIGGER_LABEL") {
            self.trigger_label = Some(label);
        }
        if let Some(repository) = non_empty_env("GITHUB_REPOSITORY") {
            self.repository = Some(repository);
        }
        if let Some(url) = non_empty_env("GITHUB_API_URL") {
            self.github_api_url = Some(url);
        }
    }

    pub fn merge_with_cli(
        &mut self,
        repo: Option<String>,
        label: Option<String>,
        provider: Option<String>,
        model: Option<String>,
    ) {
        if let Some(repo) = repo {
            self.repository = Some(repo);
        }
        if let Some(label) = label {
            self.trigger_label = Some(label);
        }
        if let Some(provider) = provider {
            self.provider = provider;
        }
        if let Some(model) = model {
            self.model = Some(model);
        }
    }
}

/// Fully-resolved run configuration. Constructed once at startup and passed
/// by reference; inner components never consult the environment themselves.
#[derive(Debug, Clone)]
pub struct Settings {
    pub github_token: String,
    pub ai_api_key: String,
    pub provider: String,
    pub model: Option<String>,
    pub max_tokens: usize,
    pub temperature: f32,
    pub trigger_label: String,
    pub owner: String,
    pub repo: String,
    pub pr_number: u64,
    pub github_api_url: String,
    pub ai_base_url: Option<String>,
}

impl Settings {
    /// Fatal configuration errors: every missing required value is reported
    /// by name before any network interaction happens.
    pub fn resolve(config: &Config, pr_number: Option<u64>) -> Result<Self> {
        let github_token =
            non_empty_env("GITHUB_TOKEN").context("GITHUB_TOKEN is required but not set")?;
        let ai_api_key =
            non_empty_env("AI_API_KEY").context("AI_API_KEY is required but not set")?;

        let trigger_label = config
            .trigger_label
            .clone()
            .context("trigger label is required (set TRIGGER_LABEL or pass --label)")?;

        let repository = config
            .repository
            .clone()
            .context("repository is required (set GITHUB_REPOSITORY or pass --repo)")?;
        let (owner, repo) = split_repository(&repository)?;

        let pr_number = pr_number
            .or_else(|| non_empty_env("PR_NUMBER").and_then(|v| v.parse().ok()))
            .context("pull request number is required (set PR_NUMBER or pass --pr)")?;

        Ok(Self {
            github_token,
            ai_api_key,
            provider: config.provider.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            trigger_label,
            owner,
            repo,
            pr_number,
            github_api_url: config
                .github_api_url
                .clone()
                .unwrap_or_else(|| "https://api.github.com".to_string()),
            ai_base_url: config.ai_base_url.clone(),
        })
    }
}

fn split_repository(repository: &str) -> Result<(String, String)> {
    let mut parts = repository.splitn(2, '/');
    match (parts.next(), parts.next()) {
        (Some(owner), Some(repo)) if !owner.is_empty() && !repo.is_empty() => {
            Ok((owner.to_string(), repo.to_string()))
        }
        _ => bail!("invalid repository {:?}, expected owner/name", repository),
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn default_provider() -> String {
    "anthropic".to_string()
}

fn default_max_tokens() -> usize {
    4000
}

fn default_temperature() -> f32 {
    0.2
}
