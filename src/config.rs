use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{LabelerError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub suggestion: SuggestionConfig,
    #[serde(default)]
    pub labels: LabelConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,
    #[serde(default = "default_token_path")]
    pub token_path: PathBuf,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            credentials_path: default_credentials_path(),
            token_path: default_token_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    #[serde(default = "default_query")]
    pub query: String,
    #[serde(default = "default_max_messages")]
    pub max_messages: u32,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            query: default_query(),
            max_messages: default_max_messages(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Name of the environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_labels")]
    pub max_labels: usize,
    /// Used when the model reply contains no valid label name
    #[serde(default)]
    pub fallback_label: Option<String>,
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_base: default_api_base(),
            api_key_env: default_api_key_env(),
            max_labels: default_max_labels(),
            fallback_label: None,
        }
    }
}

/// What to do when the label listing fails at the start of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DirectoryErrorPolicy {
    /// Abort the run with `DirectoryLoadError`
    Abort,
    /// Log a warning and continue with an empty directory
    #[default]
    ProceedEmpty,
}

/// Which of a message's existing labels are removed when new ones are applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RemovePolicy {
    /// Remove every label id the message carried before the run
    #[default]
    AllExisting,
    /// Remove only INBOX and UNREAD
    InboxAndUnread,
    /// Keep all existing labels
    Keep,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LabelConfig {
    #[serde(default)]
    pub on_directory_error: DirectoryErrorPolicy,
    #[serde(default)]
    pub remove_policy: RemovePolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_route")]
    pub route: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            route: default_route(),
        }
    }
}

fn default_credentials_path() -> PathBuf {
    PathBuf::from("credential.json")
}

fn default_token_path() -> PathBuf {
    PathBuf::from("token.json")
}

fn default_query() -> String {
    "is:unread".to_string()
}

fn default_max_messages() -> u32 {
    5
}

fn default_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_api_base() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_api_key_env() -> String {
    "GENERATIVE_AI_API_KEY".to_string()
}

fn default_max_labels() -> usize {
    2
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_route() -> String {
    "/api/labelsemails".to_string()
}

impl Config {
    pub async fn load(path: &Path) -> Result<Self> {
        // If file doesn't exist, return default config with warning
        if !path.exists() {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| LabelerError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| LabelerError::ConfigError(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;

        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                LabelerError::ConfigError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| LabelerError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        tokio::fs::write(path, content)
            .await
            .map_err(|e| LabelerError::ConfigError(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.mail.query.trim().is_empty() {
            return Err(LabelerError::ConfigError(
                "mail.query cannot be empty".to_string(),
            ));
        }

        // Gmail caps messages.list pages at 500
        if self.mail.max_messages == 0 {
            return Err(LabelerError::ConfigError(
                "mail.max_messages must be at least 1".to_string(),
            ));
        }
        if self.mail.max_messages > 500 {
            return Err(LabelerError::ConfigError(
                "mail.max_messages cannot exceed 500".to_string(),
            ));
        }

        if self.suggestion.model.trim().is_empty() {
            return Err(LabelerError::ConfigError(
                "suggestion.model cannot be empty".to_string(),
            ));
        }
        if !self.suggestion.api_base.starts_with("http://")
            && !self.suggestion.api_base.starts_with("https://")
        {
            return Err(LabelerError::ConfigError(format!(
                "Invalid suggestion.api_base: '{}'. Must start with http:// or https://",
                self.suggestion.api_base
            )));
        }
        if self.suggestion.api_key_env.trim().is_empty() {
            return Err(LabelerError::ConfigError(
                "suggestion.api_key_env cannot be empty".to_string(),
            ));
        }
        if self.suggestion.max_labels == 0 || self.suggestion.max_labels > 10 {
            return Err(LabelerError::ConfigError(
                "suggestion.max_labels must be between 1 and 10".to_string(),
            ));
        }
        if let Some(fallback) = &self.suggestion.fallback_label {
            if !crate::suggester::is_valid_label_name(fallback) {
                return Err(LabelerError::ConfigError(format!(
                    "suggestion.fallback_label '{}' is not a usable label name",
                    fallback
                )));
            }
        }

        if !self.server.route.starts_with('/') {
            return Err(LabelerError::ConfigError(
                "server.route must start with '/'".to_string(),
            ));
        }

        tracing::debug!("Configuration validation passed");
        Ok(())
    }

    /// Read the generative-text API key from the configured environment variable.
    ///
    /// Fails when the variable is unset or blank.
    pub fn api_key(&self) -> Result<String> {
        let var = &self.suggestion.api_key_env;
        match std::env::var(var) {
            Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
            Ok(_) => Err(LabelerError::ConfigError(format!("{} is set but empty", var))),
            Err(_) => Err(LabelerError::ConfigError(format!("{} not set", var))),
        }
    }

    /// Create an example configuration file
    pub async fn create_example(path: &Path) -> Result<()> {
        let config = Self::default();
        config.save(path).await
    }
}
