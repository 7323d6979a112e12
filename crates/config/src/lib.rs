//! Configuration loading, validation, and management for DeskPilot.
//!
//! Loads configuration from `~/.deskpilot/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use deskpilot_core::provider::ApiProvider;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.deskpilot/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Which hosted API serves the model
    #[serde(default)]
    pub provider: ApiProvider,

    /// Model override; the provider's default model when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Token budget per model response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Appended to the built-in system prompt
    #[serde(default)]
    pub system_prompt_suffix: String,

    /// Keep at most this many screenshots in the conversation (unset = keep all)
    #[serde(default = "default_images_to_keep")]
    pub only_n_most_recent_images: Option<usize>,

    /// Screenshots are dropped in batches of this size
    #[serde(default = "default_removal_batch")]
    pub image_removal_batch: usize,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Insight log settings
    #[serde(default)]
    pub insights: InsightsConfig,

    /// Screenshot artifact settings
    #[serde(default)]
    pub screenshots: ScreenshotsConfig,

    /// Front-end retry policy for failed runs
    #[serde(default)]
    pub retry: RetryConfig,

    /// Display geometry for the computer tool
    #[serde(default)]
    pub display: DisplayConfig,
}

fn default_max_tokens() -> u32 {
    4096
}
fn default_images_to_keep() -> Option<usize> {
    Some(10)
}
fn default_removal_batch() -> usize {
    10
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("system_prompt_suffix", &self.system_prompt_suffix)
            .field("only_n_most_recent_images", &self.only_n_most_recent_images)
            .field("image_removal_batch", &self.image_removal_batch)
            .field("providers", &self.providers)
            .field("insights", &self.insights)
            .field("screenshots", &self.screenshots)
            .field("retry", &self.retry)
            .field("display", &self.display)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("vertex_project", &self.vertex_project)
            .field("vertex_region", &self.vertex_region)
            .finish()
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Endpoint override (required for Bedrock: a Messages-API signing proxy)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vertex_project: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vertex_region: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightsConfig {
    #[serde(default = "default_insights_path")]
    pub path: PathBuf,

    /// Derive one insight every N tool actions
    #[serde(default = "default_every_n_actions")]
    pub every_n_actions: u64,
}

fn default_insights_path() -> PathBuf {
    PathBuf::from("insights.md")
}
fn default_every_n_actions() -> u64 {
    5
}

impl Default for InsightsConfig {
    fn default() -> Self {
        Self {
            path: default_insights_path(),
            every_n_actions: default_every_n_actions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenshotsConfig {
    #[serde(default = "default_screenshots_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_retention_hours")]
    pub retention_hours: u64,
}

fn default_screenshots_dir() -> PathBuf {
    PathBuf::from("screenshots")
}
fn default_retention_hours() -> u64 {
    4
}

impl Default for ScreenshotsConfig {
    fn default() -> Self {
        Self {
            dir: default_screenshots_dir(),
            retention_hours: default_retention_hours(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_delay_secs")]
    pub delay_secs: u64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_delay_secs() -> u64 {
    5
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_secs: default_delay_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_height")]
    pub height: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_number: Option<u32>,
}

fn default_width() -> u32 {
    1280
}
fn default_height() -> u32 {
    800
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            display_number: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.deskpilot/config.toml).
    ///
    /// Also checks environment variables:
    /// - `DESKPILOT_API_KEY` (highest priority), then `ANTHROPIC_API_KEY`
    /// - `DESKPILOT_PROVIDER`
    /// - `DESKPILOT_MODEL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through a lookup function.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(key) = lookup("DESKPILOT_API_KEY") {
            self.api_key = Some(key);
        } else if self.api_key.is_none() {
            self.api_key = lookup("ANTHROPIC_API_KEY");
        }

        if let Some(provider) = lookup("DESKPILOT_PROVIDER") {
            self.provider = provider
                .parse()
                .map_err(ConfigError::ValidationError)?;
        }

        if let Some(model) = lookup("DESKPILOT_MODEL") {
            self.model = Some(model);
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".deskpilot")
    }

    /// The model to call: explicit override or the provider's default.
    pub fn effective_model(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| self.provider.default_model().to_string())
    }

    /// Settings for the selected provider, if any.
    pub fn provider_settings(&self) -> Option<&ProviderConfig> {
        self.providers.get(self.provider.as_str())
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_tokens == 0 {
            return Err(ConfigError::ValidationError("max_tokens must be > 0".into()));
        }
        if self.image_removal_batch == 0 {
            return Err(ConfigError::ValidationError(
                "image_removal_batch must be > 0".into(),
            ));
        }
        if self.insights.every_n_actions == 0 {
            return Err(ConfigError::ValidationError(
                "insights.every_n_actions must be > 0".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "retry.max_attempts must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
            || self
                .provider_settings()
                .is_some_and(|p| p.api_key.is_some())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider: ApiProvider::default(),
            model: None,
            max_tokens: default_max_tokens(),
            system_prompt_suffix: String::new(),
            only_n_most_recent_images: default_images_to_keep(),
            image_removal_batch: default_removal_batch(),
            providers: HashMap::new(),
            insights: InsightsConfig::default(),
            screenshots: ScreenshotsConfig::default(),
            retry: RetryConfig::default(),
            display: DisplayConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
