//! Configuration loading, validation, and management for ConvoQuery.
//!
//! Loads configuration from `~/.convoquery/config.toml` with environment
//! variable overrides. Validates all settings before a run starts.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.convoquery/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Credential passed through to the completion service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Display name of the completion service
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Base URL of an OpenAI-compatible endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model requested for every completion
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Output-token cap per answer
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// HTTP timeout for a single completion call
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Admission control and pacing
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Prompt construction limits
    #[serde(default)]
    pub prompt: PromptConfig,

    /// Delimited input/output settings
    #[serde(default)]
    pub input: InputConfig,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.1
}
fn default_max_tokens() -> u32 {
    256
}
fn default_request_timeout_secs() -> u64 {
    60
}

/// Redact a secret for Debug output.
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
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("scheduler", &self.scheduler)
            .field("prompt", &self.prompt)
            .field("input", &self.input)
            .finish()
    }
}

/// Bounds on in-flight calls and the pacing schedule between them.
///
/// All durations are in milliseconds in the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Maximum simultaneously in-flight remote calls
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// How long a query waits for a free slot before it is skipped
    #[serde(default = "default_slot_wait_ms")]
    pub slot_wait_ms: u64,

    /// Delay before the first call of a streak
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Upper bound of the escalated per-call delay
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Consecutive calls allowed before a mandatory cooldown
    #[serde(default = "default_cooldown_after")]
    pub cooldown_after: u32,

    /// Length of the mandatory cooldown
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,

    /// Pause inserted after the service reports a rate limit
    #[serde(default = "default_rate_limit_cooldown_ms")]
    pub rate_limit_cooldown_ms: u64,

    /// Window during which a repeated notice is suppressed
    #[serde(default = "default_notice_window_ms")]
    pub notice_window_ms: u64,

    /// Pause between two sessions
    #[serde(default = "default_session_pause_ms")]
    pub session_pause_ms: u64,
}

fn default_max_concurrent() -> usize {
    3
}
fn default_slot_wait_ms() -> u64 {
    60_000
}
fn default_base_delay_ms() -> u64 {
    250
}
fn default_max_delay_ms() -> u64 {
    4_000
}
fn default_cooldown_after() -> u32 {
    10
}
fn default_cooldown_ms() -> u64 {
    5_000
}
fn default_rate_limit_cooldown_ms() -> u64 {
    20_000
}
fn default_notice_window_ms() -> u64 {
    10_000
}
fn default_session_pause_ms() -> u64 {
    100
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            slot_wait_ms: default_slot_wait_ms(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            cooldown_after: default_cooldown_after(),
            cooldown_ms: default_cooldown_ms(),
            rate_limit_cooldown_ms: default_rate_limit_cooldown_ms(),
            notice_window_ms: default_notice_window_ms(),
            session_pause_ms: default_session_pause_ms(),
        }
    }
}

impl SchedulerConfig {
    pub fn slot_wait(&self) -> Duration {
        Duration::from_millis(self.slot_wait_ms)
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn rate_limit_cooldown(&self) -> Duration {
        Duration::from_millis(self.rate_limit_cooldown_ms)
    }

    pub fn notice_window(&self) -> Duration {
        Duration::from_millis(self.notice_window_ms)
    }

    pub fn session_pause(&self) -> Duration {
        Duration::from_millis(self.session_pause_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Per-message content limit inside the transcript
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,

    /// Limit of the whole assembled transcript
    #[serde(default = "default_max_transcript_chars")]
    pub max_transcript_chars: usize,

    /// Output instruction used when a query has no format of its own
    #[serde(default = "default_output_format")]
    pub default_output_format: String,
}

fn default_max_content_chars() -> usize {
    500
}
fn default_max_transcript_chars() -> usize {
    12_000
}
fn default_output_format() -> String {
    "Give a plain, direct answer with no bullet points, prefixes, or formatting.".into()
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            max_content_chars: default_max_content_chars(),
            max_transcript_chars: default_max_transcript_chars(),
            default_output_format: default_output_format(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Field delimiter for the message, query and result tables
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

fn default_delimiter() -> char {
    ','
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.convoquery/config.toml).
    ///
    /// Environment variables override the file:
    /// - `CONVOQUERY_API_KEY`, then `OPENAI_API_KEY` (only when no key is configured)
    /// - `CONVOQUERY_MODEL`
    /// - `CONVOQUERY_BASE_URL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;
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

    /// Apply environment overrides through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = lookup("CONVOQUERY_API_KEY").or_else(|| lookup("OPENAI_API_KEY"));
        }

        if let Some(model) = lookup("CONVOQUERY_MODEL") {
            self.model = model;
        }

        if let Some(base_url) = lookup("CONVOQUERY_BASE_URL") {
            self.base_url = base_url;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".convoquery")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "max_tokens must be > 0".into(),
            ));
        }

        if self.scheduler.max_concurrent == 0 {
            return Err(ConfigError::ValidationError(
                "scheduler.max_concurrent must be at least 1".into(),
            ));
        }

        if self.scheduler.cooldown_after == 0 {
            return Err(ConfigError::ValidationError(
                "scheduler.cooldown_after must be at least 1".into(),
            ));
        }

        if self.scheduler.base_delay_ms > self.scheduler.max_delay_ms {
            return Err(ConfigError::ValidationError(
                "scheduler.base_delay_ms must not exceed scheduler.max_delay_ms".into(),
            ));
        }

        if self.prompt.max_content_chars == 0 || self.prompt.max_transcript_chars == 0 {
            return Err(ConfigError::ValidationError(
                "prompt limits must be > 0".into(),
            ));
        }

        if !self.input.delimiter.is_ascii() {
            return Err(ConfigError::ValidationError(
                "input.delimiter must be a single ASCII character".into(),
            ));
        }

        Ok(())
    }

    /// Whether a non-blank credential is available.
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Generate a default config TOML string (for the `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider: default_provider(),
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            request_timeout_secs: default_request_timeout_secs(),
            scheduler: SchedulerConfig::default(),
            prompt: PromptConfig::default(),
            input: InputConfig::default(),
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
