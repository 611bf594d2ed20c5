//! Configuration loading, validation, and management for Parley.
//!
//! Loads configuration from `~/.parley/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.parley/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the OpenAI-compatible endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Model identifiers per role
    #[serde(default)]
    pub models: ModelsConfig,

    /// Retry schedule for model calls
    #[serde(default)]
    pub retry: RetryConfig,

    /// Context window and memory policy
    #[serde(default)]
    pub context: ContextConfig,

    /// Model-driven tool routing
    #[serde(default)]
    pub router: RouterConfig,

    /// Built-in tool settings
    #[serde(default)]
    pub tools: ToolsConfig,
}

fn default_api_url() -> String {
    "https://openrouter.ai/api/v1".into()
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
            .field("api_url", &self.api_url)
            .field("models", &self.models)
            .field("retry", &self.retry)
            .field("context", &self.context)
            .field("router", &self.router)
            .field("tools", &self.tools)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Default model for conversation
    #[serde(default = "default_chat_model")]
    pub chat: String,

    /// Model used to build structured memory on demand
    #[serde(default = "default_summary_model")]
    pub summary: String,

    /// Lightweight model that selects tools
    #[serde(default = "default_router_model")]
    pub router: String,

    /// Tried after the preferred model yields nothing
    #[serde(default = "default_fallback_model")]
    pub fallback: String,
}

fn default_chat_model() -> String {
    "mistralai/mistral-small-3.1-24b-instruct:free".into()
}
fn default_summary_model() -> String {
    "openai/gpt-oss-120b:free".into()
}
fn default_router_model() -> String {
    "google/gemma-3-12b-it:free".into()
}
fn default_fallback_model() -> String {
    "google/gemini-2.0-flash-lite-preview-02-05:free".into()
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            chat: default_chat_model(),
            summary: default_summary_model(),
            router: default_router_model(),
            fallback: default_fallback_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Per-attempt timeouts in seconds, ascending; one attempt per entry
    #[serde(default = "default_timeouts")]
    pub timeouts_secs: Vec<u64>,
}

fn default_timeouts() -> Vec<u64> {
    vec![60, 120, 300]
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            timeouts_secs: default_timeouts(),
        }
    }
}

impl RetryConfig {
    pub fn timeouts(&self) -> Vec<Duration> {
        self.timeouts_secs.iter().map(|s| Duration::from_secs(*s)).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// A background summary runs each time the turn count crosses a multiple of this
    #[serde(default = "default_summary_interval")]
    pub summary_interval: usize,

    /// Advisory token budget for memory + recent turns
    #[serde(default = "default_max_window_tokens")]
    pub max_window_tokens: usize,

    /// Used when a conversation has no instructions of its own
    #[serde(default = "default_system_prompt")]
    pub default_system_prompt: String,
}

fn default_summary_interval() -> usize {
    6
}
fn default_max_window_tokens() -> usize {
    2000
}
/// Instructions used when a conversation has none of its own.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant. Answer clearly and concisely.";

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.into()
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            summary_interval: default_summary_interval(),
            max_window_tokens: default_max_window_tokens(),
            default_system_prompt: default_system_prompt(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Ask the router model which tools to run for plain (non-command) input
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// IANA timezone for the datetime tool
    #[serde(default = "default_timezone")]
    pub timezone: String,

    #[serde(default = "default_geocoding_url")]
    pub geocoding_url: String,

    #[serde(default = "default_forecast_url")]
    pub forecast_url: String,

    /// Per-request timeout for tool HTTP calls
    #[serde(default = "default_tool_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timezone() -> String {
    "Europe/Paris".into()
}
fn default_geocoding_url() -> String {
    "https://geocoding-api.open-meteo.com/v1/search".into()
}
fn default_forecast_url() -> String {
    "https://api.open-meteo.com/v1/forecast".into()
}
fn default_tool_timeout_secs() -> u64 {
    10
}

impl ToolsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            geocoding_url: default_geocoding_url(),
            forecast_url: default_forecast_url(),
            timeout_secs: default_tool_timeout_secs(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.parley/config.toml).
    ///
    /// Also checks environment variables:
    /// - `PARLEY_API_KEY` (highest priority), then `OPENROUTER_API_KEY`
    /// - `PARLEY_CHAT_MODEL`, `PARLEY_SUMMARY_MODEL`, `PARLEY_ROUTER_MODEL`,
    ///   `PARLEY_FALLBACK_MODEL`
    /// - `PARLEY_ROUTER_ENABLED` (`true` / `false`)
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
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

    /// Apply overrides from a variable lookup (the process environment in `load`).
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(key) = var("PARLEY_API_KEY").or_else(|| var("OPENROUTER_API_KEY")) {
            self.api_key = Some(key);
        }
        if let Some(model) = var("PARLEY_CHAT_MODEL") {
            self.models.chat = model;
        }
        if let Some(model) = var("PARLEY_SUMMARY_MODEL") {
            self.models.summary = model;
        }
        if let Some(model) = var("PARLEY_ROUTER_MODEL") {
            self.models.router = model;
        }
        if let Some(model) = var("PARLEY_FALLBACK_MODEL") {
            self.models.fallback = model;
        }
        if let Some(flag) = var("PARLEY_ROUTER_ENABLED") {
            self.router.enabled = flag.eq_ignore_ascii_case("true");
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".parley")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        let timeouts = &self.retry.timeouts_secs;
        if timeouts.is_empty() {
            return Err(ConfigError::ValidationError(
                "retry.timeouts_secs must contain at least one attempt".into(),
            ));
        }
        if timeouts.iter().any(|t| *t == 0) || timeouts.windows(2).any(|w| w[0] > w[1]) {
            return Err(ConfigError::ValidationError(
                "retry.timeouts_secs must be positive and ascending".into(),
            ));
        }

        if self.context.summary_interval < 2 {
            return Err(ConfigError::ValidationError(
                "context.summary_interval must be at least 2".into(),
            ));
        }

        if self.context.max_window_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "context.max_window_tokens must be > 0".into(),
            ));
        }

        if self.tools.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "tools.timeout_secs must be > 0".into(),
            ));
        }

        if self.tools.timezone.parse::<chrono_tz::Tz>().is_err() {
            return Err(ConfigError::ValidationError(format!(
                "tools.timezone '{}' is not a known IANA timezone",
                self.tools.timezone
            )));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
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
            api_url: default_api_url(),
            models: ModelsConfig::default(),
            retry: RetryConfig::default(),
            context: ContextConfig::default(),
            router: RouterConfig::default(),
            tools: ToolsConfig::default(),
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.retry.timeouts_secs, vec![60, 120, 300]);
        assert_eq!(config.context.summary_interval, 6);
        assert!(!config.router.enabled);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.models.chat, config.models.chat);
        assert_eq!(parsed.tools.timezone, config.tools.timezone);
    }

    #[test]
    fn descending_timeouts_rejected() {
        let config = AppConfig {
            retry: RetryConfig {
                timeouts_secs: vec![120, 60],
            },
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_timeouts_rejected() {
        let config = AppConfig {
            retry: RetryConfig {
                timeouts_secs: vec![],
            },
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_tool_timeout_rejected() {
        let mut config = AppConfig::default();
        assert_eq!(config.tools.timeout_secs, 10);
        config.tools.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_timezone_rejected() {
        let mut config = AppConfig::default();
        config.tools.timezone = "Mars/Olympus_Mons".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().api_url, "https://openrouter.ai/api/v1");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[context]\nsummary_interval = 10\n\n[router]\nenabled = true\n",
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.context.summary_interval, 10);
        assert_eq!(config.context.max_window_tokens, 2000);
        assert!(config.router.enabled);
        assert_eq!(config.models.fallback, default_fallback_model());
    }

    #[test]
    fn env_overrides_apply() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("OPENROUTER_API_KEY", "sk-or-test"),
            ("PARLEY_CHAT_MODEL", "my/model"),
            ("PARLEY_ROUTER_ENABLED", "TRUE"),
        ]);
        let mut config = AppConfig::default();
        config.apply_env(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.api_key.as_deref(), Some("sk-or-test"));
        assert_eq!(config.models.chat, "my/model");
        assert!(config.router.enabled);
        assert_eq!(config.models.router, default_router_model());
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = AppConfig {
            api_key: Some("sk-secret".into()),
            ..AppConfig::default()
        };
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("sk-secret"));
        assert!(dbg.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("openrouter.ai"));
        assert!(toml_str.contains("summary_interval"));
    }
}
