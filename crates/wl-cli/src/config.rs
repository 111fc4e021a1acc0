//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use wl_llm::Provider;

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Inactivity gap in minutes that splits two work sessions.
    pub gap_minutes: i64,
    /// Provider used for AI summaries.
    pub provider: Provider,
    /// Model override; the provider default is used when unset.
    pub model: Option<String>,
    pub temperature: f32,
    /// Endpoint override for OpenAI-compatible gateways.
    pub api_url: Option<String>,
    pub deepseek_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    /// Replaces the built-in summary prompt.
    pub system_prompt: Option<String>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |key: &Option<String>| key.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("Config")
            .field("gap_minutes", &self.gap_minutes)
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("api_url", &self.api_url)
            .field("deepseek_api_key", &redact(&self.deepseek_api_key))
            .field("openai_api_key", &redact(&self.openai_api_key))
            .field("system_prompt", &self.system_prompt.is_some())
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gap_minutes: 60,
            provider: Provider::default(),
            model: None,
            temperature: 0.3,
            api_url: None,
            deepseek_api_key: None,
            openai_api_key: None,
            system_prompt: None,
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (WL_*)
        figment = figment.merge(Env::prefixed("WL_"));

        figment.extract()
    }

    /// API key for `provider`, falling back to its conventional env var.
    pub fn api_key(&self, provider: Provider) -> Option<String> {
        let configured = match provider {
            Provider::DeepSeek => self.deepseek_api_key.clone(),
            Provider::OpenAi => self.openai_api_key.clone(),
        };
        configured
            .or_else(|| std::env::var(provider.api_key_env()).ok())
            .filter(|key| !key.trim().is_empty())
    }

    /// Endpoint for `provider`, honoring `api_url` when set.
    pub fn endpoint(&self, provider: Provider) -> String {
        self.api_url
            .clone()
            .unwrap_or_else(|| provider.default_endpoint().to_string())
    }
}

/// Returns the platform-specific config directory for wl.
///
/// On Linux: `~/.config/wl`
pub fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("wl"))
}
