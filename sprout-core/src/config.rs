use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use crate::error::SproutError;
use crate::gemini::GeminiConfig;
use crate::session::InFlightPolicy;

/// Environment variable consulted when `[gemini] api_key` is absent.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Environment variable consulted when `[gemini] model` is absent.
pub const MODEL_ENV: &str = "GEMINI_MODEL";

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Deserialize, Clone)]
pub struct SproutConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub gemini: GeminiSection,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServiceConfig {
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeminiSection {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Request timeout for the remote call. Zero disables the timeout.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for GeminiSection {
    fn default() -> Self {
        Self {
            api_key: None,
            model: None,
            base_url: default_base_url(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_seconds() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8787,
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SessionConfig {
    #[serde(default)]
    pub in_flight_policy: InFlightPolicy,
}

impl SproutConfig {
    /// Load from a TOML file, with `SPROUT__SECTION__KEY` environment overrides.
    pub fn load(path: &str) -> Result<Self, SproutError> {
        let s = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("SPROUT").separator("__"))
            .build()?;
        Ok(s.try_deserialize()?)
    }

    pub fn from_toml_str(toml: &str) -> Result<Self, SproutError> {
        let s = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;
        Ok(s.try_deserialize()?)
    }

    /// Resolve the credential and model (falling back to the environment) and
    /// fail if either is missing. Called once at startup.
    pub fn validate(&self) -> Result<GeminiConfig, SproutError> {
        self.gemini_config_with(|key| std::env::var(key).ok())
    }

    pub(crate) fn gemini_config_with(
        &self,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<GeminiConfig, SproutError> {
        let api_key = non_empty(self.gemini.api_key.clone())
            .or_else(|| non_empty(env(API_KEY_ENV)))
            .ok_or_else(|| {
                SproutError::InvalidConfig(format!(
                    "no Gemini API key: set [gemini] api_key or {}",
                    API_KEY_ENV
                ))
            })?;

        let model = non_empty(self.gemini.model.clone())
            .or_else(|| non_empty(env(MODEL_ENV)))
            .ok_or_else(|| {
                SproutError::InvalidConfig(format!(
                    "no Gemini model: set [gemini] model or {}",
                    MODEL_ENV
                ))
            })?;

        if self.http.max_upload_bytes == 0 {
            return Err(SproutError::InvalidConfig(
                "http.max_upload_bytes must be greater than zero".to_string(),
            ));
        }

        Ok(GeminiConfig {
            api_key,
            model,
            base_url: self.gemini.base_url.trim_end_matches('/').to_string(),
            timeout_seconds: self.gemini.timeout_seconds,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
