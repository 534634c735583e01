use serde::Deserialize;
use std::path::PathBuf;

use super::ConfigError;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present
/// here override the ones read from environment variables.
///
/// # Example YAML structure
/// ```yaml
/// provider: "gemini"
///
/// gemini:
///   name: "GeminiLive"
///   api_key: "your-api-key"
///   url: "wss://generativelanguage.googleapis.com/ws/..."
///   model: "gemini-2.0-flash-exp"
///   response_modality: "audio"
///   system_instruction: "You are a helpful assistant."
///   connect_timeout_ms: 10000
///
/// reconnection:
///   enabled: true
///   max_attempts: 3
///   initial_delay_ms: 1000
///   max_delay_ms: 30000
///   backoff_multiplier: 2.0
///
/// # Sent verbatim as the setup frame payload when present
/// setup:
///   model: "models/gemini-2.0-flash-exp"
///   generationConfig:
///     responseModalities: "audio"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub provider: Option<String>,
    pub gemini: Option<GeminiYaml>,
    pub reconnection: Option<ReconnectionYaml>,
    pub setup: Option<serde_json::Value>,
}

/// Gemini session settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct GeminiYaml {
    pub name: Option<String>,
    pub api_key: Option<String>,
    pub url: Option<String>,
    pub model: Option<String>,
    pub response_modality: Option<String>,
    pub system_instruction: Option<String>,
    pub connect_timeout_ms: Option<u64>,
}

/// Reconnection policy from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ReconnectionYaml {
    pub enabled: Option<bool>,
    pub max_attempts: Option<u32>,
    pub initial_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub backoff_multiplier: Option<f32>,
}

impl YamlConfig {
    /// Load YAML configuration from a file
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        Ok(serde_yaml::from_str(&contents)?)
    }
}
