//! Configuration module for the Gemini Live client
//!
//! Configuration comes from environment variables (after `.env` is loaded by
//! the binary) and optionally a YAML file. Priority: YAML > ENV vars > .env
//! values > defaults.
//!
//! # Example
//! ```rust,no_run
//! use gemini_live_client::config::LiveConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = LiveConfig::from_env()?;
//!
//! // Load from YAML file with environment variable base
//! let config = LiveConfig::from_file(&PathBuf::from("config.yaml"))?;
//! println!("Using model {}", config.session.model);
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use crate::core::realtime::{GeminiLiveConfig, RealtimeError, ReconnectionConfig, ResponseModality};

mod yaml;

pub use yaml::{GeminiYaml, ReconnectionYaml, YamlConfig};

/// Environment variable names.
pub const ENV_API_KEY: &str = "GEMINI_API_KEY";
pub const ENV_URL: &str = "GEMINI_LIVE_URL";
pub const ENV_MODEL: &str = "GEMINI_MODEL";
pub const ENV_RESPONSE_MODALITY: &str = "GEMINI_RESPONSE_MODALITY";
pub const ENV_SYSTEM_INSTRUCTION: &str = "GEMINI_SYSTEM_INSTRUCTION";
pub const ENV_CONNECT_TIMEOUT_MS: &str = "GEMINI_CONNECT_TIMEOUT_MS";
pub const ENV_RECONNECT_MAX_ATTEMPTS: &str = "GEMINI_RECONNECT_MAX_ATTEMPTS";
pub const ENV_RECONNECT_INITIAL_DELAY_MS: &str = "GEMINI_RECONNECT_INITIAL_DELAY_MS";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("GEMINI_API_KEY is not set and no api_key was configured")]
    MissingApiKey,

    #[error("Invalid value for {name}: '{value}'")]
    InvalidValue { name: &'static str, value: String },

    #[error("Failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] RealtimeError),
}

/// Client configuration
///
/// Holds the provider name and the session configuration handed to the
/// realtime provider factory.
#[derive(Debug, Clone)]
pub struct LiveConfig {
    /// Realtime provider name passed to `create_realtime_provider`
    pub provider: String,
    /// Session configuration
    pub session: GeminiLiveConfig,
}

impl LiveConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if `GEMINI_API_KEY` is missing, a numeric variable
    /// does not parse, or the resulting session config is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self::merge(None)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let yaml_config = YamlConfig::from_file(path)?;
        let config = Self::merge(Some(yaml_config))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.session.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        self.session.validate()?;
        Ok(())
    }

    fn merge(yaml: Option<YamlConfig>) -> Result<Self, ConfigError> {
        let mut session = GeminiLiveConfig::default();

        // Environment base
        if let Some(key) = env_string(ENV_API_KEY) {
            session.api_key = key;
        }
        if let Some(url) = env_string(ENV_URL) {
            session.url = url;
        }
        if let Some(model) = env_string(ENV_MODEL) {
            session.model = model;
        }
        if let Some(modality) = env_string(ENV_RESPONSE_MODALITY) {
            session.response_modality = ResponseModality::from_str_or_default(&modality);
        }
        session.system_instruction = env_string(ENV_SYSTEM_INSTRUCTION);
        if let Some(timeout) = env_parse(ENV_CONNECT_TIMEOUT_MS)? {
            session.connection_timeout_ms = timeout;
        }
        if let Some(max_attempts) = env_parse(ENV_RECONNECT_MAX_ATTEMPTS)? {
            session.reconnection.max_attempts = max_attempts;
        }
        if let Some(delay) = env_parse(ENV_RECONNECT_INITIAL_DELAY_MS)? {
            session.reconnection.initial_delay_ms = delay;
        }

        let mut provider = "gemini".to_string();

        // YAML overrides
        if let Some(yaml) = yaml {
            if let Some(name) = yaml.provider {
                provider = name;
            }
            if let Some(gemini) = yaml.gemini {
                apply_gemini_yaml(&mut session, gemini);
            }
            if let Some(reconnection) = yaml.reconnection {
                apply_reconnection_yaml(&mut session.reconnection, reconnection);
            }
            if yaml.setup.is_some() {
                session.setup = yaml.setup;
            }
        }

        Ok(Self { provider, session })
    }
}

fn apply_gemini_yaml(session: &mut GeminiLiveConfig, gemini: GeminiYaml) {
    if let Some(name) = gemini.name {
        session.name = name;
    }
    if let Some(key) = gemini.api_key {
        session.api_key = key;
    }
    if let Some(url) = gemini.url {
        session.url = url;
    }
    if let Some(model) = gemini.model {
        session.model = model;
    }
    if let Some(modality) = gemini.response_modality {
        session.response_modality = ResponseModality::from_str_or_default(&modality);
    }
    if gemini.system_instruction.is_some() {
        session.system_instruction = gemini.system_instruction;
    }
    if let Some(timeout) = gemini.connect_timeout_ms {
        session.connection_timeout_ms = timeout;
    }
}

fn apply_reconnection_yaml(policy: &mut ReconnectionConfig, yaml: ReconnectionYaml) {
    if let Some(enabled) = yaml.enabled {
        policy.enabled = enabled;
    }
    if let Some(max_attempts) = yaml.max_attempts {
        policy.max_attempts = max_attempts;
    }
    if let Some(delay) = yaml.initial_delay_ms {
        policy.initial_delay_ms = delay;
    }
    if let Some(delay) = yaml.max_delay_ms {
        policy.max_delay_ms = delay;
    }
    if let Some(multiplier) = yaml.backoff_multiplier {
        policy.backoff_multiplier = multiplier;
    }
}

/// Non-empty environment variable value.
fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    env_string(name)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue { name, value })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    const ALL_VARS: [&str; 8] = [
        ENV_API_KEY,
        ENV_URL,
        ENV_MODEL,
        ENV_RESPONSE_MODALITY,
        ENV_SYSTEM_INSTRUCTION,
        ENV_CONNECT_TIMEOUT_MS,
        ENV_RECONNECT_MAX_ATTEMPTS,
        ENV_RECONNECT_INITIAL_DELAY_MS,
    ];

    fn cleanup_env_vars() {
        for name in ALL_VARS {
            // SAFETY: tests touching the environment run under #[serial]
            unsafe { std::env::remove_var(name) };
        }
    }

    fn set_env(name: &str, value: &str) {
        // SAFETY: tests touching the environment run under #[serial]
        unsafe { std::env::set_var(name, value) };
    }

    #[test]
    #[serial]
    fn test_from_env_requires_api_key() {
        cleanup_env_vars();
        assert!(matches!(
            LiveConfig::from_env(),
            Err(ConfigError::MissingApiKey)
        ));
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        cleanup_env_vars();
        set_env(ENV_API_KEY, "env-key");

        let config = LiveConfig::from_env().unwrap();
        assert_eq!(config.provider, "gemini");
        assert_eq!(config.session.api_key, "env-key");
        assert_eq!(config.session.model, "gemini-2.0-flash-exp");
        assert_eq!(config.session.connection_timeout_ms, 10_000);
        assert_eq!(config.session.reconnection, ReconnectionConfig::default());
        assert!(config.session.system_instruction.is_none());

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_all_values() {
        cleanup_env_vars();
        set_env(ENV_API_KEY, "env-key");
        set_env(ENV_URL, "ws://127.0.0.1:9000/live");
        set_env(ENV_MODEL, "gemini-exp");
        set_env(ENV_RESPONSE_MODALITY, "TEXT");
        set_env(ENV_SYSTEM_INSTRUCTION, "Be brief.");
        set_env(ENV_CONNECT_TIMEOUT_MS, "2500");
        set_env(ENV_RECONNECT_MAX_ATTEMPTS, "5");
        set_env(ENV_RECONNECT_INITIAL_DELAY_MS, "100");

        let config = LiveConfig::from_env().unwrap();
        assert_eq!(config.session.url, "ws://127.0.0.1:9000/live");
        assert_eq!(config.session.model, "gemini-exp");
        assert_eq!(config.session.response_modality, ResponseModality::Text);
        assert_eq!(
            config.session.system_instruction.as_deref(),
            Some("Be brief.")
        );
        assert_eq!(config.session.connection_timeout_ms, 2500);
        assert_eq!(config.session.reconnection.max_attempts, 5);
        assert_eq!(config.session.reconnection.initial_delay_ms, 100);

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_invalid_number() {
        cleanup_env_vars();
        set_env(ENV_API_KEY, "env-key");
        set_env(ENV_CONNECT_TIMEOUT_MS, "soon");

        match LiveConfig::from_env() {
            Err(ConfigError::InvalidValue { name, value }) => {
                assert_eq!(name, ENV_CONNECT_TIMEOUT_MS);
                assert_eq!(value, "soon");
            }
            other => panic!("Expected InvalidValue, got {other:?}"),
        }

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_invalid_url() {
        cleanup_env_vars();
        set_env(ENV_API_KEY, "env-key");
        set_env(ENV_URL, "http://example.com");

        assert!(matches!(
            LiveConfig::from_env(),
            Err(ConfigError::Invalid(RealtimeError::InvalidConfiguration(_)))
        ));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_overrides_env() {
        cleanup_env_vars();
        set_env(ENV_API_KEY, "env-key");
        set_env(ENV_MODEL, "env-model");

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(
            &config_path,
            r#"
gemini:
  model: "yaml-model"
  response_modality: "text"
reconnection:
  max_attempts: 7
setup:
  model: "models/verbatim"
"#,
        )
        .unwrap();

        let config = LiveConfig::from_file(&config_path).unwrap();
        assert_eq!(config.session.api_key, "env-key");
        assert_eq!(config.session.model, "yaml-model");
        assert_eq!(config.session.response_modality, ResponseModality::Text);
        assert_eq!(config.session.reconnection.max_attempts, 7);
        assert_eq!(config.session.reconnection.initial_delay_ms, 1000);
        assert_eq!(config.session.setup_payload()["model"], "models/verbatim");

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_supplies_api_key() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(&config_path, "gemini:\n  api_key: \"yaml-key\"\n").unwrap();

        let config = LiveConfig::from_file(&config_path).unwrap();
        assert_eq!(config.session.api_key, "yaml-key");
    }
}
