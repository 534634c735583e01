//! Gemini Live configuration types.
//!
//! # Example
//!
//! ```rust,ignore
//! use gemini_live_client::core::realtime::gemini::GeminiLiveConfig;
//!
//! let config = GeminiLiveConfig::new("your-api-key")
//!     .with_model("gemini-2.0-flash-exp")
//!     .with_system_instruction("You are a helpful assistant.");
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::core::realtime::base::{RealtimeError, RealtimeResult, ReconnectionConfig};

/// Default Gemini Live WebSocket endpoint (without credentials).
pub const GEMINI_LIVE_URL: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1alpha.GenerativeService.BidiGenerateContent";

/// Default model used when none is configured.
pub const GEMINI_DEFAULT_MODEL: &str = "gemini-2.0-flash-exp";

/// Time allowed for the socket to open.
pub const DEFAULT_CONNECTION_TIMEOUT_MS: u64 = 10_000;

/// Default client name used in log lines.
pub const DEFAULT_CLIENT_NAME: &str = "GeminiLive";

// =============================================================================
// Response Modality
// =============================================================================

/// Output modality requested from the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseModality {
    /// Spoken responses delivered as PCM chunks
    #[default]
    Audio,
    /// Text responses
    Text,
}

impl ResponseModality {
    /// Wire value.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseModality::Audio => "audio",
            ResponseModality::Text => "text",
        }
    }

    /// Parse from a string, falling back to audio.
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "text" => ResponseModality::Text,
            _ => ResponseModality::Audio,
        }
    }
}

// =============================================================================
// Session Config
// =============================================================================

/// Immutable session configuration for a Gemini Live client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiLiveConfig {
    /// Name used in log lines
    pub name: String,
    /// WebSocket endpoint without the `key` query parameter
    pub url: String,
    /// API key appended as `?key=`
    pub api_key: String,
    /// Model id, with or without the `models/` prefix
    pub model: String,
    /// Requested output modality
    pub response_modality: ResponseModality,
    /// Optional system instruction
    pub system_instruction: Option<String>,
    /// Verbatim setup payload; overrides the one derived from the fields above
    pub setup: Option<serde_json::Value>,
    /// Socket open timeout in milliseconds
    pub connection_timeout_ms: u64,
    /// Reconnection policy
    pub reconnection: ReconnectionConfig,
}

impl Default for GeminiLiveConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_CLIENT_NAME.to_string(),
            url: GEMINI_LIVE_URL.to_string(),
            api_key: String::new(),
            model: GEMINI_DEFAULT_MODEL.to_string(),
            response_modality: ResponseModality::default(),
            system_instruction: None,
            setup: None,
            connection_timeout_ms: DEFAULT_CONNECTION_TIMEOUT_MS,
            reconnection: ReconnectionConfig::default(),
        }
    }
}

impl GeminiLiveConfig {
    /// Create a config for the default endpoint.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    /// Set the client name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the endpoint URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the response modality.
    pub fn with_response_modality(mut self, modality: ResponseModality) -> Self {
        self.response_modality = modality;
        self
    }

    /// Set the system instruction.
    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    /// Use a verbatim setup payload.
    pub fn with_setup(mut self, setup: serde_json::Value) -> Self {
        self.setup = Some(setup);
        self
    }

    /// Set the socket open timeout.
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the reconnection policy.
    pub fn with_reconnection(mut self, reconnection: ReconnectionConfig) -> Self {
        self.reconnection = reconnection;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> RealtimeResult<()> {
        if self.api_key.trim().is_empty() {
            return Err(RealtimeError::AuthenticationFailed(
                "API key is required".to_string(),
            ));
        }

        let url = Url::parse(&self.url)
            .map_err(|e| RealtimeError::InvalidConfiguration(format!("invalid URL: {e}")))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(RealtimeError::InvalidConfiguration(format!(
                "unsupported URL scheme '{}', expected ws or wss",
                url.scheme()
            )));
        }

        if self.connection_timeout_ms == 0 {
            return Err(RealtimeError::InvalidConfiguration(
                "connection timeout must be greater than zero".to_string(),
            ));
        }

        if self.setup.as_ref().is_some_and(|s| !s.is_object()) {
            return Err(RealtimeError::InvalidConfiguration(
                "setup payload must be a JSON object".to_string(),
            ));
        }

        Ok(())
    }

    /// Socket open timeout.
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    /// Model name in `models/<id>` form.
    pub fn model_path(&self) -> String {
        if self.model.starts_with("models/") {
            self.model.clone()
        } else {
            format!("models/{}", self.model)
        }
    }

    /// Build the WebSocket URL including the API key.
    pub fn build_websocket_url(&self) -> RealtimeResult<String> {
        let mut url = Url::parse(&self.url)
            .map_err(|e| RealtimeError::InvalidConfiguration(format!("invalid URL: {e}")))?;
        url.query_pairs_mut().append_pair("key", &self.api_key);
        Ok(url.to_string())
    }

    /// The endpoint with the credential stripped, for log lines.
    pub fn redacted_url(&self) -> &str {
        self.url.split('?').next().unwrap_or(&self.url)
    }

    /// The payload sent in the setup frame.
    pub fn setup_payload(&self) -> serde_json::Value {
        if let Some(setup) = &self.setup {
            return setup.clone();
        }

        let mut setup = serde_json::json!({
            "model": self.model_path(),
            "generationConfig": {
                "responseModalities": self.response_modality.as_str(),
            },
        });
        if let Some(instruction) = &self.system_instruction {
            setup["systemInstruction"] = serde_json::json!({
                "parts": [{ "text": instruction }],
            });
        }
        setup
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GeminiLiveConfig::default();
        assert_eq!(config.name, "GeminiLive");
        assert_eq!(config.url, GEMINI_LIVE_URL);
        assert_eq!(config.connection_timeout_ms, 10_000);
        assert_eq!(config.reconnection.max_attempts, 3);
    }

    #[test]
    fn test_validate_requires_api_key() {
        let config = GeminiLiveConfig::default();
        match config.validate() {
            Err(RealtimeError::AuthenticationFailed(msg)) => {
                assert!(msg.contains("API key is required"));
            }
            other => panic!("Expected AuthenticationFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_http_scheme() {
        let config = GeminiLiveConfig::new("key").with_url("https://example.com/live");
        assert!(matches!(
            config.validate(),
            Err(RealtimeError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_connection_timeout_saturates() {
        let config = GeminiLiveConfig::new("key").with_connection_timeout(Duration::MAX);
        assert_eq!(config.connection_timeout_ms, u64::MAX);

        let config =
            GeminiLiveConfig::new("key").with_connection_timeout(Duration::from_millis(250));
        assert_eq!(config.connection_timeout_ms, 250);
    }

    #[test]
    fn test_validate_rejects_non_object_setup() {
        let config = GeminiLiveConfig::new("key").with_setup(serde_json::json!("nope"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_build_websocket_url_appends_key() {
        let config = GeminiLiveConfig::new("secret-key");
        let url = config.build_websocket_url().unwrap();
        assert!(url.starts_with("wss://generativelanguage.googleapis.com/ws/"));
        assert!(url.ends_with("BidiGenerateContent?key=secret-key"));
        assert!(!config.redacted_url().contains("secret-key"));
    }

    #[test]
    fn test_model_path() {
        let config = GeminiLiveConfig::new("k").with_model("gemini-2.0-flash-exp");
        assert_eq!(config.model_path(), "models/gemini-2.0-flash-exp");

        let config = GeminiLiveConfig::new("k").with_model("models/custom");
        assert_eq!(config.model_path(), "models/custom");
    }

    #[test]
    fn test_default_setup_payload() {
        let config = GeminiLiveConfig::new("k")
            .with_response_modality(ResponseModality::Text)
            .with_system_instruction("Be brief.");
        let setup = config.setup_payload();

        assert_eq!(setup["model"], "models/gemini-2.0-flash-exp");
        assert_eq!(setup["generationConfig"]["responseModalities"], "text");
        assert_eq!(setup["systemInstruction"]["parts"][0]["text"], "Be brief.");
    }

    #[test]
    fn test_verbatim_setup_payload_wins() {
        let setup = serde_json::json!({ "model": "models/other", "tools": [] });
        let config = GeminiLiveConfig::new("k").with_setup(setup.clone());
        assert_eq!(config.setup_payload(), setup);
    }

    #[test]
    fn test_response_modality_parse() {
        assert_eq!(
            ResponseModality::from_str_or_default("TEXT"),
            ResponseModality::Text
        );
        assert_eq!(
            ResponseModality::from_str_or_default("audio"),
            ResponseModality::Audio
        );
        assert_eq!(
            ResponseModality::from_str_or_default("unknown"),
            ResponseModality::Audio
        );
    }
}
