//! Transport configuration and generic per-request options.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

use crate::client::ClientError;
use crate::stream::DEFAULT_STREAM_BUFFER;

/// Production API host.
pub const DEFAULT_API_BASE: &str = "https://api.deepseek.com";

/// Timeout applied when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "DEEPSEEK_API_KEY";

/// Environment variable overriding the base URL.
pub const BASE_URL_ENV: &str = "DEEPSEEK_BASE_URL";

/// A secret string type for sensitive data like API keys.
/// Prevents accidental logging or display of secrets.
#[derive(Clone)]
pub struct SecretString(String);

impl SecretString {
    /// Create a new secret string.
    pub fn new(s: String) -> Self {
        Self(s)
    }

    /// Get the underlying secret value.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretString([REDACTED])")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

/// Everything needed to build the HTTP side of a client.
///
/// # Example
/// ```rust
/// use deepseek::options::{TransportOptions, SecretString};
/// use std::time::Duration;
///
/// let options = TransportOptions::new(SecretString::new("sk-...".to_string()))
///     .with_timeout(Duration::from_secs(30))
///     .with_header("x-request-source".to_string(), "docs".to_string());
/// assert_eq!(options.base_url, "https://api.deepseek.com");
/// ```
#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// API key sent as a bearer token
    pub api_key: SecretString,

    /// Base URL for API endpoints
    pub base_url: String,

    /// Covers the whole exchange for blocking calls, and only the wait for
    /// response headers for streaming calls.
    pub timeout: Duration,

    /// HTTP proxy URL
    pub proxy: Option<String>,

    /// Additional HTTP headers to include in requests
    pub extra_headers: Option<HashMap<String, String>>,

    /// Decoded stream choices buffered ahead of a slow consumer
    pub stream_buffer: usize,
}

impl TransportOptions {
    /// Create transport options with an API key and defaults for the rest.
    pub fn new(api_key: impl Into<SecretString>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_API_BASE.to_string(),
            timeout: DEFAULT_TIMEOUT,
            proxy: None,
            extra_headers: None,
            stream_buffer: DEFAULT_STREAM_BUFFER,
        }
    }

    /// Read `DEEPSEEK_API_KEY` and, if set, `DEEPSEEK_BASE_URL`.
    pub fn from_env() -> Result<Self, ClientError> {
        let api_key = std::env::var(API_KEY_ENV)
            .map_err(|_| ClientError::Config(format!("{API_KEY_ENV} is not set")))?;

        let mut options = Self::new(api_key);
        if let Ok(base_url) = std::env::var(BASE_URL_ENV) {
            options = options.with_base_url(base_url);
        }
        Ok(options)
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the proxy URL.
    pub fn with_proxy(mut self, proxy: String) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Set extra headers.
    pub fn with_extra_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.extra_headers = Some(headers);
        self
    }

    /// Add a single extra header.
    pub fn with_header(mut self, key: String, value: String) -> Self {
        self.extra_headers
            .get_or_insert_with(HashMap::new)
            .insert(key, value);
        self
    }

    /// Set how many decoded stream choices may wait for the consumer.
    pub fn with_stream_buffer(mut self, capacity: usize) -> Self {
        self.stream_buffer = capacity;
        self
    }
}

/// Provider-agnostic request options.
///
/// Every field is optional: only the ones that are set override the
/// provider's defaults.
///
/// # Example
/// ```rust
/// use deepseek::options::ChatOptions;
///
/// let options = ChatOptions::default()
///     .with_model("deepseek-reasoner")
///     .with_temperature(0.2)
///     .with_additional_property("logprobs", true);
/// assert_eq!(options.max_output_tokens, None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatOptions {
    /// Model identifier (e.g., "deepseek-chat")
    pub model_id: Option<String>,

    pub frequency_penalty: Option<f64>,

    /// Maximum tokens to generate
    pub max_output_tokens: Option<u32>,

    pub presence_penalty: Option<f64>,

    pub stop_sequences: Option<Vec<String>>,

    /// Temperature for sampling (0.0 - 2.0)
    pub temperature: Option<f64>,

    /// Top-p (nucleus) sampling parameter
    pub top_p: Option<f64>,

    /// Provider-specific extras, looked up by key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<HashMap<String, Value>>,
}

impl ChatOptions {
    /// Set the model identifier.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model_id = Some(model.into());
        self
    }

    pub fn with_frequency_penalty(mut self, penalty: f64) -> Self {
        self.frequency_penalty = Some(penalty);
        self
    }

    pub fn with_presence_penalty(mut self, penalty: f64) -> Self {
        self.presence_penalty = Some(penalty);
        self
    }

    /// Set maximum tokens to generate.
    pub fn with_max_output_tokens(mut self, max_tokens: u32) -> Self {
        self.max_output_tokens = Some(max_tokens);
        self
    }

    pub fn with_stop_sequences(mut self, stop: Vec<String>) -> Self {
        self.stop_sequences = Some(stop);
        self
    }

    /// Set the temperature.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set top-p sampling parameter.
    pub fn with_top_p(mut self, top_p: f64) -> Self {
        self.top_p = Some(top_p);
        self
    }

    /// Add a provider-specific extra.
    pub fn with_additional_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.additional_properties
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Look up a provider-specific extra.
    pub fn additional_property(&self, key: &str) -> Option<&Value> {
        self.additional_properties.as_ref()?.get(key)
    }
}
