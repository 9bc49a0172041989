use crate::llm::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::env;

pub const API_KEY_VAR: &str = "GEMINI_API_KEY";

/// Configuration for LLM service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Gemini API key; `None` when the deployment has none configured
    pub api_key: Option<String>,

    /// Model to use (e.g., "gemini-2.5-flash")
    pub model: String,

    /// API base URL, without trailing slash
    pub api_base: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Backoff applied to rate-limited calls
    pub retry: RetryPolicy,

    /// Enable debug logging
    pub debug: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.5-flash".to_string(),
            api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout_secs: 60,
            retry: RetryPolicy::default(),
            debug: false,
        }
    }
}

impl LlmConfig {
    /// Configuration with the given key and defaults for everything else
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: normalize_key(Some(api_key.into())),
            ..Default::default()
        }
    }

    /// Load configuration from environment variables.
    ///
    /// A missing or empty key is not an error: the assistant answers with its
    /// fallbacks instead of calling the API.
    pub fn from_env() -> Self {
        Self::from_env_internal(true)
    }

    #[cfg(test)]
    fn from_env_no_dotenv() -> Self {
        Self::from_env_internal(false)
    }

    fn from_env_internal(load_dotenv: bool) -> Self {
        if load_dotenv {
            let _ = dotenv::dotenv();
        }

        Self {
            api_key: normalize_key(env::var(API_KEY_VAR).ok()),
            ..Default::default()
        }
    }

    /// The key, if one is configured
    pub fn credential(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.model.trim().is_empty() {
            return Err("Model name is empty".to_string());
        }

        if self.timeout_secs == 0 {
            return Err("Timeout must be greater than 0".to_string());
        }

        if !self.api_base.starts_with("http://") && !self.api_base.starts_with("https://") {
            return Err(format!("API base must be an http(s) URL, got {}", self.api_base));
        }

        self.retry.validate()
    }
}

fn normalize_key(key: Option<String>) -> Option<String> {
    key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty())
}
