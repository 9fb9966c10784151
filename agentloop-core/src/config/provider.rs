use crate::constants::{DEFAULT_API_KEY_ENV, DEFAULT_GEMINI_API_PATH, DEFAULT_GEMINI_ENDPOINT};
use serde::Deserialize;

/// Connection settings for the hosted generation service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// API endpoint URL
    pub endpoint: String,
    /// Path segment between the endpoint and the model name
    pub api_path: String,
    /// Name of the environment variable holding the API key
    pub api_key: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_GEMINI_ENDPOINT.to_string(),
            api_path: DEFAULT_GEMINI_API_PATH.to_string(),
            api_key: DEFAULT_API_KEY_ENV.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub(super) struct RawProviderConfig {
    endpoint: Option<String>,
    api_path: Option<String>,
    api_key: Option<String>,
}

impl From<RawProviderConfig> for ProviderConfig {
    fn from(raw: RawProviderConfig) -> Self {
        let defaults = ProviderConfig::default();
        let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
        Self {
            endpoint: non_empty(raw.endpoint).unwrap_or(defaults.endpoint),
            api_path: non_empty(raw.api_path)
                .map(|path| path.trim_matches('/').to_string())
                .unwrap_or(defaults.api_path),
            api_key: non_empty(raw.api_key)
                .map(|key| strip_env_syntax(&key))
                .unwrap_or(defaults.api_key),
        }
    }
}

/// Accepts both `GEMINI_API_KEY` and `${GEMINI_API_KEY}`.
fn strip_env_syntax(value: &str) -> String {
    let trimmed = value.trim();
    trimmed
        .strip_prefix("${")
        .and_then(|rest| rest.strip_suffix('}'))
        .unwrap_or(trimmed)
        .to_string()
}
