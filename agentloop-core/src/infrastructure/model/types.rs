//! Model types - Request, Response, and Error types

use std::time::Duration;
use thiserror::Error;

/// One prompt sent to the generation service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRequest {
    pub model: String,
    pub prompt: String,
}

/// Raw text returned by the generation service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelResponse {
    pub text: String,
}

impl ModelResponse {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Provider-level failures
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("provider '{provider}' requires an API key (set {env_var})")]
    MissingApiKey { provider: String, env_var: String },
    #[error("network error calling provider '{provider}': {source}")]
    Network {
        provider: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("provider '{provider}' returned invalid response: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

impl ModelError {
    pub fn missing_api_key(provider: impl Into<String>, env_var: impl Into<String>) -> Self {
        Self::MissingApiKey {
            provider: provider.into(),
            env_var: env_var.into(),
        }
    }

    pub fn network(provider: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            provider: provider.into(),
            source,
        }
    }

    pub fn invalid_response(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            provider: provider.into(),
            reason: reason.into(),
        }
    }
}

/// Failures of one bounded generation call. Both are terminal for a query.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("LLM generation timed out after {}s", .after.as_secs_f64())]
    Timeout { after: Duration },
    #[error("LLM generation failed: {0}")]
    Failed(#[from] ModelError),
}
