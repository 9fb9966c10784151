//! Gemini client implementation

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::base::{HttpClientBase, resolve_api_key};
use crate::config::ProviderConfig;
use crate::infrastructure::model::traits::ModelProvider;
use crate::infrastructure::model::types::{ModelError, ModelRequest, ModelResponse};

const PROVIDER_ID: &str = "gemini";

/// Gemini client for Google AI
#[derive(Clone)]
pub struct GeminiClient {
    base: HttpClientBase,
    api_path: String,
    api_key_env: String,
}

impl GeminiClient {
    pub fn from_config(config: &ProviderConfig) -> Self {
        let api_key = resolve_api_key(PROVIDER_ID, &config.api_key);
        Self {
            base: HttpClientBase::new(PROVIDER_ID, config.endpoint.clone(), api_key),
            api_path: config.api_path.clone(),
            api_key_env: config.api_key.clone(),
        }
    }

    /// Fail early when no API key could be resolved.
    pub fn ensure_api_key(&self) -> Result<(), ModelError> {
        self.api_key().map(|_| ())
    }

    fn api_key(&self) -> Result<&str, ModelError> {
        self.base
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ModelError::missing_api_key(&self.base.id, &self.api_key_env))
    }

    fn build_model_url(&self, model: &str) -> String {
        self.base
            .build_url(&format!("{}/{model}:generateContent", self.api_path))
    }
}

#[async_trait]
impl ModelProvider for GeminiClient {
    fn id(&self) -> &str {
        &self.base.id
    }

    async fn generate(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
        let api_key = self.api_key()?;
        let url = self.build_model_url(&request.model);
        let payload = GeminiRequest::from(&request);

        info!(
            provider = self.base.id.as_str(),
            model = request.model.as_str(),
            prompt_chars = request.prompt.len(),
            "Sending request to Gemini"
        );

        let response: GeminiResponse = self
            .base
            .post_with_query_key(&url, api_key, &payload)
            .await?;
        debug!("Received response from Gemini");

        let text = response
            .candidates
            .unwrap_or_default()
            .into_iter()
            .flat_map(|c| c.content)
            .flat_map(|c| c.parts)
            .find_map(|p| p.text)
            .ok_or_else(|| ModelError::invalid_response(&self.base.id, "missing text"))?;

        Ok(ModelResponse::new(text))
    }
}

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiRequestContent>,
}

#[derive(Serialize)]
struct GeminiRequestContent {
    role: &'static str,
    parts: Vec<GeminiRequestPart>,
}

#[derive(Serialize)]
struct GeminiRequestPart {
    text: String,
}

impl From<&ModelRequest> for GeminiRequest {
    fn from(value: &ModelRequest) -> Self {
        Self {
            contents: vec![GeminiRequestContent {
                role: "user",
                parts: vec![GeminiRequestPart {
                    text: value.prompt.clone(),
                }],
            }],
        }
    }
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
struct GeminiPart {
    text: Option<String>,
}
