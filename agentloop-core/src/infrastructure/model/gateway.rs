use super::traits::ModelProvider;
use super::types::{GenerationError, ModelRequest};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Bounded access to the generation service.
///
/// Each call is raced against a fixed timeout; on expiry the in-flight request
/// future is dropped and [`GenerationError::Timeout`] is returned.
pub struct GenerationGateway<P: ModelProvider> {
    provider: P,
    model: String,
    timeout: Duration,
}

impl<P: ModelProvider> GenerationGateway<P> {
    pub fn new(provider: P, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            provider,
            model: model.into(),
            timeout,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the whitespace-trimmed reply text.
    pub async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let request = ModelRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
        };
        debug!(
            provider = self.provider.id(),
            model = self.model.as_str(),
            prompt_chars = prompt.len(),
            "Starting LLM generation"
        );

        match timeout(self.timeout, self.provider.generate(request)).await {
            Ok(Ok(response)) => {
                info!(provider = self.provider.id(), "LLM generation completed");
                Ok(response.text.trim().to_string())
            }
            Ok(Err(source)) => {
                warn!(provider = self.provider.id(), %source, "LLM generation failed");
                Err(GenerationError::Failed(source))
            }
            Err(_) => {
                warn!(
                    provider = self.provider.id(),
                    timeout_secs = self.timeout.as_secs_f64(),
                    "LLM generation timed out"
                );
                Err(GenerationError::Timeout {
                    after: self.timeout,
                })
            }
        }
    }
}
