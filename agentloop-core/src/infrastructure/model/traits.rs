//! Model traits

use super::types::{ModelError, ModelRequest, ModelResponse};
use async_trait::async_trait;

/// Trait for text-generation backends
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Provider identifier used in logs and errors
    fn id(&self) -> &str;

    /// Generate a completion for a single prompt
    async fn generate(&self, request: ModelRequest) -> Result<ModelResponse, ModelError>;
}
