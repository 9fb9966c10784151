//! Text generation: provider seam, HTTP clients and the timeout gateway.

pub mod clients;
mod gateway;
mod traits;
mod types;

pub use clients::GeminiClient;
pub use gateway::GenerationGateway;
pub use traits::ModelProvider;
pub use types::{GenerationError, ModelError, ModelRequest, ModelResponse};
