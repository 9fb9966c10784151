//! # Configuration
//!
//! Loading and validation of `config/agent.toml`.
//!
//! ```toml
//! model = "gemini-2.0-flash"
//!
//! [provider]
//! api_key = "GEMINI_API_KEY"
//!
//! [server]
//! command = "python3"
//! args = ["example2-3.py"]
//!
//! [agent]
//! max_iterations = 3
//! ```

mod agent;
mod error;
mod loader;
mod provider;
mod server;

pub use crate::constants::{CONFIG_PATH, ENV_PATH};
pub use agent::AgentSettings;
pub use error::ConfigError;
pub use loader::{ensure_env_loaded, load_config};
pub use provider::ProviderConfig;
pub use server::ServerConfig;

use crate::constants::DEFAULT_MODEL;
use std::path::Path;

/// Fully validated application configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Generation model identifier
    pub model: String,
    /// Optional preamble placed before the generated system instructions
    pub system_prompt: Option<String>,
    pub provider: ProviderConfig,
    /// Tool process to spawn; `None` when the file did not declare one
    pub server: Option<ServerConfig>,
    pub agent: AgentSettings,
}

impl AppConfig {
    /// Load configuration from `path`, or from [`CONFIG_PATH`] when `None`.
    ///
    /// A missing file at the default path yields [`AppConfig::default`];
    /// a missing file at an explicit path is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        load_config(path)
    }

    /// The configured tool server, or [`ConfigError::MissingServer`].
    pub fn require_server(&self) -> Result<&ServerConfig, ConfigError> {
        self.server.as_ref().ok_or(ConfigError::MissingServer)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            system_prompt: None,
            provider: ProviderConfig::default(),
            server: None,
            agent: AgentSettings::default(),
        }
    }
}
