//! Application constants
//!
//! Single source of truth for paths and reference values.

/// Default configuration file path
pub const CONFIG_PATH: &str = "config/agent.toml";

/// Default environment file path
pub const ENV_PATH: &str = "config/.env";

/// Default generation model
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Default Gemini endpoint
pub const DEFAULT_GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com";

/// Default Gemini API path (fallback when not specified in config)
pub const DEFAULT_GEMINI_API_PATH: &str = "v1beta/models";

/// Environment variable holding the Gemini API key when none is configured
pub const DEFAULT_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Model-generation/tool-call round trips allowed per query
pub const DEFAULT_MAX_ITERATIONS: usize = 3;

/// Seconds to wait for one generation call
pub const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 10;

/// Seconds to wait for one tool invocation
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 30;

/// MCP protocol revision announced during `initialize`
pub const MCP_PROTOCOL_VERSION: &str = "2025-06-18";
