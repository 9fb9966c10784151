use super::agent::{AgentSettings, RawAgentSettings};
use super::error::ConfigError;
use super::provider::{ProviderConfig, RawProviderConfig};
use super::server::{RawServer, ServerConfig};
use super::{AppConfig, CONFIG_PATH, ENV_PATH};
use crate::constants::DEFAULT_MODEL;
use dotenvy::{dotenv, from_filename};
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Once;
use std::time::Duration;
use tracing::{debug, info};

static ENV_LOADER: Once = Once::new();

/// Raw configuration structure for deserialization from TOML
#[derive(Debug, Deserialize, Default)]
struct RawConfig {
    model: Option<String>,
    system_prompt: Option<String>,
    #[serde(default)]
    provider: RawProviderConfig,
    server: Option<RawServer>,
    #[serde(default)]
    agent: RawAgentSettings,
}

/// Ensures environment variables are loaded from `config/.env` and `.env`
pub fn ensure_env_loaded() {
    ENV_LOADER.call_once(|| {
        let _ = from_filename(ENV_PATH);
        let _ = dotenv();
    });
}

/// Load and validate configuration from a file path
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    ensure_env_loaded();
    match path {
        Some(path) => read_config(path),
        None => match read_config(Path::new(CONFIG_PATH)) {
            Err(ConfigError::NotFound { .. }) => {
                info!("Configuration file not found; using defaults");
                Ok(AppConfig::default())
            }
            other => other,
        },
    }
}

fn read_config(path: &Path) -> Result<AppConfig, ConfigError> {
    debug!(path = %path.display(), "Reading agent configuration file");

    let content = fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            ConfigError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    let parsed: RawConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    validate_and_build(parsed)
}

fn validate_and_build(parsed: RawConfig) -> Result<AppConfig, ConfigError> {
    let model = parsed
        .model
        .map(|model| model.trim().to_string())
        .filter(|model| !model.is_empty())
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());

    let agent = build_agent_settings(parsed.agent)?;

    Ok(AppConfig {
        model,
        system_prompt: parsed
            .system_prompt
            .filter(|prompt| !prompt.trim().is_empty()),
        provider: ProviderConfig::from(parsed.provider),
        server: parsed.server.map(ServerConfig::from),
        agent,
    })
}

fn build_agent_settings(raw: RawAgentSettings) -> Result<AgentSettings, ConfigError> {
    let defaults = AgentSettings::default();

    let max_iterations = raw.max_iterations.unwrap_or(defaults.max_iterations);
    if max_iterations == 0 {
        return Err(ConfigError::InvalidValue {
            field: "agent.max_iterations",
            reason: "must be at least 1".into(),
        });
    }

    let generation_timeout = positive_secs(
        "agent.generation_timeout_secs",
        raw.generation_timeout_secs,
        defaults.generation_timeout,
    )?;
    let tool_timeout = positive_secs(
        "agent.tool_timeout_secs",
        raw.tool_timeout_secs,
        defaults.tool_timeout,
    )?;

    Ok(AgentSettings {
        max_iterations,
        generation_timeout,
        tool_timeout,
        strict_arity: raw.strict_arity,
    })
}

fn positive_secs(
    field: &'static str,
    value: Option<u64>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match value {
        None => Ok(default),
        Some(0) => Err(ConfigError::InvalidValue {
            field,
            reason: "must be at least 1 second".into(),
        }),
        Some(secs) => Ok(Duration::from_secs(secs)),
    }
}
