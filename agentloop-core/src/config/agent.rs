use crate::constants::{
    DEFAULT_GENERATION_TIMEOUT_SECS, DEFAULT_MAX_ITERATIONS, DEFAULT_TOOL_TIMEOUT_SECS,
};
use serde::Deserialize;
use std::time::Duration;

/// Iteration budget, timeouts and the arity policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentSettings {
    pub max_iterations: usize,
    pub generation_timeout: Duration,
    pub tool_timeout: Duration,
    /// Reject a raw parameter count that differs from the declared one
    pub strict_arity: bool,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            generation_timeout: Duration::from_secs(DEFAULT_GENERATION_TIMEOUT_SECS),
            tool_timeout: Duration::from_secs(DEFAULT_TOOL_TIMEOUT_SECS),
            strict_arity: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub(super) struct RawAgentSettings {
    pub(super) max_iterations: Option<usize>,
    pub(super) generation_timeout_secs: Option<u64>,
    pub(super) tool_timeout_secs: Option<u64>,
    #[serde(default)]
    pub(super) strict_arity: bool,
}
