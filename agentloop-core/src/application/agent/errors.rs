use super::coercion::CoercionError;
use crate::application::tooling::ToolInvokeError;
use std::time::Duration;
use thiserror::Error;

/// Failures of a single tool call, split by whether the loop can go on.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error(transparent)]
    Coercion(#[from] CoercionError),

    #[error("tool '{tool}' expects {expected} parameter(s) but received {received}")]
    ArityMismatch {
        tool: String,
        expected: usize,
        received: usize,
    },

    #[error("tool '{tool}' timed out after {}s", .after.as_secs_f64())]
    Timeout { tool: String, after: Duration },

    #[error("tool '{tool}' failed: {source}")]
    Invocation {
        tool: String,
        #[source]
        source: ToolInvokeError,
    },

    #[error("tool channel lost while calling '{tool}': {source}")]
    Disconnected {
        tool: String,
        #[source]
        source: ToolInvokeError,
    },
}

impl ToolError {
    /// Fatal errors end the query; the rest are fed back to the model.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ToolError::UnknownTool(_) | ToolError::Timeout { .. } | ToolError::Disconnected { .. }
        )
    }
}

/// Errors raised while setting an agent up.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("tool discovery failed: {0}")]
    Discovery(#[source] ToolInvokeError),
}
