use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolInvokeError {
    #[error("failed to spawn MCP server '{server}': {source}")]
    Spawn {
        server: String,
        #[source]
        source: std::io::Error,
    },
    #[error("MCP server '{server}' transport error: {message}")]
    Transport { server: String, message: String },
    #[error("MCP server '{server}' returned invalid JSON: {source}")]
    InvalidJson {
        server: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("MCP server '{server}' returned JSON-RPC error {code}: {message}")]
    Rpc {
        server: String,
        code: i64,
        message: String,
    },
    #[error("MCP server '{server}' terminated unexpectedly")]
    Terminated { server: String },
    #[error("MCP server '{server}' request cancelled")]
    Cancelled { server: String },
    #[error("MCP server '{server}' is not running")]
    NotRunning { server: String },
}

impl ToolInvokeError {
    /// True when the channel to the tool process is gone or unusable.
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self,
            ToolInvokeError::Spawn { .. }
                | ToolInvokeError::Transport { .. }
                | ToolInvokeError::Terminated { .. }
                | ToolInvokeError::Cancelled { .. }
                | ToolInvokeError::NotRunning { .. }
        )
    }
}
