use async_trait::async_trait;
use serde_json::Value;

use super::error::ToolInvokeError;

/// The RPC channel to the external tool process.
#[async_trait]
pub trait ToolServerInterface: Send + Sync {
    /// Raw descriptor records (`name`, `description`, `inputSchema`) in server order.
    async fn list_tools(&self) -> Result<Vec<Value>, ToolInvokeError>;

    /// Invoke `tool` and return the raw `tools/call` result object.
    async fn call_tool(&self, tool: &str, arguments: Value) -> Result<Value, ToolInvokeError>;
}
