use super::coercion::CoercedArguments;
use super::errors::ToolError;
use crate::application::tooling::ToolServerInterface;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A tool call's outcome as shown to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResult {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    pub is_error: bool,
}

/// Sends coerced calls over the tool channel, one at a time, each bounded
/// by the tool timeout.
#[derive(Clone)]
pub struct ToolInvoker {
    bridge: Arc<dyn ToolServerInterface>,
    timeout: Duration,
}

impl ToolInvoker {
    pub fn new(bridge: Arc<dyn ToolServerInterface>, timeout: Duration) -> Self {
        Self { bridge, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn invoke(
        &self,
        tool: &str,
        arguments: &CoercedArguments,
    ) -> Result<ToolResult, ToolError> {
        debug!(tool = %tool, arguments = %arguments, "Dispatching tool via MCP");

        let call = self.bridge.call_tool(tool, arguments.to_json());
        let result = match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!(tool = %tool, timeout_secs = self.timeout.as_secs_f64(), "Tool call timed out");
                return Err(ToolError::Timeout {
                    tool: tool.to_string(),
                    after: self.timeout,
                });
            }
        };

        match result {
            Ok(value) => {
                let outcome = normalize_result(&value);
                info!(tool = %tool, success = !outcome.is_error, "Tool executed");
                Ok(outcome)
            }
            Err(source) if source.is_disconnect() => {
                warn!(tool = %tool, %source, "Tool channel lost");
                Err(ToolError::Disconnected {
                    tool: tool.to_string(),
                    source,
                })
            }
            Err(source) => {
                warn!(tool = %tool, %source, "Tool execution failed");
                Err(ToolError::Invocation {
                    tool: tool.to_string(),
                    source,
                })
            }
        }
    }
}

/// Reduce a `tools/call` result to display text plus its structured payload.
pub fn normalize_result(result: &Value) -> ToolResult {
    let is_error = result
        .get("isError")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let payload = result.get("structuredContent").cloned();

    let text = first_content_text(result)
        .or_else(|| structured_error_message(result))
        .unwrap_or_else(|| match result {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        });

    ToolResult {
        text,
        payload,
        is_error,
    }
}

fn first_content_text(result: &Value) -> Option<String> {
    let first = result.get("content")?.as_array()?.first()?;
    match first {
        Value::String(text) => Some(text.clone()),
        Value::Object(block) => match block.get("text").and_then(Value::as_str) {
            Some(text) => Some(text.to_string()),
            None => {
                let kind = block.get("type").and_then(Value::as_str).unwrap_or("binary");
                let mime = block.get("mimeType").and_then(Value::as_str);
                Some(match mime {
                    Some(mime) => format!("[{kind} content ({mime})]"),
                    None => format!("[{kind} content]"),
                })
            }
        },
        other => Some(other.to_string()),
    }
}

fn structured_error_message(result: &Value) -> Option<String> {
    result
        .get("structuredContent")?
        .get("error")?
        .get("message")?
        .as_str()
        .map(str::trim)
        .filter(|message| !message.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn takes_first_text_block() {
        let result = json!({
            "content": [{"type": "text", "text": "8"}, {"type": "text", "text": "ignored"}],
            "isError": false
        });
        let normalized = normalize_result(&result);
        assert_eq!(normalized.text, "8");
        assert!(!normalized.is_error);
        assert_eq!(normalized.payload, None);
    }

    #[test]
    fn keeps_structured_payload_and_error_flag() {
        let result = json!({
            "content": [{"type": "text", "text": "division by zero"}],
            "structuredContent": {"error": {"message": "division by zero"}},
            "isError": true
        });
        let normalized = normalize_result(&result);
        assert!(normalized.is_error);
        assert_eq!(normalized.text, "division by zero");
        assert!(normalized.payload.is_some());
    }

    #[test]
    fn falls_back_to_string_conversion() {
        assert_eq!(normalize_result(&json!("plain")).text, "plain");
        assert_eq!(normalize_result(&json!({"value": 3})).text, r#"{"value":3}"#);
        assert_eq!(
            normalize_result(&json!({"content": [{"type": "image", "mimeType": "image/png", "data": "AAAA"}]})).text,
            "[image content (image/png)]"
        );
    }
}
