mod error;
mod interface;
mod process;

pub use error::ToolInvokeError;
pub use interface::ToolServerInterface;
pub use process::McpProcess;
