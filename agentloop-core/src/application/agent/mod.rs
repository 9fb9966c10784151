mod catalog;
mod coercion;
mod errors;
mod instructions;
mod invoker;
mod models;
mod parser;
mod runner;
mod session;

#[cfg(test)]
mod tests;

pub use catalog::{DescriptorError, ParamType, ToolCatalog, ToolDescriptor, ToolParameter};
pub use coercion::{
    ArgumentValue, ArityPolicy, CoercedArguments, CoercionError, coerce_arguments, prepare_call,
};
pub use errors::{AgentError, ToolError};
pub use instructions::{build_prompt, compose_system_instructions};
pub use invoker::{ToolInvoker, ToolResult, normalize_result};
pub use models::{AgentOptions, AgentOutcome, AgentStep, Termination, TerminationReason};
pub use parser::{FINAL_ANSWER_PREFIX, FUNCTION_CALL_PREFIX, ParsedResponse, parse_response};
pub use runner::{Agent, Iteration};
pub use session::{SessionPhase, SessionState};
