use super::parser::FINAL_ANSWER_PREFIX;
use super::session::SessionState;
use crate::config::AgentSettings;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    FinalAnswer,
    MaxIterationsReached,
    MalformedResponse,
    GenerationFailed,
    FatalToolError,
}

impl TerminationReason {
    pub fn as_str(self) -> &'static str {
        match self {
            TerminationReason::FinalAnswer => "final_answer",
            TerminationReason::MaxIterationsReached => "max_iterations_reached",
            TerminationReason::MalformedResponse => "malformed_response",
            TerminationReason::GenerationFailed => "generation_failed",
            TerminationReason::FatalToolError => "fatal_tool_error",
        }
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How and with what answer a query ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Termination {
    pub reason: TerminationReason,
    pub answer: String,
}

impl Termination {
    pub fn answer(text: impl Into<String>) -> Self {
        Self {
            reason: TerminationReason::FinalAnswer,
            answer: text.into(),
        }
    }

    /// Error answers share one shape: `[Error: <message>]`.
    pub fn error(reason: TerminationReason, message: impl fmt::Display) -> Self {
        Self {
            reason,
            answer: format!("[Error: {message}]"),
        }
    }
}

/// One dispatched tool call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentStep {
    pub iteration: usize,
    pub tool: String,
    pub arguments: Value,
    pub success: bool,
    pub output: String,
}

#[derive(Debug, Clone)]
pub struct AgentOutcome {
    pub query_id: String,
    pub answer: String,
    pub termination: TerminationReason,
    pub state: SessionState,
    pub steps: Vec<AgentStep>,
}

impl AgentOutcome {
    /// The answer in reply-grammar form, e.g. `FINAL_ANSWER: [8]`.
    pub fn wire(&self) -> String {
        format!("{FINAL_ANSWER_PREFIX} {}", self.answer)
    }

    pub fn iterations(&self) -> usize {
        self.state.iteration_count
    }
}

#[derive(Debug, Clone)]
pub struct AgentOptions {
    /// Extra text placed ahead of the generated instructions.
    pub system_prompt: Option<String>,
    /// Instructions the tool server sent during `initialize`.
    pub server_guidance: Option<String>,
    pub max_iterations: usize,
    pub strict_arity: bool,
}

impl AgentOptions {
    pub fn from_settings(settings: &AgentSettings, system_prompt: Option<String>) -> Self {
        Self {
            system_prompt,
            server_guidance: None,
            max_iterations: settings.max_iterations,
            strict_arity: settings.strict_arity,
        }
    }
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self::from_settings(&AgentSettings::default(), None)
    }
}
